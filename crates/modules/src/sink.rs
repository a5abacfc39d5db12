//! Injectable message sink for module diagnostics.
//!
//! All warnings and errors from discovery, loading and resolution go
//! through one sink callback. Sinks never panic and never terminate the
//! process; hard failures are expressed through return values instead.

use std::sync::Mutex;

use tracing::{error, info, warn};

/// Severity of a reported message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
	/// Informational note.
	Info,
	/// A candidate could not be used; resolution continues.
	InsufficientData,
	/// The caller passed something unusable.
	UsageError,
	/// An internal invariant was violated.
	ProgramError,
	/// Suspicious module content.
	SecurityAlert,
}

/// Receives diagnostics from the module runtime.
pub trait MessageSink: Send + Sync {
	/// Reports one message with its source context (path, registration…).
	fn report(&self, severity: Severity, context: &str, message: &str);
}

/// Default sink forwarding onto `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl MessageSink for TracingSink {
	fn report(&self, severity: Severity, context: &str, message: &str) {
		match severity {
			Severity::Info => info!(context, "{message}"),
			Severity::InsufficientData | Severity::UsageError => {
				warn!(context, "{message}");
			}
			Severity::ProgramError | Severity::SecurityAlert => {
				error!(context, "{message}");
			}
		}
	}
}

/// Test sink that records every report.
#[derive(Debug, Default)]
pub struct CollectingSink {
	messages: Mutex<Vec<(Severity, String, String)>>,
}

impl CollectingSink {
	/// Creates an empty sink.
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of the collected reports.
	pub fn messages(&self) -> Vec<(Severity, String, String)> {
		self.messages.lock().map(|m| m.clone()).unwrap_or_default()
	}

	/// Number of collected reports.
	pub fn len(&self) -> usize {
		self.messages.lock().map(|m| m.len()).unwrap_or(0)
	}

	/// Whether nothing was reported.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl MessageSink for CollectingSink {
	fn report(&self, severity: Severity, context: &str, message: &str) {
		if let Ok(mut messages) = self.messages.lock() {
			messages.push((severity, context.to_string(), message.to_string()));
		}
	}
}
