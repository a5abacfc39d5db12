//! Process-wide registry of per-kind describe callbacks.
//!
//! Each [`ObjectKind`] gets exactly one callback; the first registration
//! wins and later ones are ignored, so registering from a constructor is
//! safe to repeat.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use tracing::trace;

use crate::handle::{ObjectHandle, ObjectKind};

/// Formats one object for diagnostics output.
pub type DescribeFn = fn(&ObjectHandle) -> String;

fn registry() -> &'static Mutex<HashMap<ObjectKind, DescribeFn>> {
	static REGISTRY: OnceLock<Mutex<HashMap<ObjectKind, DescribeFn>>> = OnceLock::new();
	REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn default_describe(handle: &ObjectHandle) -> String {
	format!(
		"{:?} strong:{} observers:{}",
		handle.kind(),
		handle.strong_count(),
		handle.observer_count()
	)
}

/// Registers a describe callback for `kind`.
///
/// Returns `false` when a callback is already present; the existing one is
/// kept in that case.
pub fn register_describer(kind: ObjectKind, f: DescribeFn) -> bool {
	let Ok(mut map) = registry().lock() else {
		return false;
	};
	if map.contains_key(&kind) {
		trace!(?kind, "describe callback already registered, keeping first");
		return false;
	}
	map.insert(kind, f);
	true
}

/// Lazily installs the default callback for `kind`, once.
pub(crate) fn ensure_default(kind: ObjectKind) {
	if let Ok(mut map) = registry().lock() {
		map.entry(kind).or_insert(default_describe as DescribeFn);
	}
}

pub(crate) fn run(handle: &ObjectHandle) -> String {
	let f = registry()
		.lock()
		.ok()
		.and_then(|map| map.get(&handle.kind()).copied());
	match f {
		Some(f) => f(handle),
		None => default_describe(handle),
	}
}
