//! Error types for module loading.

use std::path::PathBuf;

use thiserror::Error;

/// Problems with a module's exported metadata. Recoverable: the candidate
/// is skipped and enumeration continues.
#[derive(Debug, Error)]
pub enum MetadataError {
	/// The library file name carries no 4-letter module id.
	#[error("no 4-letter module id in file name: {0}")]
	NoModuleId(PathBuf),

	/// The well-known metadata symbol is absent.
	#[error("metadata symbol {symbol} missing: {detail}")]
	MissingSymbol {
		/// Symbol name looked up.
		symbol: String,
		/// Loader diagnostic text.
		detail: String,
	},

	/// The metadata symbol resolved to a null record.
	#[error("metadata symbol {0} resolved to a null record")]
	NullRecord(String),

	/// The module's self-check rejected the load.
	#[error("module self-check failed with code {0}")]
	SelfCheckFailed(i32),
}

/// Native loader failure. Recoverable and never cached: a later retry of
/// the same path is always possible.
#[derive(Debug, Error)]
pub enum LoadError {
	/// The platform loader could not open the library.
	#[error("failed to load {path}: {detail}")]
	NotFound {
		/// Candidate library path.
		path: PathBuf,
		/// Loader diagnostic text.
		detail: String,
	},

	/// The library loaded but its metadata was unusable; the native handle
	/// was released again.
	#[error("bad metadata in {path}: {source}")]
	Metadata {
		/// Candidate library path.
		path: PathBuf,
		/// What was wrong with the metadata.
		#[source]
		source: MetadataError,
	},
}
