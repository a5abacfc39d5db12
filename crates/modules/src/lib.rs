//! Module discovery, capability matching, loading and result caching.
//!
//! The [`Engine`] is the entry point every higher-level subsystem calls:
//! given a registration string and a capability kind it enumerates candidate
//! libraries, loads and scans them, ranks their advertised capabilities,
//! deduplicates and sorts the survivors and caches the result set. Library
//! handles are deduplicated per path with refcounted load/unload; loading
//! itself sits behind the [`ModuleLoader`] trait so tests can run with
//! isolated, loader-free state.

pub mod config;
pub mod discovery;
pub mod error;
pub mod library;
pub mod loader;
pub mod registration;
pub mod resolver;
pub mod sink;

pub use config::{ConfigError, EngineConfig};
pub use discovery::{FsLister, ModuleLister, library_matches_id, module_id_from_path};
pub use error::{LoadError, MetadataError};
pub use library::{
	ApiDescriptor, ApiKind, FilterOps, LibraryRegistry, ModuleInfo, ModuleLibrary, ModuleLoader,
	NativeModule,
};
pub use loader::DlLoader;
pub use registration::{NormalizeMode, match_rank, normalize};
pub use resolver::{ApiMatches, Engine, FindFlags};
pub use sink::{CollectingSink, MessageSink, Severity, TracingSink};
