//! Deduplicated, refcounted module library handles.
//!
//! The [`LibraryRegistry`] owns one [`ModuleLibrary`] per distinct path.
//! `acquire` returns the same instance for the same path and counts the
//! reference; `release` at zero runs the capability reset hooks, drops the
//! parsed metadata and unloads the native handle. Loading itself is
//! abstracted behind [`ModuleLoader`] so the registry can be exercised
//! without touching the platform loader.

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::error::LoadError;

/// Mutually exclusive capability kinds a module can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKind {
	/// Color transform filter core.
	FilterCore,
	/// Data codec (profile or image payload handling).
	DataCodec,
	/// Pixel pipeline filter node.
	FilterNode,
	/// Device port (monitor, printer, scanner access).
	DevicePort,
}

impl ApiKind {
	/// Maps a raw metadata kind tag onto the enum.
	pub fn from_raw(raw: u32) -> Option<Self> {
		match raw {
			chroma_cabi::kind::FILTER_CORE => Some(Self::FilterCore),
			chroma_cabi::kind::DATA_CODEC => Some(Self::DataCodec),
			chroma_cabi::kind::FILTER_NODE => Some(Self::FilterNode),
			chroma_cabi::kind::DEVICE_PORT => Some(Self::DevicePort),
			_ => None,
		}
	}

	/// The raw metadata kind tag.
	pub fn as_raw(self) -> u32 {
		match self {
			Self::FilterCore => chroma_cabi::kind::FILTER_CORE,
			Self::DataCodec => chroma_cabi::kind::DATA_CODEC,
			Self::FilterNode => chroma_cabi::kind::FILTER_NODE,
			Self::DevicePort => chroma_cabi::kind::DEVICE_PORT,
		}
	}

	/// Single-character tag used in cache key construction.
	pub fn as_char(self) -> char {
		match self {
			Self::FilterCore => '4',
			Self::DataCodec => '6',
			Self::FilterNode => '7',
			Self::DevicePort => '8',
		}
	}
}

/// Reset hook run before a capability's library unloads.
pub type ResetFn = extern "C" fn();

/// Operation bundle behind a descriptor.
///
/// Native modules expose a raw pointer bundle; in-process implementations
/// (tests, built-ins) implement the trait directly.
pub trait FilterOps: Send + Sync {
	/// The capability kind the bundle serves.
	fn kind(&self) -> ApiKind;

	/// Raw native entry bundle, when backed by a loaded module.
	fn native_ops(&self) -> Option<NonNull<c_void>> {
		None
	}
}

/// One advertised capability of a module.
#[derive(Clone)]
pub struct ApiDescriptor {
	registration: String,
	kind: ApiKind,
	ops: Arc<dyn FilterOps>,
	reset: Option<ResetFn>,
	origin: PathBuf,
	compat_version: u32,
}

impl ApiDescriptor {
	/// Builds a descriptor; used by loaders and tests.
	pub fn new(
		registration: impl Into<String>,
		kind: ApiKind,
		ops: Arc<dyn FilterOps>,
		reset: Option<ResetFn>,
		origin: impl Into<PathBuf>,
		compat_version: u32,
	) -> Self {
		Self {
			registration: registration.into(),
			kind,
			ops,
			reset,
			origin: origin.into(),
			compat_version,
		}
	}

	/// The advertised registration string.
	pub fn registration(&self) -> &str {
		&self.registration
	}

	/// The capability kind.
	pub fn kind(&self) -> ApiKind {
		self.kind
	}

	/// The operation bundle.
	pub fn ops(&self) -> &Arc<dyn FilterOps> {
		&self.ops
	}

	/// Path of the library this descriptor came from. Diagnostic
	/// back-reference only; it does not keep the library loaded.
	pub fn origin(&self) -> &Path {
		&self.origin
	}

	/// Compatibility version the owning module declared.
	pub fn compat_version(&self) -> u32 {
		self.compat_version
	}

	pub(crate) fn run_reset(&self) {
		if let Some(reset) = self.reset {
			reset();
		}
	}
}

impl std::fmt::Debug for ApiDescriptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ApiDescriptor")
			.field("registration", &self.registration)
			.field("kind", &self.kind)
			.field("origin", &self.origin)
			.field("compat_version", &self.compat_version)
			.finish()
	}
}

/// Parsed metadata of one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
	/// Host compatibility version the module declares.
	pub compat_version: u32,
	/// Provider/vendor text.
	pub vendor: String,
	/// Advertised capabilities.
	pub apis: Vec<ApiDescriptor>,
}

/// A loaded native module: parsed metadata plus an unload-on-drop handle.
pub trait NativeModule: Send {
	/// The parsed metadata.
	fn info(&self) -> &ModuleInfo;
}

/// Loads a module library from a path.
pub trait ModuleLoader: Send {
	/// Performs the native load and metadata scan for `path`.
	fn load(&self, path: &Path) -> Result<Box<dyn NativeModule>, LoadError>;
}

/// One deduplicated library handle, keyed by path.
pub struct ModuleLibrary {
	path: PathBuf,
	native: Mutex<Option<Box<dyn NativeModule>>>,
}

impl ModuleLibrary {
	fn new(path: PathBuf, native: Box<dyn NativeModule>) -> Self {
		Self {
			path,
			native: Mutex::new(Some(native)),
		}
	}

	/// The path this library was loaded from.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Whether the native handle is still loaded.
	pub fn is_loaded(&self) -> bool {
		self.native
			.lock()
			.map(|native| native.is_some())
			.unwrap_or(false)
	}

	/// Clones out the parsed metadata, if still loaded.
	pub fn info(&self) -> Option<ModuleInfo> {
		self.native
			.lock()
			.ok()
			.and_then(|native| native.as_ref().map(|module| module.info().clone()))
	}

	/// Declared compatibility version, if still loaded.
	pub fn compat_version(&self) -> Option<u32> {
		self.native
			.lock()
			.ok()
			.and_then(|native| native.as_ref().map(|module| module.info().compat_version))
	}

	/// The advertised descriptors of the given kind.
	pub fn descriptors_for(&self, kind: ApiKind) -> Vec<ApiDescriptor> {
		self.native
			.lock()
			.ok()
			.and_then(|native| {
				native.as_ref().map(|module| {
					module
						.info()
						.apis
						.iter()
						.filter(|api| api.kind() == kind)
						.cloned()
						.collect()
				})
			})
			.unwrap_or_default()
	}

	/// Runs the reset hooks, drops the metadata and unloads the handle.
	fn shut_down(&self) {
		let Ok(mut native) = self.native.lock() else {
			return;
		};
		if let Some(module) = native.take() {
			for api in &module.info().apis {
				api.run_reset();
			}
			debug!(path = %self.path.display(), "unloading module library");
			drop(module);
		}
	}
}

struct LibrarySlot {
	library: Arc<ModuleLibrary>,
	refcount: u32,
}

/// Per-path deduplication of library handles with refcounted lifetime.
pub struct LibraryRegistry {
	loader: Box<dyn ModuleLoader>,
	slots: HashMap<PathBuf, LibrarySlot>,
}

impl LibraryRegistry {
	/// Creates a registry loading through `loader`.
	pub fn new(loader: Box<dyn ModuleLoader>) -> Self {
		Self {
			loader,
			slots: HashMap::new(),
		}
	}

	/// Returns the library for `path`, loading it on first acquisition.
	///
	/// A second acquire of the same path returns the same instance and
	/// bumps its refcount; no second OS-level load happens. A load failure
	/// leaves no poisoned slot behind, so a later retry is possible.
	pub fn acquire(&mut self, path: &Path) -> Result<Arc<ModuleLibrary>, LoadError> {
		if let Some(slot) = self.slots.get_mut(path) {
			slot.refcount += 1;
			trace!(path = %path.display(), refcount = slot.refcount, "library reacquired");
			return Ok(Arc::clone(&slot.library));
		}

		let native = self.loader.load(path)?;
		let library = Arc::new(ModuleLibrary::new(path.to_path_buf(), native));
		self.slots.insert(
			path.to_path_buf(),
			LibrarySlot {
				library: Arc::clone(&library),
				refcount: 1,
			},
		);
		debug!(path = %path.display(), "library loaded");
		Ok(library)
	}

	/// Drops one reference to `path`.
	///
	/// At zero the library shuts down: reset hooks run, metadata is
	/// dropped, the native handle unloads. Releasing a path that is not
	/// held is a no-op. Returns whether this call unloaded the library.
	pub fn release(&mut self, path: &Path) -> bool {
		let Some(slot) = self.slots.get_mut(path) else {
			return false;
		};
		slot.refcount -= 1;
		if slot.refcount > 0 {
			trace!(path = %path.display(), refcount = slot.refcount, "library released");
			return false;
		}
		let slot = match self.slots.remove(path) {
			Some(slot) => slot,
			None => return false,
		};
		slot.library.shut_down();
		true
	}

	/// Current refcount for `path`; 0 when not held.
	pub fn refcount(&self, path: &Path) -> u32 {
		self.slots.get(path).map(|slot| slot.refcount).unwrap_or(0)
	}

	/// Number of loaded libraries.
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	/// Whether no library is held.
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}
}

impl Drop for LibraryRegistry {
	fn drop(&mut self) {
		// Slots still held at teardown get the same reset-then-unload
		// sequence as a release to zero.
		for slot in self.slots.values() {
			slot.library.shut_down();
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;
	use crate::error::MetadataError;

	struct StubOps(ApiKind);

	impl FilterOps for StubOps {
		fn kind(&self) -> ApiKind {
			self.0
		}
	}

	struct StubModule {
		info: ModuleInfo,
		unloads: Arc<AtomicUsize>,
	}

	impl NativeModule for StubModule {
		fn info(&self) -> &ModuleInfo {
			&self.info
		}
	}

	impl Drop for StubModule {
		fn drop(&mut self) {
			self.unloads.fetch_add(1, Ordering::SeqCst);
		}
	}

	struct StubLoader {
		loads: Arc<AtomicUsize>,
		unloads: Arc<AtomicUsize>,
		fail: bool,
	}

	impl ModuleLoader for StubLoader {
		fn load(&self, path: &Path) -> Result<Box<dyn NativeModule>, LoadError> {
			self.loads.fetch_add(1, Ordering::SeqCst);
			if self.fail {
				return Err(LoadError::NotFound {
					path: path.to_path_buf(),
					detail: "simulated loader error".to_string(),
				});
			}
			let info = ModuleInfo {
				compat_version: 1,
				vendor: "stub".to_string(),
				apis: vec![ApiDescriptor::new(
					"//color/icc.stub",
					ApiKind::FilterCore,
					Arc::new(StubOps(ApiKind::FilterCore)),
					None,
					path,
					1,
				)],
			};
			Ok(Box::new(StubModule {
				info,
				unloads: Arc::clone(&self.unloads),
			}))
		}
	}

	fn registry(fail: bool) -> (LibraryRegistry, Arc<AtomicUsize>, Arc<AtomicUsize>) {
		let loads = Arc::new(AtomicUsize::new(0));
		let unloads = Arc::new(AtomicUsize::new(0));
		let loader = StubLoader {
			loads: Arc::clone(&loads),
			unloads: Arc::clone(&unloads),
			fail,
		};
		(LibraryRegistry::new(Box::new(loader)), loads, unloads)
	}

	#[test]
	fn acquire_deduplicates_per_path() {
		let (mut registry, loads, unloads) = registry(false);
		let path = Path::new("/mods/libtest_cmm_module.so");

		let a = registry.acquire(path).unwrap();
		let b = registry.acquire(path).unwrap();
		assert!(Arc::ptr_eq(&a, &b));
		assert_eq!(registry.refcount(path), 2);
		assert_eq!(loads.load(Ordering::SeqCst), 1);

		assert!(!registry.release(path));
		assert!(registry.release(path));
		assert_eq!(registry.refcount(path), 0);
		assert_eq!(unloads.load(Ordering::SeqCst), 1);
		assert!(!a.is_loaded());
	}

	#[test]
	fn double_release_is_a_noop() {
		let (mut registry, _loads, unloads) = registry(false);
		let path = Path::new("/mods/libtest_cmm_module.so");
		let _lib = registry.acquire(path).unwrap();
		assert!(registry.release(path));
		assert!(!registry.release(path));
		assert_eq!(unloads.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn load_failure_is_not_cached() {
		let (mut registry, loads, _unloads) = registry(true);
		let path = Path::new("/x/libfoo_cmm_module.so");
		assert!(registry.acquire(path).is_err());
		assert!(registry.is_empty());
		// A retry reaches the loader again.
		assert!(registry.acquire(path).is_err());
		assert_eq!(loads.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn descriptors_filter_by_kind() {
		let (mut registry, _loads, _unloads) = registry(false);
		let path = Path::new("/mods/libtest_cmm_module.so");
		let lib = registry.acquire(path).unwrap();
		assert_eq!(lib.descriptors_for(ApiKind::FilterCore).len(), 1);
		assert!(lib.descriptors_for(ApiKind::DevicePort).is_empty());
	}

	#[test]
	fn dropping_the_registry_shuts_down_held_libraries() {
		static RESETS: AtomicUsize = AtomicUsize::new(0);
		extern "C" fn count_reset() {
			RESETS.fetch_add(1, Ordering::SeqCst);
		}

		struct ResetLoader {
			unloads: Arc<AtomicUsize>,
		}

		impl ModuleLoader for ResetLoader {
			fn load(&self, path: &Path) -> Result<Box<dyn NativeModule>, LoadError> {
				let info = ModuleInfo {
					compat_version: 1,
					vendor: "stub".to_string(),
					apis: vec![ApiDescriptor::new(
						"//color/icc.stub",
						ApiKind::FilterCore,
						Arc::new(StubOps(ApiKind::FilterCore)),
						Some(count_reset),
						path,
						1,
					)],
				};
				Ok(Box::new(StubModule {
					info,
					unloads: Arc::clone(&self.unloads),
				}))
			}
		}

		let unloads = Arc::new(AtomicUsize::new(0));
		let mut registry = LibraryRegistry::new(Box::new(ResetLoader {
			unloads: Arc::clone(&unloads),
		}));
		let lib = registry
			.acquire(Path::new("/mods/libtest_cmm_module.so"))
			.unwrap();

		// Still held when the registry goes away.
		drop(registry);
		assert_eq!(RESETS.load(Ordering::SeqCst), 1);
		assert_eq!(unloads.load(Ordering::SeqCst), 1);
		assert!(!lib.is_loaded());
	}

	#[test]
	fn metadata_error_renders_with_path() {
		let err = LoadError::Metadata {
			path: PathBuf::from("/mods/libbad_cmm_module.so"),
			source: MetadataError::SelfCheckFailed(3),
		};
		let text = err.to_string();
		assert!(text.contains("libbad_cmm_module.so"));
		assert!(text.contains("code 3"));
	}
}
