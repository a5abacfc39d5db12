//! Platform loader backed by `libloading`.
//!
//! All unsafe FFI lives here: opening the shared library, resolving the
//! metadata symbol named after the module's 4-letter id and walking the
//! exported capability chain into plain-Rust [`ModuleInfo`].

use std::ffi::{CStr, c_void};
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::warn;

use chroma_cabi::{CmmApiHeader, CmmModuleInfo, module_symbol};

use crate::discovery::module_id_from_path;
use crate::error::{LoadError, MetadataError};
use crate::library::{ApiDescriptor, ApiKind, FilterOps, ModuleInfo, ModuleLoader, NativeModule};

/// Operation bundle taken from a loaded module's metadata chain.
struct NativeOps {
	kind: ApiKind,
	ops: *const c_void,
}

// SAFETY: the pointer references static data inside the exporting library.
// The resolver keeps a library acquired for as long as any of its
// descriptors are retained in a cached result, so the data outlives every
// reachable bundle.
unsafe impl Send for NativeOps {}
unsafe impl Sync for NativeOps {}

impl FilterOps for NativeOps {
	fn kind(&self) -> ApiKind {
		self.kind
	}

	fn native_ops(&self) -> Option<NonNull<c_void>> {
		NonNull::new(self.ops.cast_mut())
	}
}

struct DlModule {
	info: ModuleInfo,
	lib: Option<Library>,
}

impl NativeModule for DlModule {
	fn info(&self) -> &ModuleInfo {
		&self.info
	}
}

impl Drop for DlModule {
	fn drop(&mut self) {
		// Descriptor reset hooks already ran in the registry shutdown.
		if let Some(lib) = self.lib.take()
			&& let Err(error) = lib.close()
		{
			// Unload failure is logged, never fatal.
			warn!(%error, "failed to unload module library");
		}
	}
}

/// Production [`ModuleLoader`] using the platform dynamic loader.
#[derive(Debug, Default)]
pub struct DlLoader;

impl DlLoader {
	/// Creates the loader.
	pub fn new() -> Self {
		Self
	}
}

fn metadata_error(path: &Path, source: MetadataError) -> LoadError {
	LoadError::Metadata {
		path: path.to_path_buf(),
		source,
	}
}

impl ModuleLoader for DlLoader {
	fn load(&self, path: &Path) -> Result<Box<dyn NativeModule>, LoadError> {
		let id = module_id_from_path(path)
			.ok_or_else(|| metadata_error(path, MetadataError::NoModuleId(path.to_path_buf())))?;
		let symbol = module_symbol(&id);

		// SAFETY: loading runs the library's initializers; that is the
		// contract of a module library.
		let lib = unsafe { Library::new(path) }.map_err(|error| LoadError::NotFound {
			path: path.to_path_buf(),
			detail: error.to_string(),
		})?;

		let mut symbol_bytes = symbol.clone().into_bytes();
		symbol_bytes.push(0);

		// SAFETY: the symbol is an exported static of type CmmModuleInfo;
		// dereferencing the Symbol yields its address.
		let record: *const CmmModuleInfo = unsafe {
			match lib.get::<*const CmmModuleInfo>(&symbol_bytes) {
				Ok(sym) => {
					let sym: Symbol<*const CmmModuleInfo> = sym;
					*sym
				}
				Err(error) => {
					// The handle drops here: no leaked OS handle on a
					// metadata failure.
					return Err(metadata_error(
						path,
						MetadataError::MissingSymbol {
							symbol,
							detail: error.to_string(),
						},
					));
				}
			}
		};

		if record.is_null() {
			return Err(metadata_error(path, MetadataError::NullRecord(symbol)));
		}

		// SAFETY: non-null record exported by the library we just loaded.
		let info = unsafe { parse_record(&*record, path) };
		let info = match info {
			Ok(info) => info,
			Err(source) => return Err(metadata_error(path, source)),
		};

		Ok(Box::new(DlModule {
			info,
			lib: Some(lib),
		}))
	}
}

/// Walks the exported record into owned metadata.
///
/// # Safety
/// `record` and every reachable chain pointer must be valid for the
/// lifetime of the call.
unsafe fn parse_record(record: &CmmModuleInfo, path: &Path) -> Result<ModuleInfo, MetadataError> {
	if let Some(init) = record.init {
		let code = init();
		if code != 0 {
			return Err(MetadataError::SelfCheckFailed(code));
		}
	}

	let vendor = if record.vendor.is_null() {
		String::new()
	} else {
		// SAFETY: per the metadata contract, a NUL-terminated string.
		unsafe { CStr::from_ptr(record.vendor) }
			.to_string_lossy()
			.into_owned()
	};

	let mut apis = Vec::new();
	let mut cursor: *const CmmApiHeader = record.apis;
	while !cursor.is_null() {
		// SAFETY: non-null chain record exported by the module.
		let header = unsafe { &*cursor };
		cursor = header.next;

		let Some(kind) = ApiKind::from_raw(header.kind) else {
			warn!(
				path = %path.display(),
				kind = header.kind,
				"skipping capability with unknown kind tag"
			);
			continue;
		};
		if header.registration.is_null() {
			warn!(path = %path.display(), "skipping capability without registration");
			continue;
		}
		// SAFETY: non-null, NUL-terminated per the metadata contract.
		let registration = match unsafe { CStr::from_ptr(header.registration) }.to_str() {
			Ok(text) => text.to_string(),
			Err(_) => {
				warn!(path = %path.display(), "skipping capability with non-UTF-8 registration");
				continue;
			}
		};

		apis.push(ApiDescriptor::new(
			registration,
			kind,
			Arc::new(NativeOps {
				kind,
				ops: header.ops,
			}),
			header.reset,
			path,
			record.compat_version,
		));
	}

	Ok(ModuleInfo {
		compat_version: record.compat_version,
		vendor,
		apis,
	})
}
