//! C ABI records every loadable module exports, and the naming conventions
//! the host uses to find them.
//!
//! A module library is recognized by the [`MODULE_INFIX`] in its file name
//! and queried through a single exported static named
//! `<4-letter id><MODULE_SYMBOL_SUFFIX>`, e.g. `lcm2_cmm_module`. The
//! static resolves to a [`CmmModuleInfo`] record carrying the module's
//! compatibility version, vendor text and a singly linked chain of
//! [`CmmApiHeader`] capability records. This crate is the single FFI seam;
//! everything behind it is plain Rust.

use std::ffi::{c_char, c_void};

/// Compatibility version of the running host.
///
/// Modules declaring the same value get the version bonus during ranking.
pub const CHROMA_COMPAT_VERSION: u32 = 100;

/// 3-character infix a candidate library file name must contain.
pub const MODULE_INFIX: &str = "cmm";

/// Suffix of the exported metadata symbol, appended to the 4-letter id.
pub const MODULE_SYMBOL_SUFFIX: &str = "_cmm_module";

/// Capability kind tags carried in [`CmmApiHeader::kind`].
pub mod kind {
	/// Color transform filter core.
	pub const FILTER_CORE: u32 = 4;
	/// Data codec (profile or image payload handling).
	pub const DATA_CODEC: u32 = 6;
	/// Pixel pipeline filter node.
	pub const FILTER_NODE: u32 = 7;
	/// Device port (monitor, printer, scanner access).
	pub const DEVICE_PORT: u32 = 8;
}

/// Module self-check hook; nonzero return fails the load.
pub type CmmInitFn = extern "C" fn() -> i32;

/// Per-capability reset hook, run before the owning library unloads.
pub type CmmResetFn = extern "C" fn();

/// One advertised capability in a module's metadata chain.
#[repr(C)]
pub struct CmmApiHeader {
	/// One of the [`kind`] constants.
	pub kind: u32,
	/// NUL-terminated registration string.
	pub registration: *const c_char,
	/// Optional reset hook.
	pub reset: Option<CmmResetFn>,
	/// Kind-specific operation bundle, opaque to the host core.
	pub ops: *const c_void,
	/// Next record in the chain, or null.
	pub next: *const CmmApiHeader,
}

/// The record a module's metadata symbol resolves to.
#[repr(C)]
pub struct CmmModuleInfo {
	/// Host compatibility version the module was built against.
	pub compat_version: u32,
	/// NUL-terminated provider/vendor text.
	pub vendor: *const c_char,
	/// Optional self-check; nonzero return rejects the module.
	pub init: Option<CmmInitFn>,
	/// Head of the capability chain, or null.
	pub apis: *const CmmApiHeader,
}

// SAFETY: the records point at immutable data inside the exporting library,
// which the host keeps loaded for as long as it uses them.
unsafe impl Sync for CmmApiHeader {}
unsafe impl Sync for CmmModuleInfo {}

/// Name of the metadata symbol for a 4-letter module id.
pub fn module_symbol(id: &str) -> String {
	format!("{id}{MODULE_SYMBOL_SUFFIX}")
}

/// Platform shared-library file suffix.
pub fn shared_library_suffix() -> &'static str {
	if cfg!(target_os = "macos") {
		".dylib"
	} else if cfg!(target_os = "windows") {
		".dll"
	} else {
		".so"
	}
}
