#![allow(non_upper_case_globals)]
//! Minimal example module exporting the shared metadata record.
//!
//! Built as a `cdylib` named `dcmm_cmm_module`, so the artifact file name
//! carries the module infix and the metadata symbol matches the 4-letter id
//! `dcmm`. Useful as a template for real modules and as a loader fixture.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};

use chroma_cabi::{CmmApiHeader, CmmModuleInfo, kind};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

extern "C" fn module_init() -> i32 {
	INITIALIZED.store(true, Ordering::SeqCst);
	0
}

extern "C" fn module_reset() {
	INITIALIZED.store(false, Ordering::SeqCst);
}

/// Identity "transform": copies input pixels to the output unchanged.
extern "C" fn identity_transform(
	input: *const c_void,
	output: *mut c_void,
	byte_count: usize,
) -> i32 {
	if input.is_null() || output.is_null() {
		return -1;
	}
	// SAFETY: the caller provides two non-overlapping buffers of at least
	// `byte_count` bytes, per the operation contract.
	unsafe {
		std::ptr::copy_nonoverlapping(input.cast::<u8>(), output.cast::<u8>(), byte_count);
	}
	0
}

/// Operation bundle for the filter core capability, read from the host
/// side through the exported record.
#[repr(C)]
pub struct DemoFilterOps {
	/// Pixel copy entry point.
	pub transform: extern "C" fn(*const c_void, *mut c_void, usize) -> i32,
}

static FILTER_OPS: DemoFilterOps = DemoFilterOps {
	transform: identity_transform,
};

static CODEC_API: CmmApiHeader = CmmApiHeader {
	kind: kind::DATA_CODEC,
	registration: c"//demo/codec.raw._dcmm".as_ptr(),
	reset: None,
	ops: std::ptr::null(),
	next: std::ptr::null(),
};

static FILTER_API: CmmApiHeader = CmmApiHeader {
	kind: kind::FILTER_CORE,
	registration: c"//demo/identity.colorspace._dcmm".as_ptr(),
	reset: Some(module_reset),
	ops: (&raw const FILTER_OPS).cast::<c_void>(),
	next: &raw const CODEC_API,
};

/// The metadata record the host resolves by symbol name.
#[unsafe(no_mangle)]
pub static dcmm_cmm_module: CmmModuleInfo = CmmModuleInfo {
	compat_version: chroma_cabi::CHROMA_COMPAT_VERSION,
	vendor: c"Chroma demo".as_ptr(),
	init: Some(module_init),
	apis: &raw const FILTER_API,
};
