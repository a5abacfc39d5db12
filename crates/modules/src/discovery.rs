//! Candidate library enumeration.
//!
//! Candidates are files in the configured search directories whose names
//! carry the module infix and the platform shared-library suffix, e.g.
//! `liblcm2_cmm_module.so`.

use std::path::{Path, PathBuf};

use tracing::trace;

use chroma_cabi::{MODULE_INFIX, MODULE_SYMBOL_SUFFIX, shared_library_suffix};

/// Enumerates candidate library paths. A file-system collaborator from the
/// resolver's point of view, replaceable in tests.
pub trait ModuleLister: Send {
	/// Candidate paths in search order.
	fn candidate_paths(&self) -> Vec<PathBuf>;
}

/// File-system lister over an ordered directory list.
#[derive(Debug, Clone)]
pub struct FsLister {
	search_paths: Vec<PathBuf>,
}

impl FsLister {
	/// Creates a lister over `search_paths`, scanned in order.
	pub fn new(search_paths: Vec<PathBuf>) -> Self {
		Self { search_paths }
	}

	fn is_candidate(name: &str) -> bool {
		name.contains(MODULE_INFIX) && name.ends_with(shared_library_suffix())
	}
}

impl ModuleLister for FsLister {
	fn candidate_paths(&self) -> Vec<PathBuf> {
		let mut candidates = Vec::new();
		for dir in &self.search_paths {
			let Ok(entries) = std::fs::read_dir(dir) else {
				trace!(dir = %dir.display(), "search directory not readable, skipping");
				continue;
			};
			let mut found: Vec<PathBuf> = entries
				.flatten()
				.map(|entry| entry.path())
				.filter(|path| {
					path.is_file()
						&& path
							.file_name()
							.and_then(|name| name.to_str())
							.is_some_and(Self::is_candidate)
				})
				.collect();
			// Deterministic order within one directory.
			found.sort();
			candidates.extend(found);
		}
		candidates
	}
}

/// Extracts the 4-letter module id from a library file name.
///
/// The id is the four bytes preceding the metadata marker, so
/// `liblcm2_cmm_module.so` yields `lcm2`. A bare 4-letter name is taken as
/// the id itself.
pub fn module_id_from_path(path: &Path) -> Option<String> {
	let name = path.file_name()?.to_str()?;
	if let Some(pos) = name.find(MODULE_SYMBOL_SUFFIX)
		&& pos >= 4
		&& name.is_char_boundary(pos - 4)
	{
		return Some(name[pos - 4..pos].to_string());
	}
	let stem = path.file_stem()?.to_str()?;
	if stem.len() == 4 {
		return Some(stem.to_string());
	}
	None
}

/// Whether a library path belongs to the given 4-letter module id.
pub fn library_matches_id(path: &Path, id: &str) -> bool {
	module_id_from_path(path).is_some_and(|found| found == id)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn id_extraction() {
		assert_eq!(
			module_id_from_path(Path::new("/usr/lib/liblcm2_cmm_module.so")),
			Some("lcm2".to_string())
		);
		assert_eq!(
			module_id_from_path(Path::new("dcmm_cmm_module.dylib")),
			Some("dcmm".to_string())
		);
		assert_eq!(module_id_from_path(Path::new("qcms")), Some("qcms".to_string()));
		assert_eq!(module_id_from_path(Path::new("libplain.so")), None);
	}

	#[test]
	fn id_matching() {
		let path = Path::new("/mods/liblcm2_cmm_module.so");
		assert!(library_matches_id(path, "lcm2"));
		assert!(!library_matches_id(path, "qcms"));
	}

	#[test]
	fn lister_filters_by_infix_and_suffix() {
		let dir = tempfile::tempdir().unwrap();
		let suffix = shared_library_suffix();
		let module = dir.path().join(format!("liblcm2_cmm_module{suffix}"));
		let plain = dir.path().join(format!("libplain{suffix}"));
		let text = dir.path().join("readme.txt");
		for file in [&module, &plain, &text] {
			std::fs::write(file, b"").unwrap();
		}

		let lister = FsLister::new(vec![dir.path().to_path_buf()]);
		assert_eq!(lister.candidate_paths(), vec![module]);
	}

	#[test]
	fn missing_directory_is_skipped() {
		let lister = FsLister::new(vec![PathBuf::from("/does/not/exist")]);
		assert!(lister.candidate_paths().is_empty());
	}

	#[test]
	fn directories_are_scanned_in_order() {
		let first = tempfile::tempdir().unwrap();
		let second = tempfile::tempdir().unwrap();
		let suffix = shared_library_suffix();
		let a = first.path().join(format!("libzcmm_cmm_module{suffix}"));
		let b = second.path().join(format!("libacmm_cmm_module{suffix}"));
		std::fs::write(&a, b"").unwrap();
		std::fs::write(&b, b"").unwrap();

		let lister = FsLister::new(vec![
			first.path().to_path_buf(),
			second.path().to_path_buf(),
		]);
		// First directory wins the ordering even with a "later" name.
		assert_eq!(lister.candidate_paths(), vec![a, b]);
	}
}
