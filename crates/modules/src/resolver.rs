//! Capability resolution: discovery, ranking, deduplication, caching.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bitflags::bitflags;
use tracing::{debug, trace};

use chroma_cache::{CacheKey, CacheRegistry};
use chroma_object::{ObjectHandle, ObjectKind, ObjectList};

use crate::config::EngineConfig;
use crate::discovery::{FsLister, ModuleLister};
use crate::library::{ApiDescriptor, ApiKind, LibraryRegistry, ModuleLibrary, ModuleLoader};
use crate::loader::DlLoader;
use crate::registration::{NormalizeMode, match_rank, normalize};
use crate::sink::{MessageSink, Severity, TracingSink};
use crate::LoadError;

bitflags! {
	/// Behavior flags for [`Engine::find_apis`].
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct FindFlags: u32 {
		/// Deduplicate candidates by their attribute-stripped
		/// registration, keeping the best-ranked of each group.
		const STRIP_IMPL_ATTR = 1;
	}
}

/// Ranked result set of one capability query.
#[derive(Debug, Clone, Default)]
pub struct ApiMatches {
	/// Surviving descriptors, best rank first.
	pub apis: Vec<ApiDescriptor>,
	/// Rank per descriptor, non-increasing.
	pub ranks: Vec<i32>,
}

impl ApiMatches {
	/// Whether the query matched nothing. A valid steady-state result,
	/// not an error.
	pub fn is_empty(&self) -> bool {
		self.apis.is_empty()
	}
}

/// The module resolution engine.
///
/// One explicit context value owning the library registry and the result
/// cache; no process-wide state. Every higher-level subsystem asks it for
/// capabilities by registration string and kind.
pub struct Engine {
	libraries: LibraryRegistry,
	cache: CacheRegistry,
	lister: Box<dyn ModuleLister>,
	sink: Arc<dyn MessageSink>,
	compat_version: u32,
	/// Paths pinned with exactly one engine acquisition each, for as long
	/// as some cached result references descriptors from them.
	held: HashSet<PathBuf>,
}

impl Engine {
	/// Builds an engine from explicit collaborators.
	pub fn new(
		config: &EngineConfig,
		loader: Box<dyn ModuleLoader>,
		lister: Box<dyn ModuleLister>,
		sink: Arc<dyn MessageSink>,
	) -> Self {
		Self {
			libraries: LibraryRegistry::new(loader),
			cache: CacheRegistry::new(config.cache_capacity),
			lister,
			sink,
			compat_version: chroma_cabi::CHROMA_COMPAT_VERSION,
			held: HashSet::new(),
		}
	}

	/// Builds an engine with the platform loader, a file-system lister
	/// over the configured search paths and the `tracing` sink.
	pub fn with_defaults(config: &EngineConfig) -> Self {
		Self::new(
			config,
			Box::new(DlLoader::new()),
			Box::new(FsLister::new(config.search_paths.clone())),
			Arc::new(TracingSink),
		)
	}

	/// Overrides the host compatibility version used for the rank bonus.
	pub fn set_compat_version(&mut self, version: u32) {
		self.compat_version = version;
	}

	/// Finds every capability matching `requested` and `kind`, ranked.
	///
	/// Results are cached per `(requested, kind, flags)`. A candidate that
	/// fails to load is reported through the sink and skipped; the scan is
	/// best effort and never turns into a hard error. An empty result is
	/// the normal "nothing matches" answer.
	pub fn find_apis(&mut self, requested: &str, kind: ApiKind, flags: FindFlags) -> ApiMatches {
		let key = CacheKey::from_text(&format!(
			"{requested};{};{}",
			kind.as_raw(),
			flags.bits()
		));
		let entry = self.cache.get_or_create(key);
		if let Some(value) = entry.value()
			&& let Some(found) = value.downcast_ref::<ApiMatches>()
		{
			trace!(requested, "capability query served from cache");
			return found.clone();
		}

		let mut kept: Vec<(ApiDescriptor, i32)> = Vec::new();
		for path in self.lister.candidate_paths() {
			let library = match self.libraries.acquire(&path) {
				Ok(library) => library,
				Err(error) => {
					self.sink.report(
						Severity::InsufficientData,
						&path.display().to_string(),
						&format!("skipping candidate: {error}"),
					);
					continue;
				}
			};

			let mut kept_here = 0usize;
			for descriptor in library.descriptors_for(kind) {
				if descriptor.registration().is_empty() {
					continue;
				}
				let rank = self.rank_candidate(requested, &descriptor);
				if rank > 0 {
					kept.push((descriptor, rank));
					kept_here += 1;
				}
			}

			// Nothing kept from this library: let go of it again. A
			// contributing library is pinned with at most one engine
			// acquisition, however many queries or recomputations keep
			// descriptors from it.
			if kept_here == 0 || !self.held.insert(path.clone()) {
				self.libraries.release(&path);
			}
		}

		if flags.contains(FindFlags::STRIP_IMPL_ATTR) {
			kept = dedup_keep_best(kept);
		}

		let mut ranks: Vec<i32> = kept.iter().map(|(_, rank)| *rank).collect();
		let mut list = ObjectList::new();
		for (descriptor, _) in kept {
			list.move_in(ObjectHandle::new(ObjectKind::ApiDescriptors, descriptor));
		}
		list.sort_by_ranks(&mut ranks);

		let apis: Vec<ApiDescriptor> = list
			.iter()
			.filter_map(|handle| handle.downcast_ref::<ApiDescriptor>().cloned())
			.collect();
		let found = ApiMatches { apis, ranks };

		debug!(
			requested,
			matches = found.apis.len(),
			"capability query resolved"
		);
		entry.set_value(ObjectHandle::new(ObjectKind::ApiDescriptors, found.clone()));
		self.prune_holds();
		found
	}

	/// Releases engine holds on libraries no cached result references
	/// anymore, pairing the acquisition taken when the library first
	/// contributed. Cache eviction makes a hold stale; it is collected on
	/// the next store.
	fn prune_holds(&mut self) {
		let mut referenced: HashSet<PathBuf> = HashSet::new();
		for entry in self.cache.entries() {
			let Some(value) = entry.value() else {
				continue;
			};
			if let Some(found) = value.downcast_ref::<ApiMatches>() {
				referenced.extend(found.apis.iter().map(|api| api.origin().to_path_buf()));
			} else if let Some(api) = value.downcast_ref::<ApiDescriptor>() {
				referenced.insert(api.origin().to_path_buf());
			}
		}
		let stale: Vec<PathBuf> = self
			.held
			.iter()
			.filter(|path| !referenced.contains(*path))
			.cloned()
			.collect();
		for path in stale {
			self.held.remove(&path);
			self.libraries.release(&path);
		}
	}

	/// Convenience wrapper returning just the top-ranked capability.
	///
	/// Cached under its own key, so repeated single-capability lookups
	/// skip even the result-set copy.
	pub fn get_single_api(&mut self, requested: &str, kind: ApiKind) -> Option<ApiDescriptor> {
		let key = CacheKey::from_text(&format!("{requested}.{}_", kind.as_char()));
		let entry = self.cache.get_or_create(key);
		if let Some(value) = entry.value()
			&& let Some(descriptor) = value.downcast_ref::<ApiDescriptor>()
		{
			return Some(descriptor.clone());
		}

		let found = self.find_apis(requested, kind, FindFlags::empty());
		let top = found.apis.into_iter().next()?;
		entry.set_value(ObjectHandle::new(ObjectKind::ApiDescriptors, top.clone()));
		Some(top)
	}

	fn rank_candidate(&self, requested: &str, descriptor: &ApiDescriptor) -> i32 {
		let base = match_rank(requested, descriptor.registration());
		let mut rank = base;
		// Version bonus, and the wildcard case where an empty request
		// matches everything with the bonus alone.
		if (base > 0 && descriptor.compat_version() == self.compat_version)
			|| requested.is_empty()
		{
			rank += 1;
		}
		rank
	}

	/// Acquires a library directly, for collaborators that keep one.
	pub fn acquire_library(&mut self, path: &Path) -> Result<Arc<ModuleLibrary>, LoadError> {
		self.libraries.acquire(path)
	}

	/// Releases a direct library acquisition.
	pub fn release_library(&mut self, path: &Path) -> bool {
		self.libraries.release(path)
	}

	/// The library registry, for inspection.
	pub fn libraries(&self) -> &LibraryRegistry {
		&self.libraries
	}

	/// Human-readable dump of the result cache.
	pub fn cache_report(&self) -> String {
		self.cache.report()
	}
}

/// Groups descriptors by stripped registration and keeps the best-ranked
/// per group; ties keep the first encountered.
fn dedup_keep_best(kept: Vec<(ApiDescriptor, i32)>) -> Vec<(ApiDescriptor, i32)> {
	let mut out: Vec<(ApiDescriptor, i32)> = Vec::new();
	let mut groups: HashMap<String, usize> = HashMap::new();
	for (descriptor, rank) in kept {
		let stripped = normalize(
			descriptor.registration(),
			NormalizeMode::StripImplementationAttr,
		);
		match groups.get(&stripped) {
			Some(&index) => {
				if rank > out[index].1 {
					out[index] = (descriptor, rank);
				}
			}
			None => {
				groups.insert(stripped, out.len());
				out.push((descriptor, rank));
			}
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::library::FilterOps;

	struct StubOps;

	impl FilterOps for StubOps {
		fn kind(&self) -> ApiKind {
			ApiKind::FilterCore
		}
	}

	fn descriptor(registration: &str) -> ApiDescriptor {
		ApiDescriptor::new(
			registration,
			ApiKind::FilterCore,
			Arc::new(StubOps),
			None,
			"/mods/libtest_cmm_module.so",
			100,
		)
	}

	#[test]
	fn dedup_keeps_highest_rank() {
		let kept = vec![
			(descriptor("//vendor/effect.colorspace._a"), 3),
			(descriptor("//vendor/effect.colorspace._b"), 4),
		];
		let out = dedup_keep_best(kept);
		assert_eq!(out.len(), 1);
		assert_eq!(out[0].0.registration(), "//vendor/effect.colorspace._b");
		assert_eq!(out[0].1, 4);
	}

	#[test]
	fn dedup_tie_keeps_first() {
		let kept = vec![
			(descriptor("//vendor/effect.colorspace._a"), 3),
			(descriptor("//vendor/effect.colorspace._b"), 3),
		];
		let out = dedup_keep_best(kept);
		assert_eq!(out.len(), 1);
		assert_eq!(out[0].0.registration(), "//vendor/effect.colorspace._a");
	}

	#[test]
	fn dedup_leaves_distinct_capabilities_alone() {
		let kept = vec![
			(descriptor("//vendor/effect.colorspace"), 3),
			(descriptor("//vendor/effect.proof"), 3),
		];
		assert_eq!(dedup_keep_best(kept).len(), 2);
	}
}
