use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tracing::trace;

use crate::entry::CacheEntry;
use crate::key::CacheKey;

/// Default entry bound when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 128;

/// Bounded key→entry cache.
///
/// At most one entry exists per distinct key; a miss creates an empty entry
/// rather than failing. The bound evicts the least-recently-used entry,
/// which the unbounded original never did.
pub struct CacheRegistry {
	entries: LruCache<CacheKey, Arc<CacheEntry>>,
}

impl CacheRegistry {
	/// Creates a registry bounded to `capacity` entries (minimum 1).
	pub fn new(capacity: usize) -> Self {
		let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
		Self {
			entries: LruCache::new(capacity),
		}
	}

	/// Returns the entry for `key`, creating an empty one on a miss.
	///
	/// Equal keys yield the same entry identity until eviction.
	pub fn get_or_create(&mut self, key: CacheKey) -> Arc<CacheEntry> {
		if let Some(entry) = self.entries.get(&key) {
			return Arc::clone(entry);
		}
		trace!(key = ?key, "cache miss, inserting empty entry");
		let entry = Arc::new(CacheEntry::new(key.clone()));
		self.entries.put(key, Arc::clone(&entry));
		entry
	}

	/// Looks up `key` without creating an entry or touching recency.
	pub fn peek(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
		self.entries.peek(key).cloned()
	}

	/// Iterates the live entries without touching recency.
	pub fn entries(&self) -> impl Iterator<Item = &Arc<CacheEntry>> {
		self.entries.iter().map(|(_, entry)| entry)
	}

	/// Number of live entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the cache holds no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Drops every entry.
	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Human-readable dump of the cache, one line per entry.
	pub fn report(&self) -> String {
		let mut text = format!("module cache with {} entries:\n", self.entries.len());
		for (key, entry) in self.entries.iter() {
			text.push_str(&format!(
				"refs:{} value:{} key:{:?}\n",
				Arc::strong_count(entry),
				if entry.has_value() { "set" } else { "empty" },
				key,
			));
		}
		text
	}
}

impl Default for CacheRegistry {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}
