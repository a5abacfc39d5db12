use std::sync::{Mutex, MutexGuard, PoisonError};

use chroma_object::ObjectHandle;

use crate::key::CacheKey;

/// One cache slot: a key plus at most one owned value object.
///
/// Entries are shared by identity: the registry hands out the same entry
/// for an equal key, so a value set through one lookup is visible through
/// every later one.
pub struct CacheEntry {
	key: CacheKey,
	value: Mutex<Option<ObjectHandle>>,
}

impl CacheEntry {
	pub(crate) fn new(key: CacheKey) -> Self {
		Self {
			key,
			value: Mutex::new(None),
		}
	}

	/// The key this entry is stored under.
	pub fn key(&self) -> &CacheKey {
		&self.key
	}

	// A poisoned lock still carries a usable value; reads and writes
	// proceed rather than silently turning into no-ops.
	fn guard(&self) -> MutexGuard<'_, Option<ObjectHandle>> {
		self.value.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Clones out the stored value, if any.
	pub fn value(&self) -> Option<ObjectHandle> {
		self.guard().clone()
	}

	/// Whether a value is present.
	pub fn has_value(&self) -> bool {
		self.guard().is_some()
	}

	/// Stores `object`, releasing any previous value.
	pub fn set_value(&self, object: ObjectHandle) {
		*self.guard() = Some(object);
	}

	/// Drops the stored value, keeping the entry.
	pub fn clear_value(&self) {
		*self.guard() = None;
	}
}

#[cfg(test)]
mod tests {
	use chroma_object::ObjectKind;

	use super::*;

	#[test]
	fn set_value_releases_previous() {
		let entry = CacheEntry::new(CacheKey::from_text("k"));
		let first = ObjectHandle::new(ObjectKind::Opaque(1), 1u32);
		let watch = first.observe();
		entry.set_value(first);
		assert!(entry.has_value());

		entry.set_value(ObjectHandle::new(ObjectKind::Opaque(1), 2u32));
		// The replaced value lost its only owner.
		assert!(watch.upgrade().is_none());
		let current = entry.value().unwrap();
		assert_eq!(current.downcast_ref::<u32>(), Some(&2));
	}

	#[test]
	fn poisoned_lock_does_not_drop_writes() {
		let entry = CacheEntry::new(CacheKey::from_text("k"));
		let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			let _guard = entry.value.lock().unwrap();
			panic!("poison the value lock");
		}));
		assert!(entry.value.lock().is_err());

		entry.set_value(ObjectHandle::new(ObjectKind::Opaque(1), 5u32));
		assert!(entry.has_value());
		let current = entry.value().unwrap();
		assert_eq!(current.downcast_ref::<u32>(), Some(&5));

		entry.clear_value();
		assert!(!entry.has_value());
	}
}
