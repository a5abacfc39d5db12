use std::any::Any;
use std::sync::{Arc, Mutex, Weak};

use crate::describe;

/// Type tag assigned at construction and never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
	/// A cache registry entry.
	CacheEntry,
	/// A ranked set of resolved API descriptors.
	ApiDescriptors,
	/// Parsed module metadata.
	ModuleInfo,
	/// A collaborator-owned kind the core does not interpret.
	Opaque(u32),
}

struct Inner {
	kind: ObjectKind,
	payload: Box<dyn Any + Send + Sync>,
	/// Diagnostic back-links to owners. Names only, never ownership.
	parents: Mutex<Vec<String>>,
}

/// Strong, shared-ownership handle around a kind-tagged payload.
///
/// Cloning increments ownership; the payload is dropped exactly once, when
/// the last strong handle goes away. Double release cannot be expressed:
/// [`ObjectHandle::release`] consumes the handle.
#[derive(Clone)]
pub struct ObjectHandle {
	inner: Arc<Inner>,
}

/// Weak observer of an object. Never keeps the payload alive.
#[derive(Clone)]
pub struct ObserverHandle {
	inner: Weak<Inner>,
	kind: ObjectKind,
}

impl ObjectHandle {
	/// Wraps `payload` under the given kind.
	///
	/// Lazily registers a default describe callback for `kind`; the
	/// registration is idempotent and process-wide.
	pub fn new<T: Any + Send + Sync>(kind: ObjectKind, payload: T) -> Self {
		describe::ensure_default(kind);
		Self {
			inner: Arc::new(Inner {
				kind,
				payload: Box::new(payload),
				parents: Mutex::new(Vec::new()),
			}),
		}
	}

	/// Returns the immutable type tag.
	pub fn kind(&self) -> ObjectKind {
		self.inner.kind
	}

	/// Typed accessor. Returns `None` when the payload is not a `T`.
	///
	/// A mismatch is a programming error on the caller's side; it yields
	/// `None` rather than reinterpreting the payload.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.inner.payload.downcast_ref::<T>()
	}

	/// Creates a weak observer of this object.
	pub fn observe(&self) -> ObserverHandle {
		ObserverHandle {
			inner: Arc::downgrade(&self.inner),
			kind: self.inner.kind,
		}
	}

	/// Records a diagnostic back-link to a parent.
	pub fn add_parent_link(&self, name: &str) {
		if let Ok(mut parents) = self.inner.parents.lock() {
			parents.push(name.to_string());
		}
	}

	/// Returns the recorded parent names.
	pub fn parent_links(&self) -> Vec<String> {
		self.inner
			.parents
			.lock()
			.map(|p| p.clone())
			.unwrap_or_default()
	}

	/// Number of strong owners, for diagnostics.
	pub fn strong_count(&self) -> usize {
		Arc::strong_count(&self.inner)
	}

	/// Number of live observers, for diagnostics.
	pub fn observer_count(&self) -> usize {
		Arc::weak_count(&self.inner)
	}

	/// Whether two handles refer to the same object.
	pub fn same_object(a: &Self, b: &Self) -> bool {
		Arc::ptr_eq(&a.inner, &b.inner)
	}

	/// Gives up this handle's ownership share.
	///
	/// Dropping the last strong handle destroys the payload; releasing an
	/// already-shared object is always safe.
	pub fn release(self) {
		drop(self);
	}

	/// Human-readable description via the per-kind describe callback.
	pub fn describe(&self) -> String {
		describe::run(self)
	}
}

impl std::fmt::Debug for ObjectHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ObjectHandle")
			.field("kind", &self.inner.kind)
			.field("strong", &self.strong_count())
			.field("observers", &self.observer_count())
			.finish()
	}
}

impl ObserverHandle {
	/// The kind recorded when the observer was created.
	pub fn kind(&self) -> ObjectKind {
		self.kind
	}

	/// Attempts to regain a strong handle. `None` once all owners dropped.
	pub fn upgrade(&self) -> Option<ObjectHandle> {
		self.inner.upgrade().map(|inner| ObjectHandle { inner })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn downcast_mismatch_returns_none() {
		let h = ObjectHandle::new(ObjectKind::Opaque(7), 42u32);
		assert_eq!(h.downcast_ref::<u32>(), Some(&42));
		assert!(h.downcast_ref::<String>().is_none());
	}

	#[test]
	fn observer_does_not_keep_alive() {
		let h = ObjectHandle::new(ObjectKind::ModuleInfo, "meta".to_string());
		let obs = h.observe();
		assert!(obs.upgrade().is_some());
		h.release();
		assert!(obs.upgrade().is_none());
	}

	#[test]
	fn clone_shares_identity() {
		let a = ObjectHandle::new(ObjectKind::CacheEntry, 1u8);
		let b = a.clone();
		assert!(ObjectHandle::same_object(&a, &b));
		assert_eq!(a.strong_count(), 2);
		b.release();
		assert_eq!(a.strong_count(), 1);
	}

	#[test]
	fn parent_links_are_diagnostic_only() {
		let h = ObjectHandle::new(ObjectKind::CacheEntry, 0u8);
		h.add_parent_link("cache-registry");
		assert_eq!(h.parent_links(), vec!["cache-registry".to_string()]);
		// A parent link must not show up as ownership.
		assert_eq!(h.strong_count(), 1);
	}
}
