use crate::handle::ObjectHandle;

/// Insertion-ordered, growable container of owned object handles.
///
/// The list length always equals the number of live owned handles; clearing
/// drops every element before truncation.
#[derive(Default)]
pub struct ObjectList {
	items: Vec<ObjectHandle>,
}

impl ObjectList {
	/// Creates an empty list.
	pub fn new() -> Self {
		Self::default()
	}

	/// Takes ownership of `handle`, appending it.
	pub fn move_in(&mut self, handle: ObjectHandle) {
		self.items.push(handle);
	}

	/// Removes and returns the element at `index`, shifting the rest.
	pub fn remove_at(&mut self, index: usize) -> Option<ObjectHandle> {
		if index < self.items.len() {
			Some(self.items.remove(index))
		} else {
			None
		}
	}

	/// Number of owned handles.
	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// Whether the list is empty.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Borrows the element at `index`.
	pub fn get(&self, index: usize) -> Option<&ObjectHandle> {
		self.items.get(index)
	}

	/// Iterates the owned handles in order.
	pub fn iter(&self) -> impl Iterator<Item = &ObjectHandle> {
		self.items.iter()
	}

	/// Releases every element, leaving the list empty.
	pub fn clear(&mut self) {
		self.items.clear();
	}

	/// Stable sort by an externally supplied rank array, highest rank first.
	///
	/// `ranks` must be at least as long as the list; it is permuted in step
	/// with the elements so callers keep a rank per position.
	pub fn sort_by_ranks(&mut self, ranks: &mut [i32]) {
		debug_assert!(ranks.len() >= self.items.len());
		let n = self.items.len();
		let mut order: Vec<usize> = (0..n).collect();
		// Vec::sort_by is stable, so equal ranks keep insertion order.
		order.sort_by(|&a, &b| ranks[b].cmp(&ranks[a]));

		let mut items = Vec::with_capacity(n);
		let mut sorted_ranks = Vec::with_capacity(n);
		for &i in &order {
			sorted_ranks.push(ranks[i]);
		}
		let old: Vec<ObjectHandle> = std::mem::take(&mut self.items);
		let mut slots: Vec<Option<ObjectHandle>> = old.into_iter().map(Some).collect();
		for &i in &order {
			if let Some(h) = slots[i].take() {
				items.push(h);
			}
		}
		ranks[..n].copy_from_slice(&sorted_ranks);
		self.items = items;
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::handle::ObjectKind;

	fn obj(tag: u32) -> ObjectHandle {
		ObjectHandle::new(ObjectKind::Opaque(1), tag)
	}

	fn tag_of(h: &ObjectHandle) -> u32 {
		*h.downcast_ref::<u32>().unwrap()
	}

	#[test]
	fn move_in_and_remove_keep_length_honest() {
		let mut list = ObjectList::new();
		list.move_in(obj(1));
		list.move_in(obj(2));
		assert_eq!(list.len(), 2);
		let removed = list.remove_at(0).unwrap();
		assert_eq!(tag_of(&removed), 1);
		assert_eq!(list.len(), 1);
		assert!(list.remove_at(5).is_none());
	}

	#[test]
	fn clear_releases_elements() {
		let mut list = ObjectList::new();
		let h = obj(9);
		let obs = h.observe();
		list.move_in(h);
		list.clear();
		assert!(list.is_empty());
		assert!(obs.upgrade().is_none());
	}

	#[test]
	fn sort_is_stable_and_descending() {
		let mut list = ObjectList::new();
		for tag in [10, 20, 30, 40] {
			list.move_in(obj(tag));
		}
		let mut ranks = vec![1, 3, 3, 2];
		list.sort_by_ranks(&mut ranks);
		assert_eq!(ranks, vec![3, 3, 2, 1]);
		let tags: Vec<u32> = list.iter().map(tag_of).collect();
		// 20 and 30 tie on rank 3 and keep their relative order.
		assert_eq!(tags, vec![20, 30, 40, 10]);
	}
}
