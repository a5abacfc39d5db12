//! Key→object cache for resolved module lookups.
//!
//! Keys are either short literals stored verbatim or a fixed 32-byte digest
//! of longer input. Lookup hands out shared entry identities, so repeated
//! lookups with an equal key observe the same cached value without
//! recomputation. The registry is bounded: least-recently-used entries are
//! evicted at capacity, a deliberate change from the unbounded original.

pub mod entry;
pub mod key;
pub mod registry;

pub use entry::CacheEntry;
pub use key::CacheKey;
pub use registry::CacheRegistry;
