//! Kind-tagged, observable, shared-ownership objects.
//!
//! Everything the module runtime caches or passes between subsystems is an
//! [`ObjectHandle`]: a shared-ownership handle around a kind-tagged payload.
//! Destruction happens exactly once, when the last strong handle drops;
//! observers ([`ObserverHandle`]) and parent back-links never extend a
//! payload's lifetime.

pub mod describe;
pub mod handle;
pub mod list;

pub use describe::register_describer;
pub use handle::{ObjectHandle, ObjectKind, ObserverHandle};
pub use list::ObjectList;
