//! User and team dataset.
//!
//! The dataset lives in one YAML file. [`Snapshot`] is an immutable,
//! validated view of it; [`SnapshotStore`] keeps the current snapshot in sync
//! with the file; [`DataRepository`] is the read capability the auth service
//! is written against.

mod repository;
mod snapshot;
mod store;

pub use repository::DataRepository;
pub use snapshot::{DataError, Snapshot};
pub use store::{RELOAD_SETTLE_DELAY, ReloadReport, SnapshotStore};
