//! # confab-store
//!
//! The Session State Store: exclusive owner of conversations and their
//! messages. All mutation happens through [`SessionStore::atomic_update`],
//! which serializes concurrent mutators against the same conversation while
//! letting different conversations proceed independently.
//!
//! Each successful durable update triggers the [`PersistenceHook`]; hook
//! failures are logged and never roll back the in-memory state.

#![deny(unsafe_code)]

pub mod errors;
pub mod hook;
pub mod store;

pub use errors::StoreError;
pub use hook::{JsonSnapshotHook, NullHook, PersistenceHook, load_snapshot_dir};
pub use store::{AppliedUpdate, SessionStore, UpdateMode, UpdateOptions};
