//! `SeaORM` Entity prelude.

pub use super::credential::Entity as Credential;
pub use super::entity_map::Entity as EntityMap;
pub use super::log_entry::Entity as LogEntry;
pub use super::sync_queue::Entity as SyncQueue;
