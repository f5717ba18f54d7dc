//! `SeaORM` entities for the synchronization core: `sync_queue`,
//! `entity_map`, `credential`, `logs`. Circuit-breaker state is deliberately
//! not here — it is process-wide in-memory state owned by the engine.

pub mod credential;
pub mod entity_map;
pub mod log_entry;
pub mod prelude;
pub mod sea_orm_active_enums;
pub mod sync_queue;
