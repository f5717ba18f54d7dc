pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_sync_queue;
mod m20240101_000002_create_entity_map;
mod m20240101_000003_create_credential;
mod m20240101_000004_create_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_sync_queue::Migration),
            Box::new(m20240101_000002_create_entity_map::Migration),
            Box::new(m20240101_000003_create_credential::Migration),
            Box::new(m20240101_000004_create_logs::Migration),
        ]
    }
}
