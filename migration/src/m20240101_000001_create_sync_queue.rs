use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncQueue::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncQueue::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncQueue::Tenant).string().not_null())
                    .col(ColumnDef::new(SyncQueue::Module).string().not_null())
                    .col(ColumnDef::new(SyncQueue::EntityType).string().not_null())
                    .col(ColumnDef::new(SyncQueue::Direction).string_len(10).not_null())
                    .col(ColumnDef::new(SyncQueue::Action).string_len(10).not_null())
                    .col(ColumnDef::new(SyncQueue::LocalId).big_integer().null())
                    .col(ColumnDef::new(SyncQueue::RemoteId).big_integer().null())
                    .col(ColumnDef::new(SyncQueue::Payload).text().not_null())
                    .col(
                        ColumnDef::new(SyncQueue::Priority)
                            .small_integer()
                            .not_null()
                            .default(5),
                    )
                    .col(
                        ColumnDef::new(SyncQueue::Status)
                            .string_len(10)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(SyncQueue::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncQueue::MaxAttempts)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(ColumnDef::new(SyncQueue::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(SyncQueue::ScheduledAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyncQueue::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(SyncQueue::ProcessedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        // polling index: covers the claim query's ORDER BY (status, priority, scheduled_at)
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_queue_poll")
                    .table(SyncQueue::Table)
                    .col(SyncQueue::Status)
                    .col(SyncQueue::Priority)
                    .col(SyncQueue::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        // dedup lookup: (tenant, module, entity_type, local_id, remote_id, direction, status)
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_queue_dedup")
                    .table(SyncQueue::Table)
                    .col(SyncQueue::Tenant)
                    .col(SyncQueue::Module)
                    .col(SyncQueue::EntityType)
                    .col(SyncQueue::LocalId)
                    .col(SyncQueue::RemoteId)
                    .col(SyncQueue::Direction)
                    .col(SyncQueue::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncQueue::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncQueue {
    Table,
    Id,
    Tenant,
    Module,
    EntityType,
    Direction,
    Action,
    LocalId,
    RemoteId,
    Payload,
    Priority,
    Status,
    Attempts,
    MaxAttempts,
    ErrorMessage,
    ScheduledAt,
    CreatedAt,
    ProcessedAt,
}
