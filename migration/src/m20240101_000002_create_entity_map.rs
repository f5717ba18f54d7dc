use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EntityMap::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EntityMap::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EntityMap::Tenant).string().not_null())
                    .col(ColumnDef::new(EntityMap::Module).string().not_null())
                    .col(ColumnDef::new(EntityMap::EntityType).string().not_null())
                    .col(ColumnDef::new(EntityMap::LocalId).big_integer().not_null())
                    .col(ColumnDef::new(EntityMap::RemoteId).big_integer().not_null())
                    .col(ColumnDef::new(EntityMap::RemoteModel).string().not_null())
                    .col(ColumnDef::new(EntityMap::SyncHash).string_len(64).not_null())
                    .col(
                        ColumnDef::new(EntityMap::LastSyncedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // composite uniqueness: one mapping per (tenant, module, entity_type, local_id, remote_id)
        manager
            .create_index(
                Index::create()
                    .name("uq_entity_map_composite")
                    .table(EntityMap::Table)
                    .col(EntityMap::Tenant)
                    .col(EntityMap::Module)
                    .col(EntityMap::EntityType)
                    .col(EntityMap::LocalId)
                    .col(EntityMap::RemoteId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // lookup path 1: (tenant, entity_type, local_id)
        manager
            .create_index(
                Index::create()
                    .name("idx_entity_map_local")
                    .table(EntityMap::Table)
                    .col(EntityMap::Tenant)
                    .col(EntityMap::EntityType)
                    .col(EntityMap::LocalId)
                    .to_owned(),
            )
            .await?;

        // lookup path 2: (tenant, remote_model, remote_id)
        manager
            .create_index(
                Index::create()
                    .name("idx_entity_map_remote")
                    .table(EntityMap::Table)
                    .col(EntityMap::Tenant)
                    .col(EntityMap::RemoteModel)
                    .col(EntityMap::RemoteId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EntityMap::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EntityMap {
    Table,
    Id,
    Tenant,
    Module,
    EntityType,
    LocalId,
    RemoteId,
    RemoteModel,
    SyncHash,
    LastSyncedAt,
}
