use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Credential::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Credential::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Credential::Tenant).string().not_null())
                    .col(ColumnDef::new(Credential::Url).string().not_null())
                    .col(ColumnDef::new(Credential::Database).string().not_null())
                    .col(ColumnDef::new(Credential::Username).string().not_null())
                    .col(
                        ColumnDef::new(Credential::EncryptedApiKey)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Credential::Protocol).string_len(10).not_null())
                    .col(
                        ColumnDef::new(Credential::TimeoutSeconds)
                            .small_integer()
                            .not_null()
                            .default(30),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_credential_tenant")
                    .table(Credential::Table)
                    .col(Credential::Tenant)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Credential::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Credential {
    Table,
    Id,
    Tenant,
    Url,
    Database,
    Username,
    EncryptedApiKey,
    Protocol,
    TimeoutSeconds,
}
