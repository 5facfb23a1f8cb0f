use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Policies {
    Table,
    Id,
    Key,
    Scope,
    PositionKey,
    Effect,
    Actions,
    Resources,
    Inherit,
    Spread,
    Enabled,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Policies::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Policies::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Policies::Key).string())
                    .col(ColumnDef::new(Policies::Scope).string().not_null())
                    .col(ColumnDef::new(Policies::PositionKey).string())
                    .col(
                        ColumnDef::new(Policies::Effect)
                            .string()
                            .not_null()
                            .default("allow"),
                    )
                    .col(ColumnDef::new(Policies::Actions).json_binary().not_null())
                    .col(ColumnDef::new(Policies::Resources).json_binary().not_null())
                    .col(
                        ColumnDef::new(Policies::Inherit)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Policies::Spread)
                            .string()
                            .not_null()
                            .default("exact"),
                    )
                    .col(
                        ColumnDef::new(Policies::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Policies::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_policies_scope")
                    .table(Policies::Table)
                    .col(Policies::Scope)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_policies_position_key")
                    .table(Policies::Table)
                    .col(Policies::PositionKey)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Policies::Table).if_exists().to_owned())
            .await
    }
}
