use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Memberships {
    Table,
    Id,
    PrincipalId,
    OrgPath,
    PositionKey,
    Active,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Memberships::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Memberships::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Memberships::PrincipalId).string().not_null())
                    .col(ColumnDef::new(Memberships::OrgPath).string().not_null())
                    .col(ColumnDef::new(Memberships::PositionKey).string().not_null())
                    .col(
                        ColumnDef::new(Memberships::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Memberships::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_memberships_principal_org_position")
                    .table(Memberships::Table)
                    .col(Memberships::PrincipalId)
                    .col(Memberships::OrgPath)
                    .col(Memberships::PositionKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_memberships_principal_active")
                    .table(Memberships::Table)
                    .col(Memberships::PrincipalId)
                    .col(Memberships::Active)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Memberships::Table).if_exists().to_owned())
            .await
    }
}
