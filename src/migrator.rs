use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240301_000001_create_opportunities_table::Migration)]
    }
}

mod m20240301_000001_create_opportunities_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_opportunities_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Opportunities::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Opportunities::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Opportunities::OwnerId).uuid().null())
                        .col(ColumnDef::new(Opportunities::Title).string().not_null())
                        .col(
                            ColumnDef::new(Opportunities::Amount)
                                .decimal_len(15, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Opportunities::Probability)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Opportunities::Stage)
                                .string_len(32)
                                .not_null()
                                .default("new"),
                        )
                        .col(ColumnDef::new(Opportunities::ExpectedCloseDate).date().null())
                        .col(ColumnDef::new(Opportunities::ActualCloseDate).date().null())
                        .col(
                            ColumnDef::new(Opportunities::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Opportunities::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_opportunities_stage")
                        .table(Opportunities::Table)
                        .col(Opportunities::Stage)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_opportunities_expected_close_date")
                        .table(Opportunities::Table)
                        .col(Opportunities::ExpectedCloseDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_opportunities_owner_id")
                        .table(Opportunities::Table)
                        .col(Opportunities::OwnerId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Opportunities::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Opportunities {
        Table,
        Id,
        OwnerId,
        Title,
        Amount,
        Probability,
        Stage,
        ExpectedCloseDate,
        ActualCloseDate,
        CreatedAt,
        UpdatedAt,
    }
}
