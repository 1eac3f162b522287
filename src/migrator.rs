use sea_orm_migration::prelude::*;

/// Embedded migrator for the tables this crate owns. Host ERP tables
/// (products, units, locations, warehouses, moves) are managed by the host
/// and never touched here.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m20240901_000001_create_stock_availability_log::Migration,
        )]
    }
}

mod m20240901_000001_create_stock_availability_log {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000001_create_stock_availability_log"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockAvailabilityLog::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAvailabilityLog::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockAvailabilityLog::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAvailabilityLog::UpdateTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAvailabilityLog::Dirty)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(StockAvailabilityLog::CachedQtyAvailable)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockAvailabilityLog::CachedVirtualAvailable)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockAvailabilityLog::CachedIncomingQty)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockAvailabilityLog::CachedOutgoingQty)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            // Serves the latest-entry lookup: newest row per product first
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_availability_log_product_latest")
                        .table(StockAvailabilityLog::Table)
                        .col(StockAvailabilityLog::ProductId)
                        .col((StockAvailabilityLog::UpdateTime, IndexOrder::Desc))
                        .col((StockAvailabilityLog::Dirty, IndexOrder::Desc))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_availability_log_dirty")
                        .table(StockAvailabilityLog::Table)
                        .col(StockAvailabilityLog::Dirty)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockAvailabilityLog::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockAvailabilityLog {
        Table,
        Id,
        ProductId,
        UpdateTime,
        Dirty,
        CachedQtyAvailable,
        CachedVirtualAvailable,
        CachedIncomingQty,
        CachedOutgoingQty,
    }
}
