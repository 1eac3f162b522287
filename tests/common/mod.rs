use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, Schema, Set};
use stocksync::config::AppConfig;
use stocksync::db;
use stocksync::entities::stock_move::MoveState;
use stocksync::entities::{product, product_uom, stock_location, stock_move, stock_warehouse};
use stocksync::services::Services;

/// Harness around a fresh in-memory SQLite database.
///
/// The crate's own table comes from the embedded migrator; the host ERP
/// tables are created from the entity definitions. The pool is pinned to a
/// single connection so every query lands on the same in-memory database.
pub struct TestDb {
    pub db: Arc<DatabaseConnection>,
    pub services: Services,
}

impl TestDb {
    pub async fn new() -> Self {
        Self::with_batch_size(100).await
    }

    pub async fn with_batch_size(batch_size: usize) -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:");
        cfg.sync_batch_size = batch_size;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        create_host_tables(&pool).await;

        let db = Arc::new(pool);
        let services = Services::new(db.clone(), &cfg, None);
        Self { db, services }
    }

    #[allow(dead_code)]
    pub async fn seed_uom(
        &self,
        id: i32,
        category_id: i32,
        factor: Decimal,
        rounding: Decimal,
    ) -> product_uom::Model {
        product_uom::ActiveModel {
            id: Set(id),
            category_id: Set(category_id),
            factor: Set(factor),
            rounding: Set(rounding),
            active: Set(true),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed unit of measure")
    }

    #[allow(dead_code)]
    pub async fn seed_product(&self, id: i32, default_uom_id: i32) -> product::Model {
        product::ActiveModel {
            id: Set(id),
            default_uom_id: Set(default_uom_id),
            active: Set(true),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed product")
    }

    #[allow(dead_code)]
    pub async fn seed_location(
        &self,
        id: i32,
        parent_id: Option<i32>,
        parent_left: i32,
        parent_right: i32,
    ) -> stock_location::Model {
        stock_location::ActiveModel {
            id: Set(id),
            parent_id: Set(parent_id),
            parent_left: Set(parent_left),
            parent_right: Set(parent_right),
            active: Set(true),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed stock location")
    }

    #[allow(dead_code)]
    pub async fn seed_warehouse(&self, id: i32, lot_stock_id: Option<i32>) -> stock_warehouse::Model {
        stock_warehouse::ActiveModel {
            id: Set(id),
            lot_stock_id: Set(lot_stock_id),
            active: Set(true),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed warehouse")
    }

    #[allow(dead_code)]
    pub async fn seed_move(
        &self,
        id: i32,
        product_id: i32,
        product_uom: i32,
        product_qty: Decimal,
        location_id: i32,
        location_dest_id: i32,
        state: MoveState,
    ) -> stock_move::Model {
        stock_move::ActiveModel {
            id: Set(id),
            product_id: Set(product_id),
            product_uom: Set(product_uom),
            product_qty: Set(product_qty),
            location_id: Set(location_id),
            location_dest_id: Set(location_dest_id),
            state: Set(state),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed stock move")
    }

    /// Seeds the shared reference data most tests run against.
    ///
    /// Units: 1 = "each" (category 1, factor 1), 2 = "pair" (category 1,
    /// factor 0.5, so one pair is two each), 3 = "kg" (category 2).
    ///
    /// Locations, nested-set encoded: 1 = physical root [1,10] containing
    /// 2 = stock [2,7] containing 3 = shelf [3,4]; 4 = suppliers [11,12]
    /// and 5 = customers [13,14] sit outside the tree. Warehouse 1 roots
    /// its stock at location 2, so locations 1, 2 and 3 are internal.
    #[allow(dead_code)]
    pub async fn seed_reference_world(&self) {
        self.seed_uom(1, 1, dec(1), Decimal::new(1, 2)).await;
        self.seed_uom(2, 1, Decimal::new(5, 1), Decimal::new(1, 2)).await;
        self.seed_uom(3, 2, dec(1), Decimal::new(1, 3)).await;

        self.seed_location(1, None, 1, 10).await;
        self.seed_location(2, Some(1), 2, 7).await;
        self.seed_location(3, Some(2), 3, 4).await;
        self.seed_location(4, None, 11, 12).await;
        self.seed_location(5, None, 13, 14).await;

        self.seed_warehouse(1, Some(2)).await;
    }
}

async fn create_host_tables(db: &DatabaseConnection) {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let statements = [
        schema.create_table_from_entity(product_uom::Entity),
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(stock_location::Entity),
        schema.create_table_from_entity(stock_warehouse::Entity),
        schema.create_table_from_entity(stock_move::Entity),
    ];
    for statement in statements {
        db.execute(backend.build(&statement))
            .await
            .expect("create host table for tests");
    }
}

/// Shorthand for whole-number decimals.
#[allow(dead_code)]
pub fn dec(value: i64) -> Decimal {
    Decimal::new(value, 0)
}
