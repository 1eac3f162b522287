mod common;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::TestDb;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use stocksync::entities::availability_log;
use stocksync::entities::stock_move::MoveState;
use stocksync::errors::StockSyncError;
use stocksync::services::ProductAvailability;

async fn insert_log_row(
    app: &TestDb,
    product_id: i32,
    update_time: DateTime<Utc>,
    dirty: bool,
    qty: Decimal,
) {
    availability_log::ActiveModel {
        product_id: Set(product_id),
        update_time: Set(update_time),
        dirty: Set(dirty),
        cached_qty_available: Set(qty),
        cached_virtual_available: Set(qty),
        cached_incoming_qty: Set(Decimal::ZERO),
        cached_outgoing_qty: Set(Decimal::ZERO),
        ..Default::default()
    }
    .insert(app.db.as_ref())
    .await
    .expect("insert log row");
}

async fn log_row_count(app: &TestDb) -> usize {
    availability_log::Entity::find()
        .all(app.db.as_ref())
        .await
        .expect("count log rows")
        .len()
}

fn figures(qty: Decimal) -> ProductAvailability {
    ProductAvailability {
        qty_available: qty,
        virtual_available: qty,
        ..Default::default()
    }
}

#[tokio::test]
async fn marking_collapses_duplicates() {
    let app = TestDb::new().await;
    let conn = app.db.as_ref();
    let dirty_log = &app.services.dirty_log;

    let flagged = dirty_log.mark_dirty(conn, &[7, 7, 7]).await.unwrap();
    assert_eq!(flagged, 1);
    assert_eq!(dirty_log.list_dirty(conn, None).await.unwrap(), vec![7]);
    assert_eq!(log_row_count(&app).await, 1);
}

#[tokio::test]
async fn marking_nothing_writes_nothing() {
    let app = TestDb::new().await;
    let conn = app.db.as_ref();

    let flagged = app.services.dirty_log.mark_dirty(conn, &[]).await.unwrap();
    assert_eq!(flagged, 0);
    assert_eq!(log_row_count(&app).await, 0);
}

#[tokio::test]
async fn publishing_supersedes_earlier_marks() {
    let app = TestDb::new().await;
    let conn = app.db.as_ref();
    let dirty_log = &app.services.dirty_log;

    dirty_log.mark_dirty(conn, &[7]).await.unwrap();
    dirty_log
        .publish_clean(conn, &HashMap::from([(7, figures(dec!(4)))]), Utc::now())
        .await
        .unwrap();

    assert!(dirty_log.list_dirty(conn, None).await.unwrap().is_empty());
    let cached = dirty_log.cached_availability(conn, &[7]).await.unwrap();
    assert!(!cached[&7].dirty);
    assert_eq!(cached[&7].qty_available, dec!(4));
}

#[tokio::test]
async fn equal_timestamps_resolve_to_dirty() {
    let app = TestDb::new().await;
    let conn = app.db.as_ref();
    let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

    // Clean first, then dirty at the same instant.
    insert_log_row(&app, 7, at, false, dec!(4)).await;
    insert_log_row(&app, 7, at, true, Decimal::ZERO).await;

    // Dirty first, then clean at the same instant.
    insert_log_row(&app, 8, at, true, Decimal::ZERO).await;
    insert_log_row(&app, 8, at, false, dec!(4)).await;

    let dirty = app.services.dirty_log.list_dirty(conn, None).await.unwrap();
    assert_eq!(dirty, vec![7, 8]);
}

#[tokio::test]
async fn equal_timestamp_and_flag_resolve_to_the_later_row() {
    let app = TestDb::new().await;
    let conn = app.db.as_ref();
    let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

    insert_log_row(&app, 7, at, false, dec!(1)).await;
    insert_log_row(&app, 7, at, false, dec!(2)).await;

    let cached = app
        .services
        .dirty_log
        .cached_availability(conn, &[7])
        .await
        .unwrap();
    assert_eq!(cached[&7].qty_available, dec!(2));
}

#[tokio::test]
async fn marks_stamped_after_a_recompute_started_survive_the_publish() {
    let app = TestDb::new().await;
    let conn = app.db.as_ref();
    let dirty_log = &app.services.dirty_log;

    // The recompute read its inputs at `started_at`; the mark arrived
    // while it was running.
    let started_at = Utc::now();
    dirty_log.mark_dirty(conn, &[7]).await.unwrap();
    dirty_log
        .publish_clean(conn, &HashMap::from([(7, figures(dec!(4)))]), started_at)
        .await
        .unwrap();

    assert_eq!(dirty_log.list_dirty(conn, None).await.unwrap(), vec![7]);
}

#[tokio::test]
async fn listing_can_be_filtered() {
    let app = TestDb::new().await;
    let conn = app.db.as_ref();
    let dirty_log = &app.services.dirty_log;

    dirty_log.mark_dirty(conn, &[1, 2, 3]).await.unwrap();

    assert_eq!(
        dirty_log.list_dirty(conn, Some(&[2, 3, 99])).await.unwrap(),
        vec![2, 3]
    );
    assert!(dirty_log.list_dirty(conn, Some(&[])).await.unwrap().is_empty());
}

#[tokio::test]
async fn sync_recomputes_marked_products_and_clears_them() {
    let app = TestDb::new().await;
    app.seed_reference_world().await;
    app.seed_product(100, 1).await;
    app.seed_move(1, 100, 1, dec!(10), 4, 3, MoveState::Done).await;
    app.seed_move(2, 100, 1, dec!(3), 3, 5, MoveState::Confirmed).await;
    let conn = app.db.as_ref();

    app.services.dirty_log.mark_dirty(conn, &[100]).await.unwrap();

    let report = app.services.sync.sync(None).await.unwrap();
    assert_eq!(report.products_synced, 1);
    assert_eq!(report.batches, 1);
    assert!(app
        .services
        .dirty_log
        .list_dirty(conn, None)
        .await
        .unwrap()
        .is_empty());

    let cached = app
        .services
        .dirty_log
        .cached_availability(conn, &[100])
        .await
        .unwrap();
    let entry = &cached[&100];
    assert!(!entry.dirty);
    assert_eq!(entry.qty_available, dec!(10));
    assert_eq!(entry.virtual_available, dec!(7));
    assert_eq!(entry.incoming_qty, dec!(0));
    assert_eq!(entry.outgoing_qty, dec!(3));

    // The cache agrees with a fresh computation.
    let fresh = app
        .services
        .availability
        .compute_one(conn, 100)
        .await
        .unwrap();
    assert_eq!(entry.qty_available, fresh.qty_available);
    assert_eq!(entry.virtual_available, fresh.virtual_available);

    // A second run has nothing to do and rewrites nothing.
    let rows_before = log_row_count(&app).await;
    let report = app.services.sync.sync(None).await.unwrap();
    assert_eq!(report.products_synced, 0);
    assert_eq!(report.batches, 0);
    assert_eq!(log_row_count(&app).await, rows_before);
}

#[tokio::test]
async fn sync_with_a_filter_leaves_other_products_dirty() {
    let app = TestDb::new().await;
    let conn = app.db.as_ref();

    app.services
        .dirty_log
        .mark_dirty(conn, &[100, 101])
        .await
        .unwrap();

    let report = app.services.sync.sync(Some(&[100])).await.unwrap();
    assert_eq!(report.products_synced, 1);
    assert_eq!(
        app.services.dirty_log.list_dirty(conn, None).await.unwrap(),
        vec![101]
    );
}

#[tokio::test]
async fn sync_processes_in_bounded_batches() {
    let app = TestDb::with_batch_size(2).await;
    let conn = app.db.as_ref();

    app.services
        .dirty_log
        .mark_dirty(conn, &[201, 202, 203, 204, 205])
        .await
        .unwrap();

    let report = app.services.sync.sync(None).await.unwrap();
    assert_eq!(report.products_synced, 5);
    assert_eq!(report.batches, 3);
    assert!(app
        .services
        .dirty_log
        .list_dirty(conn, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn failed_recomputation_keeps_the_product_dirty() {
    let app = TestDb::new().await;
    app.seed_reference_world().await;
    // Product counted in kilograms with a move recorded in "each" cannot
    // be aggregated.
    app.seed_product(102, 3).await;
    app.seed_move(1, 102, 1, dec!(10), 4, 3, MoveState::Done).await;
    let conn = app.db.as_ref();

    app.services.dirty_log.mark_dirty(conn, &[102]).await.unwrap();

    let err = app.services.sync.sync(None).await.unwrap_err();
    assert!(matches!(err, StockSyncError::UomCategoryMismatch { .. }));

    // The mark is still there for the next run to retry.
    assert_eq!(
        app.services.dirty_log.list_dirty(conn, None).await.unwrap(),
        vec![102]
    );
    let cached = app
        .services
        .dirty_log
        .cached_availability(conn, &[102])
        .await
        .unwrap();
    assert!(cached[&102].dirty);
}

#[tokio::test]
async fn vacuum_drops_only_superseded_rows() {
    let app = TestDb::new().await;
    let conn = app.db.as_ref();
    let dirty_log = &app.services.dirty_log;

    // Product 7 ends clean after two mark/publish cycles; product 8 ends
    // on a fresh mark.
    dirty_log.mark_dirty(conn, &[7]).await.unwrap();
    dirty_log
        .publish_clean(conn, &HashMap::from([(7, figures(dec!(1)))]), Utc::now())
        .await
        .unwrap();
    dirty_log.mark_dirty(conn, &[7, 8]).await.unwrap();
    dirty_log
        .publish_clean(conn, &HashMap::from([(7, figures(dec!(2)))]), Utc::now())
        .await
        .unwrap();

    assert_eq!(log_row_count(&app).await, 5);

    let purged = dirty_log.vacuum(conn).await.unwrap();
    assert_eq!(purged, 3);
    assert_eq!(log_row_count(&app).await, 2);

    // The authoritative view is unchanged: 7 clean at its latest figures,
    // 8 still dirty.
    assert_eq!(dirty_log.list_dirty(conn, None).await.unwrap(), vec![8]);
    let cached = dirty_log.cached_availability(conn, &[7, 8]).await.unwrap();
    assert_eq!(cached[&7].qty_available, dec!(2));
    assert!(!cached[&7].dirty);
    assert!(cached[&8].dirty);

    // Vacuuming again finds nothing to do.
    assert_eq!(dirty_log.vacuum(conn).await.unwrap(), 0);
}

#[tokio::test]
async fn install_backfills_only_products_the_log_has_never_seen() {
    let app = TestDb::new().await;
    app.seed_reference_world().await;
    app.seed_product(100, 1).await;
    app.seed_product(101, 1).await;
    let conn = app.db.as_ref();

    let backfilled = app.services.sync.install().await.unwrap();
    assert_eq!(backfilled, 2);
    assert_eq!(
        app.services.dirty_log.list_dirty(conn, None).await.unwrap(),
        vec![100, 101]
    );

    // Running install again is harmless, even after a sync.
    assert_eq!(app.services.sync.install().await.unwrap(), 0);
    app.services.sync.sync(None).await.unwrap();
    assert_eq!(app.services.sync.install().await.unwrap(), 0);

    // A product added later is picked up by the next install.
    app.seed_product(103, 1).await;
    assert_eq!(app.services.sync.install().await.unwrap(), 1);
    assert_eq!(
        app.services.dirty_log.list_dirty(conn, None).await.unwrap(),
        vec![103]
    );
}
