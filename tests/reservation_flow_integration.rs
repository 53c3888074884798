use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use std::sync::Arc;
use tokio::task::JoinSet;
use uuid::Uuid;

use stockpile::db::schema;
use stockpile::error::AppError;
use stockpile::metrics::counters::Counters;
use stockpile::reservation::service::ReservationService;
use stockpile::reservation::types::{LifecycleRequest, RequestedItem, ReservationRequest};
use stockpile::stock::repository_sqlx::SqlxStockRepository;

async fn setup_db() -> AnyPool {
    sqlx::any::install_default_drivers();

    let db_name = Uuid::new_v4().to_string();
    let conn_str = format!("sqlite:file:{}?mode=memory&cache=shared", db_name);

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&conn_str)
        .await
        .unwrap();

    schema::migrate(&pool).await.unwrap();

    pool
}

fn service(pool: AnyPool) -> Arc<ReservationService> {
    let repo = Arc::new(SqlxStockRepository::new(pool));
    Arc::new(ReservationService::new(repo, 5_000, Counters::default()))
}

fn request(items: Vec<(&str, i64)>, latitude: f64, longitude: f64) -> ReservationRequest {
    ReservationRequest {
        items: items
            .into_iter()
            .map(|(pn, quantity)| RequestedItem {
                part_number: pn.to_string(),
                quantity,
            })
            .collect(),
        latitude,
        longitude,
    }
}

async fn stock_quantity(pool: &AnyPool, warehouse_id: i64, product_id: i64) -> i64 {
    sqlx::query("SELECT quantity FROM stock_lines WHERE warehouse_id = ? AND product_id = ?")
        .bind(warehouse_id)
        .bind(product_id)
        .fetch_one(pool)
        .await
        .unwrap()
        .get("quantity")
}

/// Two warehouses around Moscow: the requester sits in the city center,
/// warehouse 2 is ~50 km out, warehouse 1 is ~200 km out.
async fn seed_moscow_fixture(pool: &AnyPool) {
    sqlx::query("INSERT INTO products VALUES (1, 'SKU-100', 'widget', 100, 100, 100)")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO warehouses VALUES (1, 'far depot', 57.55, 37.62, 1)")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO warehouses VALUES (2, 'near depot', 56.20, 37.62, 1)")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO stock_lines VALUES (1, 1, 10)")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO stock_lines VALUES (2, 1, 10)")
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn reserve_picks_the_nearest_warehouse_end_to_end() {
    let pool = setup_db().await;
    seed_moscow_fixture(&pool).await;
    let svc = service(pool.clone());

    let reservation = svc
        .reserve(request(vec![("SKU-100", 3)], 55.75, 37.62))
        .await
        .unwrap();

    // The near warehouse loses stock, the far one is untouched.
    assert_eq!(stock_quantity(&pool, 2, 1).await, 7);
    assert_eq!(stock_quantity(&pool, 1, 1).await, 10);

    let line: i64 = sqlx::query(
        "SELECT warehouse_id FROM reservation_lines WHERE reservation_id = ?",
    )
    .bind(reservation.id.to_string())
    .fetch_one(&pool)
    .await
    .unwrap()
    .get("warehouse_id");
    assert_eq!(line, 2);
}

#[tokio::test]
async fn reserve_falls_to_the_farther_warehouse_when_the_near_one_is_short() {
    let pool = setup_db().await;
    seed_moscow_fixture(&pool).await;
    sqlx::query("UPDATE stock_lines SET quantity = 2 WHERE warehouse_id = 2")
        .execute(&pool)
        .await
        .unwrap();
    let svc = service(pool.clone());

    svc.reserve(request(vec![("SKU-100", 5)], 55.75, 37.62))
        .await
        .unwrap();

    assert_eq!(stock_quantity(&pool, 1, 1).await, 5);
    assert_eq!(stock_quantity(&pool, 2, 1).await, 2);
}

#[tokio::test]
async fn reserve_beyond_total_stock_persists_nothing() {
    let pool = setup_db().await;
    seed_moscow_fixture(&pool).await;
    let svc = service(pool.clone());

    let err = svc
        .reserve(request(vec![("SKU-100", 11)], 55.75, 37.62))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock(_)));
    assert_eq!(stock_quantity(&pool, 1, 1).await, 10);
    assert_eq!(stock_quantity(&pool, 2, 1).await, 10);

    let headers: i64 = sqlx::query("SELECT COUNT(*) AS c FROM reservations")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("c");
    assert_eq!(headers, 0);
}

#[tokio::test]
async fn unknown_part_number_is_not_found() {
    let pool = setup_db().await;
    seed_moscow_fixture(&pool).await;
    let svc = service(pool);

    let err = svc
        .reserve(request(vec![("NO-SUCH-SKU", 1)], 55.75, 37.62))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn racing_reserves_for_the_last_unit_admit_exactly_one() {
    let pool = setup_db().await;
    sqlx::query("INSERT INTO products VALUES (1, 'SKU-100', 'widget', 100, 100, 100)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO warehouses VALUES (1, 'depot', 55.75, 37.62, 1)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO stock_lines VALUES (1, 1, 1)")
        .execute(&pool)
        .await
        .unwrap();

    let svc = service(pool.clone());

    let mut set = JoinSet::new();
    for _ in 0..4 {
        let svc = svc.clone();
        set.spawn(async move {
            svc.reserve(request(vec![("SKU-100", 1)], 55.75, 37.62))
                .await
        });
    }

    let mut successes = 0;
    while let Some(res) = set.join_next().await {
        match res.unwrap() {
            Ok(_) => successes += 1,
            // Losers either planned against drained stock or lost the
            // commit-time re-validation.
            Err(AppError::InsufficientStock(_)) | Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(stock_quantity(&pool, 1, 1).await, 0);
}

#[tokio::test]
async fn full_lifecycle_confirm_then_cancel() {
    let pool = setup_db().await;
    seed_moscow_fixture(&pool).await;
    let svc = service(pool.clone());

    let reservation = svc
        .reserve(request(vec![("SKU-100", 4)], 55.75, 37.62))
        .await
        .unwrap();
    assert_eq!(stock_quantity(&pool, 2, 1).await, 6);

    let confirmed = svc
        .confirm(LifecycleRequest {
            reservation_id: reservation.id,
            part_numbers: None,
        })
        .await
        .unwrap();
    assert_eq!(confirmed, 1);
    assert_eq!(stock_quantity(&pool, 2, 1).await, 6);

    // A confirmed line is terminal; cancel finds nothing to do.
    let canceled = svc
        .cancel(LifecycleRequest {
            reservation_id: reservation.id,
            part_numbers: None,
        })
        .await
        .unwrap();
    assert_eq!(canceled, 0);
    assert_eq!(stock_quantity(&pool, 2, 1).await, 6);
}

#[tokio::test]
async fn cancel_restores_the_hold() {
    let pool = setup_db().await;
    seed_moscow_fixture(&pool).await;
    let svc = service(pool.clone());

    let reservation = svc
        .reserve(request(vec![("SKU-100", 2)], 55.75, 37.62))
        .await
        .unwrap();
    assert_eq!(stock_quantity(&pool, 2, 1).await, 8);

    let canceled = svc
        .cancel(LifecycleRequest {
            reservation_id: reservation.id,
            part_numbers: None,
        })
        .await
        .unwrap();

    assert_eq!(canceled, 1);
    assert_eq!(stock_quantity(&pool, 2, 1).await, 10);
}

#[tokio::test]
async fn listings_reflect_seeded_state() {
    let pool = setup_db().await;
    seed_moscow_fixture(&pool).await;
    let svc = service(pool);

    let products = svc.products().await.unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].part_number, "SKU-100");

    let warehouses = svc.warehouses().await.unwrap();
    assert_eq!(warehouses.len(), 2);
    assert!(warehouses.iter().all(|w| w.available));

    let rows = svc.availability(2).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, 10);
}
