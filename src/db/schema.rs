use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Products (immutable reference data; part_number is the business key)
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS products (
  id INTEGER PRIMARY KEY,
  part_number TEXT NOT NULL UNIQUE,
  title TEXT NOT NULL,
  width_mm BIGINT NOT NULL,
  height_mm BIGINT NOT NULL,
  depth_mm BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Warehouses
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS warehouses (
  id INTEGER PRIMARY KEY,
  title TEXT NOT NULL,
  latitude REAL NOT NULL,
  longitude REAL NOT NULL,
  available INTEGER NOT NULL CHECK (available IN (0,1))
);
"#,
    )
    .execute(pool)
    .await?;

    // Stock lines: the single source of truth for availability
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS stock_lines (
  warehouse_id INTEGER NOT NULL,
  product_id INTEGER NOT NULL,
  quantity BIGINT NOT NULL CHECK (quantity >= 0),
  PRIMARY KEY (warehouse_id, product_id)
);
"#,
    )
    .execute(pool)
    .await?;

    // Reservation headers
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS reservations (
  reservation_id TEXT PRIMARY KEY,
  created_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Reservation lines; status: 0 = pending, 1 = confirmed, 2 = canceled
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS reservation_lines (
  reservation_id TEXT NOT NULL,
  warehouse_id INTEGER NOT NULL,
  product_id INTEGER NOT NULL,
  quantity BIGINT NOT NULL CHECK (quantity > 0),
  status INTEGER NOT NULL CHECK (status IN (0,1,2)),
  PRIMARY KEY (reservation_id, warehouse_id, product_id)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_stock_lines_product ON stock_lines(product_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_reservation_lines_status ON reservation_lines(reservation_id, status);"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
