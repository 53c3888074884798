use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::geo::Coordinate;
use crate::reservation::types::AllocationPlan;
use crate::stock::model::{
    AvailabilityRow, LineStatus, Product, Reservation, ReservationLine, StockCandidate, Warehouse,
};
use crate::stock::repository::StockRepository;

/// SQLx-backed implementation of StockRepository.
/// Responsible only for persistence and row mapping; all allocation policy
/// lives in the planner and service layers.
pub struct SqlxStockRepository {
    pool: AnyPool,
}

impl SqlxStockRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockRepository for SqlxStockRepository {
    async fn products_by_part_numbers(
        &self,
        part_numbers: &[String],
    ) -> anyhow::Result<Vec<(i64, String)>> {
        if part_numbers.is_empty() {
            return Ok(vec![]);
        }

        let sql = format!(
            "SELECT id, part_number FROM products WHERE part_number IN ({})",
            placeholders(part_numbers.len())
        );

        let mut query = sqlx::query(&sql);
        for pn in part_numbers {
            query = query.bind(pn);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("resolve part numbers")?;

        Ok(rows
            .iter()
            .map(|r| (r.get::<i64, _>("id"), r.get::<String, _>("part_number")))
            .collect())
    }

    async fn stock_candidates(&self, product_ids: &[i64]) -> anyhow::Result<Vec<StockCandidate>> {
        if product_ids.is_empty() {
            return Ok(vec![]);
        }

        let sql = format!(
            r#"
SELECT sl.product_id, sl.warehouse_id, sl.quantity, w.latitude, w.longitude
FROM stock_lines sl
JOIN warehouses w ON w.id = sl.warehouse_id AND w.available = 1
WHERE sl.product_id IN ({}) AND sl.quantity > 0
"#,
            placeholders(product_ids.len())
        );

        let mut query = sqlx::query(&sql);
        for id in product_ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("fetch stock candidates")?;

        Ok(rows
            .iter()
            .map(|r| StockCandidate {
                product_id: r.get("product_id"),
                warehouse_id: r.get("warehouse_id"),
                quantity: r.get("quantity"),
                coordinate: Coordinate {
                    latitude: r.get("latitude"),
                    longitude: r.get("longitude"),
                },
            })
            .collect())
    }

    async fn commit_reservation(
        &self,
        plan: &AllocationPlan,
    ) -> anyhow::Result<Option<Reservation>> {
        if plan.is_empty() {
            anyhow::bail!("attempted to commit an empty allocation plan");
        }

        let mut tx = self.pool.begin().await.context("begin reservation tx")?;

        // The plan was computed from a potentially stale read; the conditional
        // decrement is the authoritative re-validation under tx isolation.
        for line in &plan.lines {
            let res = sqlx::query(
                r#"
UPDATE stock_lines SET quantity = quantity - ?
WHERE warehouse_id = ? AND product_id = ? AND quantity >= ?
"#,
            )
            .bind(line.quantity)
            .bind(line.warehouse_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await
            .context("decrement stock line")?;

            if res.rows_affected() == 0 {
                // Lost the race; dropping the tx rolls back earlier decrements.
                return Ok(None);
            }
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO reservations (reservation_id, created_ms) VALUES (?, ?)")
            .bind(reservation.id.to_string())
            .bind(reservation.created_at.timestamp_millis())
            .execute(&mut *tx)
            .await
            .context("insert reservation header")?;

        for line in &plan.lines {
            sqlx::query(
                r#"
INSERT INTO reservation_lines (reservation_id, warehouse_id, product_id, quantity, status)
VALUES (?, ?, ?, ?, ?)
"#,
            )
            .bind(reservation.id.to_string())
            .bind(line.warehouse_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(LineStatus::Pending.code())
            .execute(&mut *tx)
            .await
            .context("insert reservation line")?;
        }

        tx.commit().await.context("commit reservation tx")?;

        Ok(Some(reservation))
    }

    async fn transition_lines(
        &self,
        reservation_id: Uuid,
        part_numbers: Option<&[String]>,
        target: LineStatus,
    ) -> anyhow::Result<u64> {
        if target == LineStatus::Pending {
            anyhow::bail!("transition target must be confirmed or canceled");
        }

        // Part-number narrowing resolves outside the transaction (read-only).
        let product_ids = match part_numbers {
            Some(pns) => {
                let resolved = self.products_by_part_numbers(pns).await?;
                if resolved.is_empty() {
                    return Ok(0);
                }
                Some(resolved.into_iter().map(|(id, _)| id).collect::<Vec<_>>())
            }
            None => None,
        };

        let mut tx = self.pool.begin().await.context("begin lifecycle tx")?;

        let mut sql = String::from(
            "SELECT warehouse_id, product_id, quantity, status FROM reservation_lines \
             WHERE reservation_id = ? AND status = 0",
        );
        if let Some(ids) = &product_ids {
            sql.push_str(&format!(" AND product_id IN ({})", placeholders(ids.len())));
        }

        let mut query = sqlx::query(&sql).bind(reservation_id.to_string());
        if let Some(ids) = &product_ids {
            for id in ids {
                query = query.bind(id);
            }
        }

        let pending = query
            .fetch_all(&mut *tx)
            .await
            .context("select pending reservation lines")?
            .iter()
            .map(|row| {
                Ok(ReservationLine {
                    reservation_id,
                    warehouse_id: row.get("warehouse_id"),
                    product_id: row.get("product_id"),
                    quantity: row.get("quantity"),
                    status: LineStatus::from_code(row.get("status"))?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        if pending.is_empty() {
            // Already-terminal (or absent) lines are a no-op, not an error.
            return Ok(0);
        }

        let mut changed = 0u64;
        for line in &pending {
            let res = sqlx::query(
                r#"
UPDATE reservation_lines SET status = ?
WHERE reservation_id = ? AND warehouse_id = ? AND product_id = ? AND status = 0
"#,
            )
            .bind(target.code())
            .bind(reservation_id.to_string())
            .bind(line.warehouse_id)
            .bind(line.product_id)
            .execute(&mut *tx)
            .await
            .context("update reservation line status")?;

            // Under read-committed isolation a concurrent transition can win
            // the line between our SELECT and this UPDATE; the status guard
            // then matches nothing and this line must not restore stock.
            if res.rows_affected() == 0 {
                continue;
            }
            changed += 1;

            // Cancellation restores stock; confirmation leaves it decremented.
            if target == LineStatus::Canceled {
                sqlx::query(
                    "UPDATE stock_lines SET quantity = quantity + ? \
                     WHERE warehouse_id = ? AND product_id = ?",
                )
                .bind(line.quantity)
                .bind(line.warehouse_id)
                .bind(line.product_id)
                .execute(&mut *tx)
                .await
                .context("restore stock line quantity")?;
            }
        }

        tx.commit().await.context("commit lifecycle tx")?;

        Ok(changed)
    }

    async fn products(&self) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query(
            "SELECT id, part_number, title, width_mm, height_mm, depth_mm FROM products",
        )
        .fetch_all(&self.pool)
        .await
        .context("list products")?;

        Ok(rows
            .iter()
            .map(|r| Product {
                id: r.get("id"),
                part_number: r.get("part_number"),
                title: r.get("title"),
                width_mm: r.get("width_mm"),
                height_mm: r.get("height_mm"),
                depth_mm: r.get("depth_mm"),
            })
            .collect())
    }

    async fn warehouses(&self) -> anyhow::Result<Vec<Warehouse>> {
        let rows =
            sqlx::query("SELECT id, title, latitude, longitude, available FROM warehouses")
                .fetch_all(&self.pool)
                .await
                .context("list warehouses")?;

        Ok(rows
            .iter()
            .map(|r| Warehouse {
                id: r.get("id"),
                title: r.get("title"),
                coordinate: Coordinate {
                    latitude: r.get("latitude"),
                    longitude: r.get("longitude"),
                },
                available: r.get::<i64, _>("available") == 1,
            })
            .collect())
    }

    async fn availability_by_warehouse(
        &self,
        warehouse_id: i64,
    ) -> anyhow::Result<Vec<AvailabilityRow>> {
        let rows = sqlx::query(
            r#"
SELECT p.id, p.part_number, p.title, sl.quantity, w.available
FROM stock_lines sl
JOIN warehouses w ON w.id = sl.warehouse_id
JOIN products p ON p.id = sl.product_id
WHERE sl.warehouse_id = ?
"#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.pool)
        .await
        .context("fetch warehouse availability")?;

        Ok(rows
            .iter()
            .map(|r| AvailabilityRow {
                product_id: r.get("id"),
                part_number: r.get("part_number"),
                title: r.get("title"),
                quantity: r.get("quantity"),
                warehouse_available: r.get::<i64, _>("available") == 1,
            })
            .collect())
    }
}

/// `?, ?, …` fragment for dynamic IN clauses.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
