use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::reservation::types::AllocationPlan;
use crate::stock::model::{
    AvailabilityRow, LineStatus, Product, Reservation, StockCandidate, Warehouse,
};

/// Persistence contract for stock and reservations.
///
/// Every multi-row mutation behind this trait must be one transaction:
/// either it fully commits or it fully rolls back. Transaction isolation in
/// the store is the only oversell guard across concurrent requests.
#[async_trait]
pub trait StockRepository: Send + Sync {
    /// Resolves part numbers to `(product_id, part_number)` pairs.
    /// Unknown part numbers are silently absent from the result.
    async fn products_by_part_numbers(
        &self,
        part_numbers: &[String],
    ) -> Result<Vec<(i64, String)>>;

    /// All stock rows for the given products held by available warehouses
    /// with quantity > 0. Read-only.
    async fn stock_candidates(&self, product_ids: &[i64]) -> Result<Vec<StockCandidate>>;

    /// Atomically executes an allocation plan: re-validates and decrements
    /// every stock line, then persists a reservation header plus one pending
    /// line per plan entry.
    ///
    /// Returns `None` when re-validation finds a line that can no longer be
    /// satisfied (the plan lost a race); nothing is persisted in that case.
    async fn commit_reservation(&self, plan: &AllocationPlan) -> Result<Option<Reservation>>;

    /// Moves the selected pending lines of a reservation to `target`
    /// (confirmed or canceled); cancellation restores the decremented stock
    /// in the same transaction. Lines already terminal are left untouched.
    ///
    /// `part_numbers = None` selects every line of the reservation. Returns
    /// the number of lines actually transitioned.
    async fn transition_lines(
        &self,
        reservation_id: Uuid,
        part_numbers: Option<&[String]>,
        target: LineStatus,
    ) -> Result<u64>;

    async fn products(&self) -> Result<Vec<Product>>;

    async fn warehouses(&self) -> Result<Vec<Warehouse>>;

    async fn availability_by_warehouse(&self, warehouse_id: i64) -> Result<Vec<AvailabilityRow>>;
}
