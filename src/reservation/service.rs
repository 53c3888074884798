use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::{Span, field, info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::geo::Coordinate;
use crate::logger::warn_if_slow;
use crate::metrics::counters::Counters;
use crate::reservation::types::{LifecycleRequest, ReservationRequest};
use crate::reservation::{planner, resolver};
use crate::stock::model::{AvailabilityRow, LineStatus, Product, Reservation, Warehouse};
use crate::stock::repository::StockRepository;

/// Orchestrates the reservation pipeline (resolve → rank → assign → commit)
/// and the confirm/cancel lifecycle.
///
/// Holds no cross-request state beyond the repository handle; oversell
/// protection is entirely the store's transaction isolation. Every public
/// operation is bounded by the configured deadline, and nothing here
/// retries — retry-on-Conflict is the caller's decision.
pub struct ReservationService {
    repo: Arc<dyn StockRepository>,
    deadline: Duration,
    counters: Counters,
}

impl ReservationService {
    pub fn new(repo: Arc<dyn StockRepository>, deadline_ms: u64, counters: Counters) -> Self {
        Self {
            repo,
            deadline: Duration::from_millis(deadline_ms.max(1)),
            counters,
        }
    }

    /// Reserves stock for the request and returns the new reservation.
    #[instrument(
        skip(self, req),
        target = "reservation",
        fields(item_count = req.items.len(), reservation_id = field::Empty)
    )]
    pub async fn reserve(&self, req: ReservationRequest) -> AppResult<Reservation> {
        req.validate()?;

        let result = self.with_deadline(self.reserve_inner(req)).await;

        match &result {
            Ok(_) => {
                self.counters.reserve_ok.fetch_add(1, Ordering::Relaxed);
            }
            Err(AppError::NotFound(_)) => {
                self.counters.reserve_not_found.fetch_add(1, Ordering::Relaxed);
            }
            Err(AppError::InsufficientStock(_)) => {
                self.counters
                    .reserve_insufficient
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(AppError::Conflict(_)) => {
                self.counters.reserve_conflict.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {}
        }

        result
    }

    async fn reserve_inner(&self, req: ReservationRequest) -> AppResult<Reservation> {
        let origin = Coordinate {
            latitude: req.latitude,
            longitude: req.longitude,
        };

        let resolved = resolver::resolve(self.repo.as_ref(), &req.items).await?;
        let ranked = planner::rank_candidates(origin, resolved.candidates).await?;
        let plan = planner::assign(&resolved.products, ranked);

        if plan.is_empty() {
            return Err(AppError::InsufficientStock(
                "no warehouse has enough stock for any requested product".into(),
            ));
        }

        let committed = warn_if_slow("commit_reservation", Duration::from_millis(100), async {
            self.repo.commit_reservation(&plan).await
        })
        .await?;

        match committed {
            Some(reservation) => {
                Span::current().record("reservation_id", field::display(&reservation.id));
                info!(lines = plan.lines.len(), "reservation committed");
                Ok(reservation)
            }
            None => {
                warn!("stock changed between planning and commit; reservation aborted");
                Err(AppError::Conflict(
                    "stock was consumed by a concurrent reservation; retry the request".into(),
                ))
            }
        }
    }

    /// Confirms the selected pending lines; stock stays decremented.
    #[instrument(
        skip(self, req),
        target = "reservation",
        fields(reservation_id = %req.reservation_id)
    )]
    pub async fn confirm(&self, req: LifecycleRequest) -> AppResult<u64> {
        req.validate()?;
        let changed = self
            .with_deadline(self.transition(req, LineStatus::Confirmed))
            .await?;
        self.counters
            .lines_confirmed
            .fetch_add(changed, Ordering::Relaxed);
        Ok(changed)
    }

    /// Cancels the selected pending lines and restores their stock.
    #[instrument(
        skip(self, req),
        target = "reservation",
        fields(reservation_id = %req.reservation_id)
    )]
    pub async fn cancel(&self, req: LifecycleRequest) -> AppResult<u64> {
        req.validate()?;
        let changed = self
            .with_deadline(self.transition(req, LineStatus::Canceled))
            .await?;
        self.counters
            .lines_canceled
            .fetch_add(changed, Ordering::Relaxed);
        Ok(changed)
    }

    async fn transition(&self, req: LifecycleRequest, target: LineStatus) -> AppResult<u64> {
        let changed = warn_if_slow("transition_lines", Duration::from_millis(100), async {
            self.repo
                .transition_lines(req.reservation_id, req.part_numbers.as_deref(), target)
                .await
        })
        .await?;

        if changed == 0 {
            info!(?target, "no pending lines matched the selector");
        } else {
            info!(?target, changed, "reservation lines transitioned");
        }

        Ok(changed)
    }

    pub async fn products(&self) -> AppResult<Vec<Product>> {
        self.with_deadline(async { Ok(self.repo.products().await?) })
            .await
    }

    pub async fn warehouses(&self) -> AppResult<Vec<Warehouse>> {
        self.with_deadline(async { Ok(self.repo.warehouses().await?) })
            .await
    }

    pub async fn availability(&self, warehouse_id: i64) -> AppResult<Vec<AvailabilityRow>> {
        self.with_deadline(async {
            Ok(self.repo.availability_by_warehouse(warehouse_id).await?)
        })
        .await
    }

    /// Bounds an operation by the configured deadline. Dropping the inner
    /// future aborts any open transaction (rolled back by the pool).
    async fn with_deadline<T, F>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                self.counters.op_timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    deadline_ms = self.deadline.as_millis() as u64,
                    "operation exceeded deadline"
                );
                Err(AppError::Timeout(self.deadline.as_millis() as u64))
            }
        }
    }
}
