use std::collections::HashMap;

use anyhow::Context;
use futures::future::try_join_all;
use tracing::{debug, instrument};

use crate::error::AppResult;
use crate::geo::{Coordinate, haversine_km};
use crate::reservation::types::{AllocationPlan, PlannedLine, RankedCandidate, RequestedProduct};
use crate::stock::model::StockCandidate;

/// Upper bound on parallel distance workers per request.
const MAX_DISTANCE_WORKERS: usize = 8;

/// Distance-annotates every candidate row against the requester position.
///
/// Pure fan-out/fan-in: the computation has no shared mutable state, so the
/// rows are split across spawned workers and joined before returning. No
/// ordering is guaranteed here; the assignment pass sorts.
#[instrument(target = "planner", skip(candidates), fields(candidate_count = candidates.len()))]
pub async fn rank_candidates(
    origin: Coordinate,
    candidates: Vec<StockCandidate>,
) -> AppResult<Vec<RankedCandidate>> {
    if candidates.is_empty() {
        return Ok(vec![]);
    }

    let total = candidates.len();
    let worker_count = total.min(MAX_DISTANCE_WORKERS);
    let chunk_size = total.div_ceil(worker_count);

    let handles: Vec<_> = candidates
        .chunks(chunk_size)
        .map(|chunk| {
            let chunk = chunk.to_vec();
            tokio::spawn(async move {
                chunk
                    .into_iter()
                    .map(|c| RankedCandidate {
                        product_id: c.product_id,
                        warehouse_id: c.warehouse_id,
                        quantity: c.quantity,
                        distance_km: haversine_km(origin, c.coordinate),
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ranked = Vec::with_capacity(total);
    for part in try_join_all(handles)
        .await
        .context("distance worker panicked")?
    {
        ranked.extend(part);
    }

    debug!(ranked = ranked.len(), "candidates ranked");
    Ok(ranked)
}

/// Assigns each requested product to exactly one warehouse.
///
/// Strictly sequential and deterministic: candidates are sorted by
/// (product id, distance ascending, warehouse id ascending), requested
/// products are visited in ascending product-id order, and a per
/// (warehouse, product) remaining-capacity map is decremented as lines are
/// assigned. The map is valid only within this single planning pass; it is
/// never a cross-request concurrency mechanism.
///
/// Products with no candidate of sufficient remaining capacity are omitted
/// from the plan.
#[instrument(
    target = "planner",
    skip(requested, ranked),
    fields(requested_count = requested.len(), candidate_count = ranked.len())
)]
pub fn assign(requested: &[RequestedProduct], mut ranked: Vec<RankedCandidate>) -> AllocationPlan {
    ranked.sort_by(|a, b| {
        a.product_id
            .cmp(&b.product_id)
            .then_with(|| a.distance_km.total_cmp(&b.distance_km))
            .then_with(|| a.warehouse_id.cmp(&b.warehouse_id))
    });

    let mut remaining: HashMap<(i64, i64), i64> = HashMap::new();
    for c in &ranked {
        remaining.insert((c.warehouse_id, c.product_id), c.quantity);
    }

    let mut order: Vec<&RequestedProduct> = requested.iter().collect();
    order.sort_by_key(|p| p.product_id);

    let mut lines = Vec::new();
    for req in order {
        let chosen = ranked
            .iter()
            .filter(|c| c.product_id == req.product_id)
            .find(|c| {
                remaining
                    .get(&(c.warehouse_id, c.product_id))
                    .is_some_and(|&rem| rem >= req.quantity)
            });

        match chosen {
            Some(c) => {
                if let Some(rem) = remaining.get_mut(&(c.warehouse_id, c.product_id)) {
                    *rem -= req.quantity;
                }
                lines.push(PlannedLine {
                    product_id: req.product_id,
                    warehouse_id: c.warehouse_id,
                    quantity: req.quantity,
                });
            }
            None => {
                debug!(
                    product_id = req.product_id,
                    quantity = req.quantity,
                    "no warehouse can satisfy product; omitting from plan"
                );
            }
        }
    }

    debug!(planned = lines.len(), "allocation plan derived");
    AllocationPlan { lines }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requested(product_id: i64, quantity: i64) -> RequestedProduct {
        RequestedProduct {
            product_id,
            part_number: format!("P{product_id}"),
            quantity,
        }
    }

    fn ranked(product_id: i64, warehouse_id: i64, quantity: i64, distance_km: f64) -> RankedCandidate {
        RankedCandidate {
            product_id,
            warehouse_id,
            quantity,
            distance_km,
        }
    }

    fn stock(product_id: i64, warehouse_id: i64, quantity: i64, latitude: f64) -> StockCandidate {
        StockCandidate {
            product_id,
            warehouse_id,
            quantity,
            coordinate: Coordinate {
                latitude,
                longitude: 0.0,
            },
        }
    }

    #[test]
    fn nearest_warehouse_wins() {
        // Scenario: W1 is 200 km away with stock 5, W2 is 50 km away with stock 3.
        let plan = assign(
            &[requested(1, 1)],
            vec![ranked(1, 1, 5, 200.0), ranked(1, 2, 3, 50.0)],
        );

        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].warehouse_id, 2);
    }

    #[test]
    fn equidistant_tie_breaks_on_warehouse_id() {
        let plan = assign(
            &[requested(1, 1)],
            vec![ranked(1, 7, 5, 80.0), ranked(1, 3, 5, 80.0)],
        );

        assert_eq!(plan.lines[0].warehouse_id, 3);
    }

    #[test]
    fn capacity_consumed_within_the_same_pass() {
        // Two entries for the same product (unmerged duplicates): the first
        // drains the near warehouse, the second must fall to the far one.
        let plan = assign(
            &[requested(1, 2), requested(1, 2)],
            vec![ranked(1, 1, 3, 10.0), ranked(1, 2, 4, 90.0)],
        );

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.lines[0].warehouse_id, 1);
        assert_eq!(plan.lines[1].warehouse_id, 2);
    }

    #[test]
    fn unsatisfiable_product_is_omitted() {
        let plan = assign(
            &[requested(1, 10), requested(2, 1)],
            vec![ranked(1, 1, 3, 10.0), ranked(2, 1, 1, 10.0)],
        );

        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].product_id, 2);
    }

    #[test]
    fn no_candidates_yield_empty_plan() {
        let plan = assign(&[requested(1, 1)], vec![]);
        assert!(plan.is_empty());
    }

    #[test]
    fn quantity_larger_than_any_single_warehouse_is_not_split() {
        // 4 requested, 3 + 3 available across two warehouses: a plan line
        // never spans warehouses, so the product is omitted.
        let plan = assign(
            &[requested(1, 4)],
            vec![ranked(1, 1, 3, 10.0), ranked(1, 2, 3, 20.0)],
        );

        assert!(plan.is_empty());
    }

    #[test]
    fn assignment_order_is_product_id_ascending() {
        let plan = assign(
            &[requested(9, 1), requested(2, 1)],
            vec![ranked(9, 1, 1, 10.0), ranked(2, 1, 1, 10.0)],
        );

        let ids: Vec<i64> = plan.lines.iter().map(|l| l.product_id).collect();
        assert_eq!(ids, vec![2, 9]);
    }

    #[tokio::test]
    async fn rank_candidates_annotates_every_row() {
        let origin = Coordinate {
            latitude: 0.0,
            longitude: 0.0,
        };

        let candidates: Vec<StockCandidate> =
            (0..20).map(|i| stock(1, i, 5, i as f64)).collect();

        let ranked = rank_candidates(origin, candidates).await.unwrap();
        assert_eq!(ranked.len(), 20);

        // Farther latitude means strictly larger distance.
        let d0 = ranked.iter().find(|c| c.warehouse_id == 0).unwrap();
        let d19 = ranked.iter().find(|c| c.warehouse_id == 19).unwrap();
        assert_eq!(d0.distance_km, 0.0);
        assert!(d19.distance_km > d0.distance_km);
    }

    #[tokio::test]
    async fn rank_candidates_empty_input() {
        let origin = Coordinate {
            latitude: 0.0,
            longitude: 0.0,
        };
        let ranked = rank_candidates(origin, vec![]).await.unwrap();
        assert!(ranked.is_empty());
    }
}
