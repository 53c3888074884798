use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::reservation::types::{RequestedItem, RequestedProduct};
use crate::stock::model::StockCandidate;
use crate::stock::repository::StockRepository;

/// Output of candidate resolution: the requested products (resolved and
/// merged) and every eligible stock row that could serve them.
#[derive(Clone, Debug)]
pub struct ResolvedRequest {
    pub products: Vec<RequestedProduct>,
    pub candidates: Vec<StockCandidate>,
}

/// Resolves requested part numbers to products and enumerates candidate
/// stock rows. Read-only; duplicate part numbers are merged by summing
/// their quantities.
pub async fn resolve(
    repo: &dyn StockRepository,
    items: &[RequestedItem],
) -> AppResult<ResolvedRequest> {
    let mut wanted: BTreeMap<String, i64> = BTreeMap::new();
    for item in items {
        *wanted.entry(item.part_number.clone()).or_insert(0) += item.quantity;
    }

    let part_numbers: Vec<String> = wanted.keys().cloned().collect();
    let resolved = repo.products_by_part_numbers(&part_numbers).await?;

    if resolved.is_empty() {
        return Err(AppError::NotFound("no matching products".into()));
    }

    if resolved.len() < part_numbers.len() {
        debug!(
            requested = part_numbers.len(),
            resolved = resolved.len(),
            "some part numbers did not resolve"
        );
    }

    let mut products: Vec<RequestedProduct> = resolved
        .into_iter()
        .filter_map(|(product_id, part_number)| {
            wanted.get(&part_number).map(|&quantity| RequestedProduct {
                product_id,
                part_number,
                quantity,
            })
        })
        .collect();
    // Ascending product id keeps the later assignment pass deterministic.
    products.sort_by_key(|p| p.product_id);

    let product_ids: Vec<i64> = products.iter().map(|p| p.product_id).collect();
    let candidates = repo.stock_candidates(&product_ids).await?;

    if candidates.is_empty() {
        return Err(AppError::InsufficientStock(
            "no available warehouse stocks the requested products".into(),
        ));
    }

    Ok(ResolvedRequest {
        products,
        candidates,
    })
}
