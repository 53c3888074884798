use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// One requested item: business part number plus quantity.
#[derive(Clone, Debug, Deserialize)]
pub struct RequestedItem {
    pub part_number: String,
    pub quantity: i64,
}

/// Inbound reservation request: what to reserve and where the requester is.
#[derive(Clone, Debug, Deserialize)]
pub struct ReservationRequest {
    pub items: Vec<RequestedItem>,
    pub latitude: f64,
    pub longitude: f64,
}

impl ReservationRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.items.is_empty() {
            return Err(AppError::Validation("items must not be empty".into()));
        }
        for item in &self.items {
            if item.part_number.trim().is_empty() {
                return Err(AppError::Validation("part_number must not be empty".into()));
            }
            if item.quantity < 1 {
                return Err(AppError::Validation(format!(
                    "quantity for {} must be at least 1",
                    item.part_number
                )));
            }
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AppError::Validation("latitude out of range".into()));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AppError::Validation("longitude out of range".into()));
        }
        Ok(())
    }
}

/// Confirm/cancel request. `part_numbers = None` means "every pending line
/// of this reservation".
#[derive(Clone, Debug, Deserialize)]
pub struct LifecycleRequest {
    pub reservation_id: Uuid,
    pub part_numbers: Option<Vec<String>>,
}

impl LifecycleRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(pns) = &self.part_numbers {
            if pns.is_empty() {
                return Err(AppError::Validation(
                    "part_numbers must not be empty when present".into(),
                ));
            }
        }
        Ok(())
    }
}

/// A requested product after part-number resolution. Duplicate part numbers
/// in the request are merged before this point.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestedProduct {
    pub product_id: i64,
    pub part_number: String,
    pub quantity: i64,
}

/// Distance-annotated candidate row produced by the parallel ranking stage.
/// One explicit type instead of an ad-hoc (warehouse, distance) payload.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedCandidate {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
    pub distance_km: f64,
}

/// One plan entry: a product assigned to exactly one warehouse.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedLine {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
}

/// Per-request mapping from requested product to the single warehouse chosen
/// to fulfill it. Products that could not be satisfied are simply absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllocationPlan {
    pub lines: Vec<PlannedLine>,
}

impl AllocationPlan {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
