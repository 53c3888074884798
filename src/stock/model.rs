use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Coordinate;

/// Immutable catalog entry. `part_number` is the unique business key that
/// reservation requests refer to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub part_number: String,
    pub title: String,
    pub width_mm: i64,
    pub height_mm: i64,
    pub depth_mm: i64,
}

/// Warehouses marked unavailable are invisible to allocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: i64,
    pub title: String,
    pub coordinate: Coordinate,
    pub available: bool,
}

/// One eligible stock row for allocation: a requested product held by an
/// available warehouse with positive quantity, plus where that warehouse is.
#[derive(Clone, Debug, PartialEq)]
pub struct StockCandidate {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
    pub coordinate: Coordinate,
}

/// Lifecycle state of a reservation line.
///
/// A line leaves `Pending` exactly once; terminal lines are excluded from
/// further transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStatus {
    Pending,
    Confirmed,
    Canceled,
}

impl LineStatus {
    /// Persisted status code: 0 = pending, 1 = confirmed, 2 = canceled.
    pub fn code(self) -> i64 {
        match self {
            LineStatus::Pending => 0,
            LineStatus::Confirmed => 1,
            LineStatus::Canceled => 2,
        }
    }

    pub fn from_code(code: i64) -> anyhow::Result<Self> {
        match code {
            0 => Ok(LineStatus::Pending),
            1 => Ok(LineStatus::Confirmed),
            2 => Ok(LineStatus::Canceled),
            other => Err(anyhow::anyhow!("unknown line status code: {other}")),
        }
    }
}

/// Reservation header, created once per successful commit.
#[derive(Clone, Debug, Serialize)]
pub struct Reservation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry for one allocated product; only ever created or mutated in
/// the same transaction as the stock line it references.
#[derive(Clone, Debug, Serialize)]
pub struct ReservationLine {
    pub reservation_id: Uuid,
    pub warehouse_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub status: LineStatus,
}

/// Row for the per-warehouse availability listing.
#[derive(Clone, Debug, Serialize)]
pub struct AvailabilityRow {
    pub product_id: i64,
    pub part_number: String,
    pub title: String,
    pub quantity: i64,
    pub warehouse_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for status in [
            LineStatus::Pending,
            LineStatus::Confirmed,
            LineStatus::Canceled,
        ] {
            assert_eq!(LineStatus::from_code(status.code()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_code_is_rejected() {
        assert!(LineStatus::from_code(3).is_err());
        assert!(LineStatus::from_code(-1).is_err());
    }
}
