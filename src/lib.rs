pub mod api;
pub mod config;
pub mod db;
pub mod geo;
pub mod metrics;
pub mod reservation;
pub mod stock;

pub mod error;
pub mod logger;
