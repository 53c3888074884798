pub mod planner;
pub mod resolver;
pub mod service;
pub mod types;
