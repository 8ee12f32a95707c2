pub mod collect;
pub mod commons;
pub mod error;
pub mod geo_core;
pub mod imagery;
pub mod progress;
pub mod trend;
