pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigError, PlannerConfig};
pub use error::PlanningError;
pub use types::{new_id, parse_count, parse_positive, round2};
