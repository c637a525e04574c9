pub mod order;
pub mod plan;
