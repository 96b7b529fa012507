pub mod accumulation;
pub mod distribution;

pub use accumulation::evaluate;
pub use distribution::evaluate_distribution;
