pub mod distribution;
pub mod generator;
pub mod repetitive;
