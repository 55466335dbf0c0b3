pub mod genetic;
pub mod targets;
