pub mod calibrator;
pub mod error;
pub mod factory;
pub mod file;
pub mod filter;
pub mod interface;
pub mod random;
