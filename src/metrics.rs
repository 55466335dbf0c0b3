pub mod collector;
pub mod printer;
