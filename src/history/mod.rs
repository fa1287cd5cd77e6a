pub mod aggregator;
pub mod error;
pub mod fetch;
pub mod power;
pub mod table;
