pub mod error;
pub mod file;
pub mod instances;
pub mod metrics;
pub mod mock;
pub mod provider;
pub mod types;
