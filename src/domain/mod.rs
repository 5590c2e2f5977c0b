// Market data domain
pub mod market;

// Port interfaces
pub mod ports;

// Aggregation result types
pub mod report;

// Domain-specific error types
pub mod errors;
