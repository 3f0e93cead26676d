// Domain layer - Entities and value types, no I/O
pub mod health;
pub mod query;
pub mod telemetry;
