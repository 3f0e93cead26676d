// Application layer - Use cases and the storage contract
pub mod health_service;
pub mod ingestion_service;
pub mod query_service;
pub mod rate_limiter;
pub mod telemetry_repository;
pub mod validator;
