// Application layer - use cases and ports
pub mod auto_fix;
pub mod catalog;
pub mod dashboard_builder;
pub mod errors;
#[cfg(test)]
pub mod fake_psa;
pub mod psa_repository;
pub mod report_matcher;
pub mod report_service;
pub mod sql_validator;
pub mod vetted_library;
