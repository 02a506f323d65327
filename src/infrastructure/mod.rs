// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod psa_http_repository;
pub mod tool_response;
