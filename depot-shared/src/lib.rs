//! # Depot Shared Library
//!
//! Shared types and infrastructure used by the Depot worker and any producer
//! of background tasks.
//!
//! ## Module Organization
//!
//! - `config`: Environment-sourced configuration
//! - `db`: PostgreSQL connection pool and migrations
//! - `models`: Database models (users, items) and task envelope/outcome types
//! - `queue`: Redis-backed task broker and result backend
//! - `startup`: One-shot superuser reconciliation run at process boot

pub mod config;
pub mod db;
pub mod models;
pub mod queue;
pub mod startup;

/// Current version of the Depot shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
