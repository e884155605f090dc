//! Configuration loading, secret resolution and construction of the
//! ingestion and query services.

pub mod bootstrap;
pub mod config;
pub mod vault;
