pub mod config;
pub mod error;
pub mod models;
pub mod partition;
pub mod sieve;
