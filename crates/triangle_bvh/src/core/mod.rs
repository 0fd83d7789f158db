//! Core index configuration

pub mod config;

pub use config::IndexConfig;
