//! Kode News - news board and community forum
//!
//! This library provides the storage layer, services and HTTP API for the
//! Kode News server.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod store;
