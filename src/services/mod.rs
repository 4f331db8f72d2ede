// src/services/mod.rs
pub mod adapters;
pub mod aggregator;
pub mod backend;
pub mod cache;
pub mod resilience;
pub mod resolver;
