//! Limitd - Distributed Rate Limiting Service
//!
//! This crate enforces per-key consumption limits shared across many
//! concurrent, possibly distributed, callers. Fixed-window counters live in
//! Redis (or in process memory for single-node deployments), coordinated
//! through a pluggable storage contract; a token-bucket algorithm is
//! available as a purely local alternative.

pub mod config;
pub mod error;
pub mod grpc;
pub mod ratelimit;
pub mod storage;
