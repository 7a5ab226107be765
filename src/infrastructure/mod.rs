//! Infrastructure layer - Deterministic hashing and numeric machinery

pub mod hashing;
pub mod statistics;
