//! Pure, deterministic pipeline logic.

pub mod plan;
pub mod poll;
