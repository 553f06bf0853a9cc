//! CLI command implementations.

pub mod add;
pub mod check;
pub mod clear;
pub mod list;
pub mod remove;
pub mod stats;
