//! Ranking, quartile and proficiency-distribution reports over SPAECE
//! assessment results.
//!
//! The two source datasets are loaded once into an [`context::AppContext`];
//! each request filters them, computes its tables and hands back rows or
//! export bytes.
pub mod config;
pub mod context;
pub mod dashboard;
pub mod distribution;
pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod quartile;
pub mod ranking;
pub mod report;
pub mod style;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;
