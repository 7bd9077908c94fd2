//! Class Action Finder Library
//!
//! Finds class action settlements that pay out without proof of purchase,
//! and reports each one once.

pub mod config;
pub mod eligibility;
pub mod error;
pub mod finder;
pub mod identity;
pub mod notify;
pub mod scrapers;
pub mod storage;
pub mod types;

pub use error::{FinderError, Result};
pub use types::*;
