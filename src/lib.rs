//! xcore wallet - a terminal wallet client for x42 cold staking.
//!
//! This library provides:
//! - Debounced fee estimation for the delegation form
//! - The ordered cold staking delegation pipeline
//! - A REST client for the wallet node
//! - Local storage for user preferences

pub mod config;
pub mod domain;
pub mod infra;
