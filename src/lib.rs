//! Brevet control listing API with token authentication.
//!
//! - [`auth`]: user registration, password hashing, signed time-limited tokens
//! - [`brevet`]: read-only JSON/CSV listings of brevet control open/close times
//! - [`gateway`]: the axum HTTP surface over both
//! - [`config`]: TOML + environment configuration

pub mod auth;
pub mod brevet;
pub mod config;
pub mod gateway;

pub use config::Config;
