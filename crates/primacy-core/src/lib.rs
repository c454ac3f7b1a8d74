//! primacy-core — shared types and configuration for primacy.
//!
//! primacy lets each node of a horizontally-scaled group decide on its
//! own whether it is the group's single "primary" (the oldest running
//! member), without a coordination service. This crate holds the types
//! every other crate agrees on:
//!
//! - [`Instance`], [`Group`], [`ElectionState`] for the election path
//! - [`Credential`] for the credential-scoped client cache
//! - [`PrimacyConfig`] for `primacy.toml`

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    parse_duration, ElectionConfig, IdentityConfig, InventoryConfig, InventoryFile,
    PrimacyConfig, ServicesBackend, ServicesConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
