//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod deadline;
pub mod error;
pub mod keys;
pub mod locator;
pub mod platform;
pub mod proxy;

pub use config::{TetherConfig, validate_config_key, validate_config_value};
pub use deadline::Deadline;
pub use error::{ConfigError, DispatchError};
pub use keys::KeyPair;
pub use locator::{
    ElevationCredentials, ElevationKind, InvalidLocatorPolicy, Locality, Locator, RemoteTarget,
};
pub use platform::Architecture;
pub use proxy::{OutputFormat, RemoteInstanceVars};
