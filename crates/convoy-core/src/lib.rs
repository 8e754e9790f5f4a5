pub mod artifact;
pub mod build;
pub mod config;
pub mod error;
pub mod ingress;
pub mod io;
pub mod manifest;
pub mod paths;
pub mod platform;
pub mod reconcile;
pub mod record;
pub mod registry;
pub mod repo;
pub mod trigger;
pub mod types;

pub use error::{ConvoyError, Result};
