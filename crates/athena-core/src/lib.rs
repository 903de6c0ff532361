//! Configuration and the retrieval-augmented prompt client.

pub mod client;
pub mod config;
pub mod error;
pub mod secret;

pub use client::{Client, ClientConfig};
pub use config::Config;
pub use error::ClientError;
pub use secret::Secret;
