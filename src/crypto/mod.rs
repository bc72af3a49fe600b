//! Key material for the provisioned interface
//!
//! - X25519 generation, derivation and base64 encoding (x25519)
//! - Key providers handing a [`SecretMaterial`] to the installer (keys)

pub mod keys;
pub mod x25519;

pub use keys::{FileKeyProvider, KeyProvider, SecretMaterial, X25519KeyProvider};
