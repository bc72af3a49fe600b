//! Key providers
//!
//! The installer never looks for keys on its own; whoever builds the pipeline
//! hands it a [`KeyProvider`].

use std::fmt;
use std::path::PathBuf;

use super::x25519;
use crate::error::KeyError;

/// A private key and the public key derived from it, both base64 encoded
#[derive(Clone, PartialEq, Eq)]
pub struct SecretMaterial {
    private_key: String,
    public_key: String,
}

impl SecretMaterial {
    /// Wrap a raw private key, deriving its public half
    pub fn from_private_key(private_key: &[u8; x25519::KEY_LEN]) -> Self {
        Self {
            private_key: x25519::encode_key(private_key),
            public_key: x25519::encode_key(&x25519::public_key(private_key)),
        }
    }

    /// Parse a base64 private key
    pub fn from_base64(private_key: &str) -> Result<Self, KeyError> {
        let key = x25519::decode_key(private_key)?;
        Ok(Self::from_private_key(&key))
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

impl fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretMaterial")
            .field("private_key", &"[redacted]")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Source of the interface key pair
pub trait KeyProvider {
    fn generate(&self) -> Result<SecretMaterial, KeyError>;
}

/// Generates a fresh key pair on every call
#[derive(Debug, Default, Clone, Copy)]
pub struct X25519KeyProvider;

impl KeyProvider for X25519KeyProvider {
    fn generate(&self) -> Result<SecretMaterial, KeyError> {
        let (private_key, _) = x25519::generate_keypair();
        let material = SecretMaterial::from_private_key(&private_key);
        tracing::debug!("Generated key pair, public key {}", material.public_key());
        Ok(material)
    }
}

/// Reuses a private key the operator already has on disk
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeyProvider for FileKeyProvider {
    fn generate(&self) -> Result<SecretMaterial, KeyError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| KeyError::Read {
            path: self.path.clone(),
            source,
        })?;
        let material = SecretMaterial::from_base64(&contents)?;
        tracing::info!("Using private key from {:?}", self.path);
        Ok(material)
    }
}
