//! X25519 key material for WireGuard interfaces
//!
//! Provides key generation, public key derivation and the base64 encoding
//! used in `.conf` files.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::KeyError;

/// Key length for X25519 (both private and public keys are 32 bytes)
pub const KEY_LEN: usize = 32;

/// Generate a new X25519 keypair
///
/// Returns (private_key, public_key)
pub fn generate_keypair() -> ([u8; KEY_LEN], [u8; KEY_LEN]) {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);
    (secret.to_bytes(), public.to_bytes())
}

/// Derive public key from private key
pub fn public_key(private_key: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
    let secret = StaticSecret::from(*private_key);
    PublicKey::from(&secret).to_bytes()
}

/// Encode a key the way `wg genkey` prints it
pub fn encode_key(key: &[u8; KEY_LEN]) -> String {
    BASE64.encode(key)
}

/// Decode a base64 key, surrounding whitespace allowed
pub fn decode_key(value: &str) -> Result<[u8; KEY_LEN], KeyError> {
    let bytes = BASE64
        .decode(value.trim())
        .map_err(|_| KeyError::InvalidBase64)?;

    if bytes.len() != KEY_LEN {
        return Err(KeyError::InvalidLength {
            expected: KEY_LEN,
            got: bytes.len(),
        });
    }

    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let (private, public) = generate_keypair();

        // Keys should not be all zeros
        assert!(!private.iter().all(|&b| b == 0));
        assert!(!public.iter().all(|&b| b == 0));

        // Derived public key should match
        assert_eq!(public_key(&private), public);
    }

    #[test]
    fn test_keypairs_differ() {
        let (first, _) = generate_keypair();
        let (second, _) = generate_keypair();
        assert_ne!(first, second);
    }

    #[test]
    fn test_public_key_derivation() {
        // Known test vector (from RFC 7748)
        let private = [
            0x77, 0x07, 0x6d, 0x0a, 0x73, 0x18, 0xa5, 0x7d, 0x3c, 0x16, 0xc1, 0x72, 0x51, 0xb2,
            0x66, 0x45, 0xdf, 0x4c, 0x2f, 0x87, 0xeb, 0xc0, 0x99, 0x2a, 0xb1, 0x77, 0xfb, 0xa5,
            0x1d, 0xb9, 0x2c, 0x2a,
        ];

        let expected_public = [
            0x85, 0x20, 0xf0, 0x09, 0x89, 0x30, 0xa7, 0x54, 0x74, 0x8b, 0x7d, 0xdc, 0xb4, 0x3e,
            0xf7, 0x5a, 0x0d, 0xbf, 0x3a, 0x0d, 0x26, 0x38, 0x1a, 0xf4, 0xeb, 0xa4, 0xa9, 0x8e,
            0xaa, 0x9b, 0x4e, 0x6a,
        ];

        let computed_public = public_key(&private);
        assert_eq!(computed_public, expected_public);
    }

    #[test]
    fn test_decode_key() {
        let key = decode_key(" UOvtcWdILFwjb1UnsnK+a9lcqYvNTmtPv+fvqIVOz3w=\n").unwrap();
        assert_eq!(encode_key(&key), "UOvtcWdILFwjb1UnsnK+a9lcqYvNTmtPv+fvqIVOz3w=");
    }

    #[test]
    fn test_decode_invalid_key() {
        assert!(matches!(decode_key("invalid-base64!"), Err(KeyError::InvalidBase64)));
        assert!(matches!(
            decode_key("dG9vIHNob3J0"),
            Err(KeyError::InvalidLength { expected: 32, got: 9 })
        ));
    }
}
