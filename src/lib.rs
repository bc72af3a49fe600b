//! wg-provision - WireGuard interface provisioning
//!
//! Turns a pasted WireGuard template into an installed, running interface,
//! optionally hardening the host afterwards.
//!
//! # Features
//!
//! - Template merge: the generated private key goes into the placeholder,
//!   the existing `PrivateKey` line, or right after `[Interface]`
//! - Owner-only installation of the merged config
//! - Interface bring-up through wg-quick with journal diagnostics on failure
//! - Optional ufw rules derived from `ListenPort` and a fail2ban sshd jail
//!
//! # Usage
//!
//! ```
//! use wg_provision::{ConfigDocument, ConfigMerger};
//!
//! let text = "[Interface]\nPrivateKey = REPLACE_ME\nEND\n";
//! let template = ConfigDocument::from_text(text, Some("END"));
//! let merged = ConfigMerger::default().merge(&template, "ABC123").unwrap();
//! assert_eq!(merged.to_text(), "[Interface]\nPrivateKey = ABC123\n");
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod input;
pub mod install;
pub mod pipeline;
pub mod system;

pub use config::{
    ConfigDocument, ConfigMerger, NormalizedDocument, PlaceholderPolicy, ProvisionSettings,
};
pub use error::{ProvisionError, StructuralError};
pub use pipeline::{ProvisionReport, Provisioner};
