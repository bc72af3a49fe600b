//! WireGuard configuration handling
//!
//! - Template merging and field extraction (merge)
//! - Strict parsing of finished `.conf` files (parser)
//! - Installer settings (settings)

mod merge;
mod parser;
mod settings;

pub use merge::{
    extract_field, is_interface_header, is_sentinel, normalize_line, ConfigDocument,
    ConfigMerger, Merged, NormalizedDocument, PlaceholderPolicy, DEFAULT_KEY_FIELD,
    DEFAULT_PLACEHOLDER, DEFAULT_SENTINEL, INTERFACE_HEADER,
};
pub use parser::{InterfaceConfig, PeerConfig, WireGuardConfig};
pub use settings::{validate_interface_name, JailSettings, ProvisionSettings};
