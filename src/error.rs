//! Error types for wg-provision

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for a provisioning run
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The supplied template is structurally unusable
    #[error("Template error: {0}")]
    Structure(#[from] StructuralError),

    /// Settings or strict config validation errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Key generation or loading errors
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// Persisting files failed
    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    /// Bringing the interface up or down failed
    #[error("Activation error: {0}")]
    Activation(#[from] ActivationError),

    /// Firewall, intrusion guard or package steps failed
    #[error("Hardening error: {0}")]
    Hardening(#[from] HardeningError),

    /// The installer needs root for this command
    #[error("Insufficient privileges: {message}")]
    InsufficientPrivileges { message: String },

    /// System I/O errors (terminal input, stdout)
    #[error("System error: {0}")]
    System(#[from] std::io::Error),
}

/// Template structure errors raised by the merge engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("missing required section: {section}")]
    MissingSection { section: String },

    #[error("duplicate section {section} (found {count}, expected exactly one)")]
    DuplicateSection { section: String, count: usize },
}

/// Settings loading and strict configuration parsing errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid config format at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Invalid base64 key: {field}")]
    InvalidKey { field: String },

    #[error("Invalid IP address: {value}")]
    InvalidAddress { value: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid CIDR notation: {value}")]
    InvalidCidr { value: String },

    #[error("Invalid settings file {path}: {message}")]
    Settings { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key material errors
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("private key is not valid base64")]
    InvalidBase64,

    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("failed to read private key from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File persistence errors
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("{} already exists", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set permissions on {}: {source}", .path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of an external command
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{program} not found in PATH")]
    NotFound { program: String },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Interface activation errors
#[derive(Error, Debug)]
pub enum ActivationError {
    #[error("failed to bring up {interface}: {source}")]
    Up {
        interface: String,
        #[source]
        source: CommandError,
        /// Recent journal lines for the interface unit, if they could be read
        diagnostics: Option<String>,
    },

    #[error("failed to bring down {interface}: {source}")]
    Down {
        interface: String,
        #[source]
        source: CommandError,
    },

    #[error("failed to enable {unit} at boot: {source}")]
    Enable {
        unit: String,
        #[source]
        source: CommandError,
    },
}

/// Optional hardening step errors
#[derive(Error, Debug)]
pub enum HardeningError {
    #[error("firewall step failed: {0}")]
    Firewall(#[source] CommandError),

    #[error("intrusion guard step failed: {0}")]
    IntrusionGuard(#[source] CommandError),

    #[error("failed to write jail configuration: {0}")]
    JailFile(#[source] InstallError),

    #[error("package installation failed: {0}")]
    Packages(#[source] CommandError),
}

impl ProvisionError {
    /// Get a user-friendly error message with suggested action
    pub fn user_message(&self) -> String {
        match self {
            Self::Structure(StructuralError::MissingSection { section }) => {
                format!(
                    "The pasted configuration has no {} section.\n  \
                    Add the section header and run the installer again.",
                    section
                )
            }

            Self::Structure(StructuralError::DuplicateSection { section, count }) => {
                format!(
                    "The pasted configuration has {} {} sections.\n  \
                    Keep exactly one and run the installer again.",
                    count, section
                )
            }

            Self::InsufficientPrivileges { message } => {
                format!("Insufficient privileges: {}\n  Run again with sudo.", message)
            }

            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("File not found: {}\n  Check the path and try again.", path)
            }

            Self::Key(KeyError::InvalidBase64 | KeyError::InvalidLength { .. }) => {
                "Invalid private key. Expected 32-byte base64-encoded key.".to_string()
            }

            Self::Install(InstallError::AlreadyExists { path }) => {
                format!(
                    "{} already exists.\n  \
                    Re-run with --force to overwrite it.",
                    path.display()
                )
            }

            Self::Activation(ActivationError::Up {
                interface,
                source,
                diagnostics,
            }) => {
                let mut message = format!("Failed to bring up {}: {}", interface, source);
                match diagnostics {
                    Some(log) if !log.trim().is_empty() => {
                        message.push_str("\n  Recent log entries:\n");
                        for line in log.lines() {
                            message.push_str("    ");
                            message.push_str(line);
                            message.push('\n');
                        }
                    }
                    _ => {
                        message.push_str(&format!(
                            "\n  Inspect the log with: journalctl -u wg-quick@{}",
                            interface
                        ));
                    }
                }
                message
            }

            _ => format!("{}", self),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Structure(_) => 1,
            Self::Config(_) => 1,
            Self::Key(_) => 2,
            Self::Install(_) => 3,
            Self::Activation(_) => 4,
            Self::Hardening(_) => 5,
            Self::InsufficientPrivileges { .. } => 6,
            Self::System(_) => 7,
        }
    }
}

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;
