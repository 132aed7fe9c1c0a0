//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → MirrorConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is resolved once at startup and never changes afterwards
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{ListenerConfig, MirrorConfig, MirrorTargetConfig, ObservabilityConfig, QueueConfig};
pub use validation::{validate_config, ValidationError};
