//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors collected)
//!     → GatewayConfig (validated, immutable)
//!     → compiled into a ProxyEngine generation
//!
//! On reload:
//!     watcher.rs detects change (or SIGHUP fires)
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new ProxyEngine built, swapped atomically
//!     → in-flight requests finish on the old generation
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Route order in the file is match priority; no separate field

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::GatewayConfig;
pub use schema::ListenerConfig;
pub use schema::RouteConfig;
pub use validation::{validate_config, ValidationError};
