//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → consumed once at startup to build the pool and listener
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the backend pool is fixed for the
//!   process lifetime, so there is no reload path
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::BackendConfig;
pub use schema::ListenerConfig;
pub use schema::ProxyConfig;
pub use schema::TimeoutConfig;
pub use validation::ValidationError;
