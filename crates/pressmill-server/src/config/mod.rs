//! Server configuration: types, loading, and validation.

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{load_config, ConfigLoader};
pub use types::{
    AuthConfig, CacheBackendKind, CacheConfig, LoggingConfig, PackagesConfig, ServerBindConfig,
    ServerConfig,
};
pub use validation::{validate_config, ConfigError};
