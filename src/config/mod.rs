//! Typed, lazily resolved stage configuration
//!
//! A stage type declares its properties in a [`ConfigSchema`]. Each stage
//! instance binds that schema to its [`ConfigSection`] through a
//! [`StageConfig`], which converts a value on first read and caches it for the
//! rest of the instance's life.
//!
//! # Example
//! ```
//! use etl_chain::config::{ConfigProperty, ConfigSchema, ConfigStore, StageConfig};
//! use std::sync::Arc;
//!
//! let schema = Arc::new(
//!     ConfigSchema::new([
//!         ConfigProperty::string("path").required(),
//!         ConfigProperty::int("limit").with_default(100),
//!     ])
//!     .unwrap(),
//! );
//!
//! let store = ConfigStore::new().with_section("input", [("path", "rows.csv")]);
//! let config = StageConfig::new("input", store.section("input").unwrap(), schema).unwrap();
//!
//! assert_eq!(config.require_str("path").unwrap(), "rows.csv");
//! assert_eq!(config.get_int("limit").unwrap(), Some(100));
//! ```

pub mod binding;
pub mod section;

pub use binding::{
    ConfigProperty, ConfigSchema, ConfigType, ConfigValue, StageConfig, INPUT_FORMAT_KEY,
    OUTPUT_FORMAT_KEY,
};
pub use section::{ConfigSection, ConfigSource, ConfigStore};
