//! Stage chaining core for ETL pipelines
//!
//! Stages declare typed configuration ([`config`]), are linked into a
//! format-checked [`pipeline::Chain`] and share one lifecycle: init once,
//! process packets, exit once.

pub mod config;
pub mod error;
pub mod logger;
pub mod pipeline;

pub use config::{ConfigProperty, ConfigSchema, ConfigStore};
pub use error::{EtlError, EtlResult};
pub use pipeline::{Chain, FormatTag, Packet, Stage, StageCore};
