//! Stage chaining for ETL pipelines
//!
//! A [`Chain`] is an ordered sequence of [`Stage`]s: a reader at the head,
//! filters in the middle and a writer at the tail. Adjacent stages must agree
//! on the [`FormatTag`] they exchange, which is checked when the chain is
//! assembled. Each [`Packet`] entering the head travels towards the tail until
//! a stage stops it or the chain ends.
//!
//! # Example
//! ```
//! use etl_chain::config::{ConfigProperty, ConfigStore};
//! use etl_chain::error::EtlResult;
//! use etl_chain::pipeline::{Chain, FormatTag, Packet, Stage, StageCore};
//! use serde_json::json;
//!
//! struct Reader {
//!     core: StageCore,
//! }
//!
//! impl Stage for Reader {
//!     fn core(&self) -> &StageCore {
//!         &self.core
//!     }
//!
//!     fn invoke(&mut self, mut packet: Packet) -> EtlResult<Packet> {
//!         let table = self.core.config().require_str("table")?;
//!         packet.set_data(json!([{ "table": table }]));
//!         Ok(packet)
//!     }
//! }
//!
//! struct Writer {
//!     core: StageCore,
//! }
//!
//! impl Stage for Writer {
//!     fn core(&self) -> &StageCore {
//!         &self.core
//!     }
//!
//!     fn invoke(&mut self, packet: Packet) -> EtlResult<Packet> {
//!         Ok(packet)
//!     }
//! }
//!
//! let store = ConfigStore::new()
//!     .with_section("reader", [("table", "roads")])
//!     .with_section("writer", Vec::<(String, String)>::new());
//!
//! let reader = Reader {
//!     core: StageCore::builder("reader")
//!         .produces(FormatTag::RecordArray)
//!         .property(ConfigProperty::string("table").required())
//!         .build(&store)?,
//! };
//! let writer = Writer {
//!     core: StageCore::new(&store, "writer", FormatTag::RecordArray, FormatTag::None)?,
//! };
//!
//! let mut chain = Chain::builder("roads").add_stage(reader)?.add_stage(writer)?.build()?;
//! chain.do_init()?;
//! let packet = chain.process(Packet::new())?;
//! chain.do_exit()?;
//!
//! assert_eq!(packet.format(), Some(FormatTag::RecordArray));
//! # Ok::<(), etl_chain::error::EtlError>(())
//! ```

pub mod core;
pub mod executor;
pub mod format;
pub mod packet;

// Re-export main types
pub use self::core::{RunSummary, Stage, StageCore, StageCoreBuilder};
pub use executor::{Chain, ChainBuilder, ChainState};
pub use format::{formats_compatible, FormatSpec, FormatTag};
pub use packet::Packet;
