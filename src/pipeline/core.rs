use crate::config::{
    ConfigProperty, ConfigSchema, ConfigStore, StageConfig, INPUT_FORMAT_KEY, OUTPUT_FORMAT_KEY,
};
use crate::error::{EtlError, EtlResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::format::{formats_compatible, FormatSpec, FormatTag};
use super::packet::Packet;

/// A single stage in a chain: a reader, a filter or a writer
///
/// Only `invoke` and `core` are required. The hooks default to letting the
/// packet pass, the lifecycle methods default to doing nothing.
///
/// # Example
/// ```
/// use etl_chain::config::ConfigStore;
/// use etl_chain::error::EtlResult;
/// use etl_chain::pipeline::{FormatTag, Packet, Stage, StageCore};
///
/// struct Upper {
///     core: StageCore,
/// }
///
/// impl Stage for Upper {
///     fn core(&self) -> &StageCore {
///         &self.core
///     }
///
///     fn invoke(&mut self, mut packet: Packet) -> EtlResult<Packet> {
///         if let Some(text) = packet.data().and_then(|d| d.as_str()) {
///             let upper = text.to_uppercase();
///             packet.set_data(upper.into());
///         }
///         Ok(packet)
///     }
/// }
///
/// let store = ConfigStore::new().with_section("upper", Vec::<(String, String)>::new());
/// let core = StageCore::builder("upper")
///     .consumes(FormatTag::String)
///     .produces(FormatTag::String)
///     .build(&store)
///     .unwrap();
/// let stage = Upper { core };
/// assert_eq!(stage.describe(), "upper: in=string out=string");
/// ```
pub trait Stage: Send {
    /// Shared state: configuration and effective formats
    fn core(&self) -> &StageCore;

    /// Stage-specific work on one packet
    fn invoke(&mut self, packet: Packet) -> EtlResult<Packet>;

    /// Get stage name for logging
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Effective input format
    fn input_format(&self) -> FormatTag {
        self.core().input_format()
    }

    /// Effective output format
    fn output_format(&self) -> FormatTag {
        self.core().output_format()
    }

    /// Called before `invoke`; returning false stops the packet here
    fn before_invoke(&mut self, _packet: &mut Packet) -> bool {
        true
    }

    /// Called right after `invoke`; returning false keeps the packet from
    /// reaching the next stage
    fn after_invoke(&mut self, _packet: &mut Packet) -> bool {
        true
    }

    /// Called once all following stages have handled the packet
    fn after_chain_invoke(&mut self, _packet: &mut Packet) -> bool {
        true
    }

    /// One-time initialisation before the first packet
    fn init(&mut self) -> EtlResult<()> {
        Ok(())
    }

    /// One-time cleanup after the last packet
    fn exit(&mut self) -> EtlResult<()> {
        Ok(())
    }

    /// Check our output against the next stage's input
    fn is_compatible_with(&self, next: &dyn Stage) -> bool {
        formats_compatible(self.output_format(), next.input_format())
    }

    /// `"<name>: in=<input> out=<output>"`
    fn describe(&self) -> String {
        self.core().describe()
    }
}

/// Configuration and resolved formats common to every stage
#[derive(Debug)]
pub struct StageCore {
    name: String,
    config: StageConfig,
    consumes: FormatSpec,
    produces: FormatSpec,
    input_format: FormatTag,
    output_format: FormatTag,
}

impl StageCore {
    /// Start building the core for the stage configured in `section`
    pub fn builder(section: impl Into<String>) -> StageCoreBuilder {
        StageCoreBuilder::new(section)
    }

    /// Build a core with only the format overrides in its schema
    pub fn new(
        store: &ConfigStore,
        section: &str,
        consumes: impl Into<FormatSpec>,
        produces: impl Into<FormatSpec>,
    ) -> EtlResult<Self> {
        Self::builder(section)
            .consumes(consumes)
            .produces(produces)
            .build(store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Declared input capability
    pub fn consumes(&self) -> &FormatSpec {
        &self.consumes
    }

    /// Declared output capability
    pub fn produces(&self) -> &FormatSpec {
        &self.produces
    }

    pub fn input_format(&self) -> FormatTag {
        self.input_format
    }

    pub fn output_format(&self) -> FormatTag {
        self.output_format
    }

    pub fn describe(&self) -> String {
        describe(&self.name, self.input_format, self.output_format)
    }
}

fn describe(name: &str, input: FormatTag, output: FormatTag) -> String {
    format!("{}: in={} out={}", name, input, output)
}

/// Pick the effective format from a capability and an optional override
fn resolve_format(
    spec: &FormatSpec,
    config: &StageConfig,
    key: &str,
    direction: &str,
) -> EtlResult<FormatTag> {
    let candidates = match spec {
        FormatSpec::Single(tag) => return Ok(*tag),
        FormatSpec::OneOf(candidates) => candidates,
    };

    let Some(first) = candidates.first() else {
        return Err(EtlError::configuration(
            config.stage(),
            format!("no {} formats declared", direction),
        ));
    };

    let Some(configured) = config.get_str(key)? else {
        return Ok(*first);
    };

    let tag: FormatTag = configured
        .parse()
        .map_err(|e: String| EtlError::configuration(config.stage(), e))?;
    if !spec.allows(tag) {
        return Err(EtlError::configuration(
            config.stage(),
            format!(
                "configured {} format {} not in allowed list: {}",
                direction, tag, spec
            ),
        ));
    }
    Ok(tag)
}

/// Builder for [`StageCore`]
#[derive(Debug)]
pub struct StageCoreBuilder {
    section: String,
    name: Option<String>,
    consumes: FormatSpec,
    produces: FormatSpec,
    properties: Vec<ConfigProperty>,
    schema: Option<Arc<ConfigSchema>>,
}

impl StageCoreBuilder {
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            name: None,
            consumes: FormatSpec::default(),
            produces: FormatSpec::default(),
            properties: Vec::new(),
            schema: None,
        }
    }

    /// Name used in logs and errors; defaults to the section name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the accepted input format(s)
    pub fn consumes(mut self, consumes: impl Into<FormatSpec>) -> Self {
        self.consumes = consumes.into();
        self
    }

    /// Set the emitted output format(s)
    pub fn produces(mut self, produces: impl Into<FormatSpec>) -> Self {
        self.produces = produces.into();
        self
    }

    /// Declare one configuration property
    pub fn property(mut self, property: ConfigProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Use a schema shared with other instances of the same stage type
    ///
    /// Properties declared with [`property`](Self::property) are ignored when
    /// a shared schema is set.
    pub fn schema(mut self, schema: Arc<ConfigSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Bind the section, resolve required properties and effective formats
    pub fn build(self, store: &ConfigStore) -> EtlResult<StageCore> {
        let name = self.name.unwrap_or_else(|| self.section.clone());
        let schema = match self.schema {
            Some(schema) => schema,
            None => Arc::new(ConfigSchema::new(self.properties)?),
        };

        let section = store.section(&self.section)?;
        let mut config = StageConfig::new(name.as_str(), section, schema)?;

        let output_format = resolve_format(&self.produces, &config, OUTPUT_FORMAT_KEY, "output")?;
        let input_format = resolve_format(&self.consumes, &config, INPUT_FORMAT_KEY, "input")?;
        config.set_stage(describe(&name, input_format, output_format));

        tracing::debug!(
            stage = %name,
            input = %input_format,
            output = %output_format,
            "stage configured"
        );

        Ok(StageCore {
            name,
            config,
            consumes: self.consumes,
            produces: self.produces,
            input_format,
            output_format,
        })
    }
}

/// Result of a complete chain run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Identifier of this run
    pub run_id: Uuid,

    /// Chain name
    pub chain_name: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Number of packets pushed through the head of the chain
    pub packets_processed: u64,

    /// Total duration
    pub total_duration: Duration,
}

impl RunSummary {
    pub fn new(
        chain_name: impl Into<String>,
        started_at: DateTime<Utc>,
        packets_processed: u64,
        total_duration: Duration,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            chain_name: chain_name.into(),
            started_at,
            packets_processed,
            total_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(pairs: &[(&str, &str)]) -> ConfigStore {
        ConfigStore::new().with_section("stage", pairs.iter().copied())
    }

    const CANDIDATES: [FormatTag; 3] = [
        FormatTag::Record,
        FormatTag::RecordArray,
        FormatTag::Struct,
    ];

    #[test]
    fn test_single_formats() {
        let core = StageCore::new(&store(&[]), "stage", FormatTag::String, FormatTag::Record)
            .unwrap();
        assert_eq!(core.input_format(), FormatTag::String);
        assert_eq!(core.output_format(), FormatTag::Record);
        assert_eq!(core.name(), "stage");
        assert_eq!(core.describe(), "stage: in=string out=record");
    }

    #[test]
    fn test_defaults_to_none() {
        let core = StageCore::builder("stage").build(&store(&[])).unwrap();
        assert_eq!(core.input_format(), FormatTag::None);
        assert_eq!(core.output_format(), FormatTag::None);
    }

    #[test]
    fn test_single_format_ignores_override() {
        let core = StageCore::new(
            &store(&[("output_format", "struct")]),
            "stage",
            FormatTag::None,
            FormatTag::Record,
        )
        .unwrap();
        assert_eq!(core.output_format(), FormatTag::Record);
    }

    #[test]
    fn test_list_defaults_to_first() {
        let core = StageCore::new(&store(&[]), "stage", CANDIDATES, CANDIDATES).unwrap();
        assert_eq!(core.output_format(), FormatTag::Record);
        assert_eq!(core.input_format(), FormatTag::Record);
    }

    #[test]
    fn test_list_with_override() {
        let core = StageCore::new(
            &store(&[("output_format", "struct"), ("input_format", "record_array")]),
            "stage",
            CANDIDATES,
            CANDIDATES,
        )
        .unwrap();
        assert_eq!(core.output_format(), FormatTag::Struct);
        assert_eq!(core.input_format(), FormatTag::RecordArray);
        assert!(core.config().is_resolved(OUTPUT_FORMAT_KEY));
        // The declared capability is kept alongside the resolved formats
        assert_eq!(core.produces(), &FormatSpec::from(CANDIDATES));
        assert_eq!(core.consumes(), &FormatSpec::from(CANDIDATES));
    }

    #[test]
    fn test_override_not_in_list() {
        let result = StageCore::new(
            &store(&[("output_format", "geojson_feature")]),
            "stage",
            FormatTag::None,
            CANDIDATES,
        );
        match result {
            Err(EtlError::Configuration { message, .. }) => {
                assert!(message.contains("not in allowed list"))
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_override() {
        let result = StageCore::new(
            &store(&[("input_format", "rows")]),
            "stage",
            CANDIDATES,
            FormatTag::None,
        );
        assert!(matches!(result, Err(EtlError::Configuration { .. })));
    }

    #[test]
    fn test_empty_candidate_list() {
        let result = StageCore::new(
            &store(&[]),
            "stage",
            FormatTag::None,
            Vec::<FormatTag>::new(),
        );
        assert!(matches!(result, Err(EtlError::Configuration { .. })));
    }

    #[test]
    fn test_missing_section() {
        let result = StageCore::new(
            &ConfigStore::new(),
            "stage",
            FormatTag::None,
            FormatTag::None,
        );
        assert!(matches!(result, Err(EtlError::SectionNotFound(_))));
    }

    #[test]
    fn test_required_property_names_stage() {
        let result = StageCore::builder("stage")
            .name("reader")
            .property(ConfigProperty::string("file_path").required())
            .build(&store(&[]));
        match result {
            Err(EtlError::Configuration { stage, message }) => {
                assert_eq!(stage, "reader");
                assert!(message.contains("file_path"));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_schema() {
        let schema =
            Arc::new(ConfigSchema::new([ConfigProperty::int("limit").with_default(5)]).unwrap());
        let first = StageCore::builder("stage")
            .schema(schema.clone())
            .build(&store(&[("limit", "1")]))
            .unwrap();
        let second = StageCore::builder("stage")
            .schema(schema.clone())
            .build(&store(&[]))
            .unwrap();
        assert_eq!(first.config().get_int("limit").unwrap(), Some(1));
        assert_eq!(second.config().get_int("limit").unwrap(), Some(5));
        assert_eq!(Arc::strong_count(&schema), 3);
    }

    #[test]
    fn test_error_label_includes_formats() {
        let core = StageCore::new(&store(&[]), "stage", FormatTag::Any, FormatTag::String).unwrap();
        let err = core.config().get_int("missing").unwrap_err();
        assert!(err.to_string().contains("stage: in=any out=string"));
    }

    #[test]
    fn test_run_summary() {
        let summary = RunSummary::new("chain", Utc::now(), 3, Duration::from_millis(5));
        assert_eq!(summary.chain_name, "chain");
        assert_eq!(summary.packets_processed, 3);
        assert_ne!(summary.run_id, Uuid::nil());
    }
}
