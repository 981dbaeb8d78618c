use super::section::{ConfigSection, ConfigSource};
use crate::error::{EtlError, EtlResult};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Key of the optional input format override every stage understands
pub const INPUT_FORMAT_KEY: &str = "input_format";

/// Key of the optional output format override every stage understands
pub const OUTPUT_FORMAT_KEY: &str = "output_format";

/// Declared type of a configuration property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigType {
    String,
    Bool,
    Int,
    List,
    Dict,
    Tuple,
}

impl ConfigType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::String => "string",
            ConfigType::Bool => "bool",
            ConfigType::Int => "int",
            ConfigType::List => "list",
            ConfigType::Dict => "dict",
            ConfigType::Tuple => "tuple",
        }
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved, typed configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    String(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
    Dict(BTreeMap<String, String>),
    Tuple(Vec<String>),
}

impl ConfigValue {
    pub fn config_type(&self) -> ConfigType {
        match self {
            ConfigValue::String(_) => ConfigType::String,
            ConfigValue::Bool(_) => ConfigType::Bool,
            ConfigValue::Int(_) => ConfigType::Int,
            ConfigValue::List(_) => ConfigType::List,
            ConfigValue::Dict(_) => ConfigType::Dict,
            ConfigValue::Tuple(_) => ConfigType::Tuple,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            ConfigValue::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[String]> {
        match self {
            ConfigValue::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

/// Declaration of one configuration property of a stage type
///
/// # Example
/// ```
/// use etl_chain::config::ConfigProperty;
///
/// let property = ConfigProperty::int("max_features")
///     .with_default(1000)
///     .describe("Maximum number of features per packet");
/// assert!(!property.is_required());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigProperty {
    name: String,
    declared_type: ConfigType,
    default: Option<ConfigValue>,
    required: bool,
    description: String,
}

impl ConfigProperty {
    /// Declare a property of the given type, optional and without default
    pub fn new(name: impl Into<String>, declared_type: ConfigType) -> Self {
        Self {
            name: name.into(),
            declared_type,
            default: None,
            required: false,
            description: String::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ConfigType::String)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ConfigType::Bool)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ConfigType::Int)
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, ConfigType::List)
    }

    pub fn dict(name: impl Into<String>) -> Self {
        Self::new(name, ConfigType::Dict)
    }

    pub fn tuple(name: impl Into<String>) -> Self {
        Self::new(name, ConfigType::Tuple)
    }

    /// Set the value used when the key is absent
    pub fn with_default(mut self, default: impl Into<ConfigValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Mark the property as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a human-readable description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> ConfigType {
        self.declared_type
    }

    pub fn default_value(&self) -> Option<&ConfigValue> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Read and convert this property from a section
    fn resolve(&self, section: &ConfigSection) -> EtlResult<Option<ConfigValue>> {
        let name = self.name.as_str();
        let default = self.default.clone();
        // Schema validation guarantees the default matches the declared type.
        let value = match self.declared_type {
            ConfigType::String => section
                .get(name, default.and_then(|d| d.as_str().map(str::to_string)))
                .map(ConfigValue::String),
            ConfigType::Bool => section
                .get_bool(name, default.and_then(|d| d.as_bool()))?
                .map(ConfigValue::Bool),
            ConfigType::Int => section
                .get_int(name, default.and_then(|d| d.as_int()))?
                .map(ConfigValue::Int),
            ConfigType::List => section
                .get_list(name, default.and_then(|d| d.as_list().map(<[String]>::to_vec)))?
                .map(ConfigValue::List),
            ConfigType::Dict => section
                .get_dict(name, default.and_then(|d| d.as_dict().cloned()))?
                .map(ConfigValue::Dict),
            ConfigType::Tuple => section
                .get_tuple(name, default.and_then(|d| d.as_tuple().map(<[String]>::to_vec)))?
                .map(ConfigValue::Tuple),
        };
        Ok(value)
    }
}

/// The configuration properties declared by one stage type
///
/// Every schema implicitly carries the optional string properties
/// `input_format` and `output_format`. Schemas are immutable once built and
/// can be shared between stage instances through an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSchema {
    properties: Vec<ConfigProperty>,
}

impl ConfigSchema {
    /// Build a schema from the stage's own properties
    ///
    /// Fails on duplicate names and on defaults whose type differs from the
    /// declared type.
    pub fn new(properties: impl IntoIterator<Item = ConfigProperty>) -> EtlResult<Self> {
        let mut all = Self::base_properties();
        all.extend(properties);

        let mut seen = HashSet::new();
        for property in &all {
            if !seen.insert(property.name()) {
                return Err(EtlError::InvalidSchema(format!(
                    "property '{}' declared more than once",
                    property.name()
                )));
            }
            if let Some(default) = property.default_value() {
                if default.config_type() != property.declared_type() {
                    return Err(EtlError::InvalidSchema(format!(
                        "default of property '{}' is a {} but the property is declared as {}",
                        property.name(),
                        default.config_type(),
                        property.declared_type()
                    )));
                }
            }
        }

        Ok(Self { properties: all })
    }

    fn base_properties() -> Vec<ConfigProperty> {
        vec![
            ConfigProperty::string(INPUT_FORMAT_KEY).describe(
                "The specific input format if the stage consumes a list of formats",
            ),
            ConfigProperty::string(OUTPUT_FORMAT_KEY).describe(
                "The specific output format if the stage produces a list of formats",
            ),
        ]
    }

    pub fn property(&self, name: &str) -> Option<&ConfigProperty> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn properties(&self) -> &[ConfigProperty] {
        &self.properties
    }

    pub fn required_properties(&self) -> impl Iterator<Item = &ConfigProperty> {
        self.properties.iter().filter(|p| p.is_required())
    }
}

/// Configuration of one stage instance: its section, its schema and the
/// resolve-once cache
///
/// Values are converted on first read and cached for the lifetime of the
/// instance. Later changes to the section are not observed by properties that
/// were already resolved.
#[derive(Debug)]
pub struct StageConfig {
    stage: String,
    section: ConfigSection,
    schema: Arc<ConfigSchema>,
    cache: RefCell<HashMap<String, Option<ConfigValue>>>,
}

impl StageConfig {
    /// Bind a section to a schema and resolve all required properties
    ///
    /// `stage` labels the owning stage in error messages.
    pub fn new(
        stage: impl Into<String>,
        section: ConfigSection,
        schema: Arc<ConfigSchema>,
    ) -> EtlResult<Self> {
        let config = Self {
            stage: stage.into(),
            section,
            schema,
            cache: RefCell::new(HashMap::new()),
        };
        for property in config.schema.required_properties() {
            config.value(property.name())?;
        }
        Ok(config)
    }

    pub fn section(&self) -> &ConfigSection {
        &self.section
    }

    /// Mutable access to the raw section; resolved values are not affected
    pub fn section_mut(&mut self) -> &mut ConfigSection {
        &mut self.section
    }

    pub fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    /// Label used in error messages
    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub(crate) fn set_stage(&mut self, stage: impl Into<String>) {
        self.stage = stage.into();
    }

    /// Check if a property has already been resolved
    pub fn is_resolved(&self, name: &str) -> bool {
        self.cache.borrow().contains_key(name)
    }

    /// Resolve a declared property, reading the section at most once
    pub fn value(&self, name: &str) -> EtlResult<Option<ConfigValue>> {
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(cached.clone());
        }

        let property = self.schema.property(name).ok_or_else(|| {
            EtlError::configuration(
                &self.stage,
                format!("config property: {} is not declared", name),
            )
        })?;

        let value = property.resolve(&self.section)?;
        if property.is_required() && value.is_none() {
            return Err(EtlError::configuration(
                &self.stage,
                format!("config property: {} is required", name),
            ));
        }

        tracing::trace!(stage = %self.stage, property = name, ?value, "resolved config property");
        self.cache
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn typed<T>(
        &self,
        name: &str,
        expected: ConfigType,
        extract: impl FnOnce(ConfigValue) -> Option<T>,
    ) -> EtlResult<Option<T>> {
        if let Some(property) = self.schema.property(name) {
            if property.declared_type() != expected {
                return Err(EtlError::configuration(
                    &self.stage,
                    format!(
                        "config property: {} is declared as {}, not {}",
                        name,
                        property.declared_type(),
                        expected
                    ),
                ));
            }
        }
        Ok(self.value(name)?.and_then(extract))
    }

    pub fn get_str(&self, name: &str) -> EtlResult<Option<String>> {
        self.typed(name, ConfigType::String, |v| match v {
            ConfigValue::String(s) => Some(s),
            _ => None,
        })
    }

    pub fn get_bool(&self, name: &str) -> EtlResult<Option<bool>> {
        self.typed(name, ConfigType::Bool, |v| v.as_bool())
    }

    pub fn get_int(&self, name: &str) -> EtlResult<Option<i64>> {
        self.typed(name, ConfigType::Int, |v| v.as_int())
    }

    pub fn get_list(&self, name: &str) -> EtlResult<Option<Vec<String>>> {
        self.typed(name, ConfigType::List, |v| match v {
            ConfigValue::List(items) => Some(items),
            _ => None,
        })
    }

    pub fn get_dict(&self, name: &str) -> EtlResult<Option<BTreeMap<String, String>>> {
        self.typed(name, ConfigType::Dict, |v| match v {
            ConfigValue::Dict(dict) => Some(dict),
            _ => None,
        })
    }

    pub fn get_tuple(&self, name: &str) -> EtlResult<Option<Vec<String>>> {
        self.typed(name, ConfigType::Tuple, |v| match v {
            ConfigValue::Tuple(items) => Some(items),
            _ => None,
        })
    }

    /// Get a string property that must be present
    pub fn require_str(&self, name: &str) -> EtlResult<String> {
        self.get_str(name)?.ok_or_else(|| {
            EtlError::configuration(&self.stage, format!("config property: {} is required", name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<ConfigSchema> {
        Arc::new(
            ConfigSchema::new([
                ConfigProperty::string("path").required(),
                ConfigProperty::int("limit").with_default(10),
                ConfigProperty::bool("verbose").with_default(false),
                ConfigProperty::list("columns"),
                ConfigProperty::dict("rename"),
                ConfigProperty::tuple("bbox"),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_schema_includes_format_overrides() {
        let schema = schema();
        assert!(schema.property(INPUT_FORMAT_KEY).is_some());
        assert!(schema.property(OUTPUT_FORMAT_KEY).is_some());
        assert_eq!(schema.properties().len(), 8);
        assert_eq!(schema.required_properties().count(), 1);
    }

    #[test]
    fn test_schema_rejects_duplicates() {
        let result = ConfigSchema::new([ConfigProperty::int("a"), ConfigProperty::string("a")]);
        assert!(matches!(result, Err(EtlError::InvalidSchema(_))));

        let result = ConfigSchema::new([ConfigProperty::string(OUTPUT_FORMAT_KEY)]);
        assert!(matches!(result, Err(EtlError::InvalidSchema(_))));
    }

    #[test]
    fn test_schema_rejects_mistyped_default() {
        let result = ConfigSchema::new([ConfigProperty::int("limit").with_default("ten")]);
        assert!(matches!(result, Err(EtlError::InvalidSchema(_))));
    }

    #[test]
    fn test_required_missing_fails_at_construction() {
        let section = ConfigSection::from_pairs("reader", [("limit", "5")]);
        let result = StageConfig::new("reader", section, schema());
        match result {
            Err(EtlError::Configuration { stage, message }) => {
                assert_eq!(stage, "reader");
                assert!(message.contains("path"));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_required_resolved_eagerly() {
        let section = ConfigSection::from_pairs("reader", [("path", "in.csv")]);
        let config = StageConfig::new("reader", section, schema()).unwrap();
        assert!(config.is_resolved("path"));
        assert!(!config.is_resolved("limit"));
    }

    #[test]
    fn test_defaults_and_conversion() {
        let section = ConfigSection::from_pairs(
            "reader",
            [
                ("path", "in.csv"),
                ("verbose", "true"),
                ("columns", "a,b"),
                ("rename", "a: x"),
                ("bbox", "(0, 1)"),
            ],
        );
        let config = StageConfig::new("reader", section, schema()).unwrap();

        assert_eq!(config.get_int("limit").unwrap(), Some(10));
        assert_eq!(config.get_bool("verbose").unwrap(), Some(true));
        assert_eq!(
            config.get_list("columns").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            config.get_dict("rename").unwrap().unwrap().get("a"),
            Some(&"x".to_string())
        );
        assert_eq!(
            config.get_tuple("bbox").unwrap(),
            Some(vec!["0".to_string(), "1".to_string()])
        );
        assert_eq!(config.get_str(OUTPUT_FORMAT_KEY).unwrap(), None);
    }

    #[test]
    fn test_resolve_once() {
        let section = ConfigSection::from_pairs("reader", [("path", "in.csv"), ("limit", "3")]);
        let mut config = StageConfig::new("reader", section, schema()).unwrap();

        assert_eq!(config.get_int("limit").unwrap(), Some(3));
        config.section_mut().set("limit", "99");
        config.section_mut().set("path", "other.csv");

        assert_eq!(config.get_int("limit").unwrap(), Some(3));
        assert_eq!(config.require_str("path").unwrap(), "in.csv");
    }

    #[test]
    fn test_absent_value_is_cached_too() {
        let section = ConfigSection::from_pairs("reader", [("path", "in.csv")]);
        let mut config = StageConfig::new("reader", section, schema()).unwrap();

        assert_eq!(config.get_list("columns").unwrap(), None);
        config.section_mut().set("columns", "a,b");
        assert_eq!(config.get_list("columns").unwrap(), None);
    }

    #[test]
    fn test_undeclared_property() {
        let section = ConfigSection::from_pairs("reader", [("path", "in.csv"), ("other", "x")]);
        let config = StageConfig::new("reader", section, schema()).unwrap();
        assert!(matches!(
            config.value("other"),
            Err(EtlError::Configuration { .. })
        ));
    }

    #[test]
    fn test_wrong_type_access() {
        let section = ConfigSection::from_pairs("reader", [("path", "in.csv")]);
        let config = StageConfig::new("reader", section, schema()).unwrap();
        assert!(config.get_bool("limit").is_err());
        assert!(!config.is_resolved("limit"));
    }

    #[test]
    fn test_invalid_value() {
        let section = ConfigSection::from_pairs("reader", [("path", "in.csv"), ("limit", "ten")]);
        let config = StageConfig::new("reader", section, schema()).unwrap();
        assert!(matches!(
            config.get_int("limit"),
            Err(EtlError::InvalidValue { .. })
        ));
        assert!(!config.is_resolved("limit"));
    }
}
