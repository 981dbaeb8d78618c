use crate::error::{EtlError, EtlResult};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Typed read access to one section of configuration
///
/// Every accessor takes a default that is returned verbatim when the key is
/// absent. Conversion is a pure function of the raw string; a present value
/// that cannot be converted yields [`EtlError::InvalidValue`].
pub trait ConfigSource {
    /// Raw string value for a key
    fn raw(&self, key: &str) -> Option<&str>;

    /// Check if a key is present
    fn has(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    fn get(&self, key: &str, default: Option<String>) -> Option<String> {
        match self.raw(key) {
            Some(raw) => Some(raw.to_string()),
            None => default,
        }
    }

    fn get_bool(&self, key: &str, default: Option<bool>) -> EtlResult<Option<bool>> {
        match self.raw(key) {
            Some(raw) => parse_bool(key, raw).map(Some),
            None => Ok(default),
        }
    }

    fn get_int(&self, key: &str, default: Option<i64>) -> EtlResult<Option<i64>> {
        match self.raw(key) {
            Some(raw) => parse_int(key, raw).map(Some),
            None => Ok(default),
        }
    }

    fn get_list(&self, key: &str, default: Option<Vec<String>>) -> EtlResult<Option<Vec<String>>> {
        match self.raw(key) {
            Some(raw) => Ok(Some(parse_sequence(key, raw, '[', ']'))),
            None => Ok(default),
        }
    }

    fn get_dict(
        &self,
        key: &str,
        default: Option<BTreeMap<String, String>>,
    ) -> EtlResult<Option<BTreeMap<String, String>>> {
        match self.raw(key) {
            Some(raw) => parse_dict(key, raw).map(Some),
            None => Ok(default),
        }
    }

    fn get_tuple(
        &self,
        key: &str,
        default: Option<Vec<String>>,
    ) -> EtlResult<Option<Vec<String>>> {
        match self.raw(key) {
            Some(raw) => Ok(Some(parse_sequence(key, raw, '(', ')'))),
            None => Ok(default),
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> EtlResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(EtlError::invalid_value(
            key,
            format!("'{}' is not a boolean", other),
        )),
    }
}

fn parse_int(key: &str, raw: &str) -> EtlResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| EtlError::invalid_value(key, format!("'{}' is not an integer: {}", raw, e)))
}

fn strip_delimiters(raw: &str, open: char, close: char) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix(open)
        .and_then(|s| s.strip_suffix(close))
        .unwrap_or(trimmed)
}

fn unquote(item: &str) -> &str {
    let item = item.trim();
    for quote in ['"', '\''] {
        if item.len() >= 2 && item.starts_with(quote) && item.ends_with(quote) {
            return &item[1..item.len() - 1];
        }
    }
    item
}

/// Text of one JSON element; `None` for null
fn json_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// JSON array text is decoded as such; anything else uses the comma grammar
fn parse_sequence(key: &str, raw: &str, open: char, close: char) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<Value>>(trimmed) {
            return items.into_iter().filter_map(json_text).collect();
        }
    }
    tracing::trace!(key, "reading sequence with comma grammar");
    parse_items(strip_delimiters(trimmed, open, close))
}

fn parse_items(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(unquote)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_dict(key: &str, raw: &str) -> EtlResult<BTreeMap<String, String>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        if let Ok(object) = serde_json::from_str::<Map<String, Value>>(trimmed) {
            return Ok(object
                .into_iter()
                .filter_map(|(name, value)| json_text(value).map(|text| (name, text)))
                .collect());
        }
    }

    let mut dict = BTreeMap::new();
    for pair in strip_delimiters(raw, '{', '}').split(',') {
        if pair.trim().is_empty() {
            continue;
        }
        let (name, value) = pair
            .split_once(':')
            .or_else(|| pair.split_once('='))
            .ok_or_else(|| {
                EtlError::invalid_value(key, format!("'{}' is not a key/value pair", pair.trim()))
            })?;
        dict.insert(unquote(name).to_string(), unquote(value).to_string());
    }
    Ok(dict)
}

/// One named slice of configuration: an ordered mapping of keys to raw strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl ConfigSection {
    /// Create an empty section
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Create a section from key/value pairs, keeping their order
    pub fn from_pairs<K, V, I>(name: impl Into<String>, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut section = Self::new(name);
        for (key, value) in pairs {
            section.set(key, value);
        }
        section
    }

    /// Get the section name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set a value, replacing an existing one in place
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove a value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigSource for ConfigSection {
    fn raw(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// All configuration sections of a pipeline
///
/// # Example
/// ```
/// use etl_chain::config::{ConfigSource, ConfigStore};
///
/// let json = r#"{"input": {"path": "rows.csv", "limit": 10}}"#;
/// let store = ConfigStore::from_json_str(json).unwrap();
/// let section = store.section("input").unwrap();
/// assert_eq!(section.get("path", None), Some("rows.csv".to_string()));
/// assert_eq!(section.get_int("limit", None).unwrap(), Some(10));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    sections: HashMap<String, ConfigSection>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a section built from key/value pairs
    pub fn with_section<K, V, I>(mut self, name: impl Into<String>, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.insert_section(ConfigSection::from_pairs(name, pairs));
        self
    }

    /// Insert or replace a section
    pub fn insert_section(&mut self, section: ConfigSection) {
        self.sections.insert(section.name().to_string(), section);
    }

    /// Get a copy of a section
    pub fn section(&self, name: &str) -> EtlResult<ConfigSection> {
        self.sections
            .get(name)
            .cloned()
            .ok_or_else(|| EtlError::SectionNotFound(name.to_string()))
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Get all section names, sorted
    pub fn section_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Load from a JSON document of the form `{ "section": { "key": value } }`
    ///
    /// Scalars become their textual form, arrays and objects their JSON text.
    pub fn from_json_str(json: &str) -> EtlResult<Self> {
        let document: Value = serde_json::from_str(json)?;
        let Value::Object(sections) = document else {
            return Err(EtlError::GenericError(
                "Configuration document must be a JSON object of sections".to_string(),
            ));
        };

        let mut store = Self::new();
        for (name, body) in sections {
            let Value::Object(entries) = body else {
                return Err(EtlError::GenericError(format!(
                    "Configuration section '{}' must be a JSON object",
                    name
                )));
            };
            let mut section = ConfigSection::new(name);
            for (key, value) in entries {
                if let Some(raw) = json_text(value) {
                    section.set(key, raw);
                }
            }
            store.insert_section(section);
        }
        Ok(store)
    }

    /// Load from a JSON file on disk
    pub fn from_json_file(path: impl AsRef<Path>) -> EtlResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
