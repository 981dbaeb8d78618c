use super::format::FormatTag;
use serde_json::Value;
use std::collections::HashMap;

/// Unit of data handed from stage to stage
///
/// The payload is a JSON value whose shape is agreed on by the stages that
/// exchange it. The format is stamped by the sending stage just before the
/// packet moves on, so a fresh packet has no format.
///
/// # Example
/// ```
/// use etl_chain::pipeline::{FormatTag, Packet};
/// use serde_json::json;
///
/// let mut packet = Packet::with_data(json!([{"id": 1}]));
/// packet.set_format(FormatTag::RecordArray);
/// packet.set_metadata("source", "rows.csv");
///
/// assert_eq!(packet.format(), Some(FormatTag::RecordArray));
/// assert_eq!(packet.get_metadata("source"), Some("rows.csv"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packet {
    /// Payload, if any
    data: Option<Value>,

    /// Format of the payload as stamped by the last sender
    format: Option<FormatTag>,

    /// Free-form metadata travelling with the payload
    metadata: HashMap<String, String>,

    /// No more packets will follow
    end_of_stream: bool,

    /// Last packet of the current document
    end_of_doc: bool,
}

impl Packet {
    /// Create an empty packet
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a packet carrying a payload
    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut Value> {
        self.data.as_mut()
    }

    pub fn set_data(&mut self, data: Value) {
        self.data = Some(data);
    }

    /// Take the payload, leaving the packet empty
    pub fn consume(&mut self) -> Option<Value> {
        self.data.take()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    pub fn format(&self) -> Option<FormatTag> {
        self.format
    }

    pub fn set_format(&mut self, format: FormatTag) {
        self.format = Some(format);
    }

    pub fn set_end_of_stream(&mut self) {
        self.end_of_stream = true;
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Mark the end of a document; the end of the stream also ends the document
    pub fn set_end_of_doc(&mut self) {
        self.end_of_doc = true;
    }

    pub fn is_end_of_doc(&self) -> bool {
        self.end_of_doc || self.end_of_stream
    }

    /// Set metadata
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Get metadata
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    /// Get all metadata
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_packet_is_empty() {
        let packet = Packet::new();
        assert!(packet.is_empty());
        assert_eq!(packet.format(), None);
        assert!(!packet.is_end_of_stream());
        assert!(!packet.is_end_of_doc());
    }

    #[test]
    fn test_consume() {
        let mut packet = Packet::with_data(json!("line"));
        assert_eq!(packet.consume(), Some(json!("line")));
        assert!(packet.is_empty());
        assert_eq!(packet.consume(), None);
    }

    #[test]
    fn test_data_mut() {
        let mut packet = Packet::with_data(json!([1]));
        if let Some(Value::Array(items)) = packet.data_mut() {
            items.push(json!(2));
        }
        assert_eq!(packet.data(), Some(&json!([1, 2])));
    }

    #[test]
    fn test_end_of_stream_ends_doc() {
        let mut packet = Packet::new();
        packet.set_end_of_stream();
        assert!(packet.is_end_of_stream());
        assert!(packet.is_end_of_doc());
    }

    #[test]
    fn test_metadata() {
        let mut packet = Packet::new();
        packet.set_metadata("source", "a.csv");
        packet.set_metadata("line", "3");
        assert_eq!(packet.get_metadata("source"), Some("a.csv"));
        assert_eq!(packet.metadata().len(), 2);
        assert_eq!(packet.get_metadata("missing"), None);
    }
}
