use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shape of the data a stage accepts or emits
///
/// `None` places no constraint on the next stage; `Any` accepts whatever the
/// previous stage emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatTag {
    None,
    Any,
    String,
    LineStream,
    Record,
    RecordArray,
    Struct,
    EtreeDoc,
    EtreeElement,
    EtreeElementArray,
    EtreeFeatureArray,
    XmlDocAsString,
    XmlLineStream,
    GeojsonFeature,
    GeojsonFeatureArray,
    GeojsonCollection,
    OgrFeature,
    OgrFeatureArray,
    GdalVsiPath,
}

impl FormatTag {
    pub const ALL: [FormatTag; 19] = [
        FormatTag::None,
        FormatTag::Any,
        FormatTag::String,
        FormatTag::LineStream,
        FormatTag::Record,
        FormatTag::RecordArray,
        FormatTag::Struct,
        FormatTag::EtreeDoc,
        FormatTag::EtreeElement,
        FormatTag::EtreeElementArray,
        FormatTag::EtreeFeatureArray,
        FormatTag::XmlDocAsString,
        FormatTag::XmlLineStream,
        FormatTag::GeojsonFeature,
        FormatTag::GeojsonFeatureArray,
        FormatTag::GeojsonCollection,
        FormatTag::OgrFeature,
        FormatTag::OgrFeatureArray,
        FormatTag::GdalVsiPath,
    ];

    /// Canonical name as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::None => "none",
            FormatTag::Any => "any",
            FormatTag::String => "string",
            FormatTag::LineStream => "line_stream",
            FormatTag::Record => "record",
            FormatTag::RecordArray => "record_array",
            FormatTag::Struct => "struct",
            FormatTag::EtreeDoc => "etree_doc",
            FormatTag::EtreeElement => "etree_element",
            FormatTag::EtreeElementArray => "etree_element_array",
            FormatTag::EtreeFeatureArray => "etree_feature_array",
            FormatTag::XmlDocAsString => "xml_doc_as_string",
            FormatTag::XmlLineStream => "xml_line_stream",
            FormatTag::GeojsonFeature => "geojson_feature",
            FormatTag::GeojsonFeatureArray => "geojson_feature_array",
            FormatTag::GeojsonCollection => "geojson_collection",
            FormatTag::OgrFeature => "ogr_feature",
            FormatTag::OgrFeatureArray => "ogr_feature_array",
            FormatTag::GdalVsiPath => "gdal_vsi_path",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        FormatTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == name)
            .ok_or_else(|| format!("unknown format: {}", name))
    }
}

/// Check whether `output` may be handed to a stage consuming `input`
pub fn formats_compatible(output: FormatTag, input: FormatTag) -> bool {
    output == FormatTag::None || input == FormatTag::Any || output == input
}

/// Formats a stage can consume or produce: one fixed tag or a list of
/// candidates, the first being the default
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSpec {
    Single(FormatTag),
    OneOf(Vec<FormatTag>),
}

impl FormatSpec {
    /// Check if a tag is allowed by this declaration
    pub fn allows(&self, tag: FormatTag) -> bool {
        match self {
            FormatSpec::Single(single) => *single == tag,
            FormatSpec::OneOf(candidates) => candidates.contains(&tag),
        }
    }
}

impl Default for FormatSpec {
    fn default() -> Self {
        FormatSpec::Single(FormatTag::None)
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatSpec::Single(tag) => write!(f, "{}", tag),
            FormatSpec::OneOf(candidates) => {
                let names: Vec<&str> = candidates.iter().map(FormatTag::as_str).collect();
                write!(f, "[{}]", names.join(", "))
            }
        }
    }
}

impl From<FormatTag> for FormatSpec {
    fn from(tag: FormatTag) -> Self {
        FormatSpec::Single(tag)
    }
}

impl From<Vec<FormatTag>> for FormatSpec {
    fn from(candidates: Vec<FormatTag>) -> Self {
        FormatSpec::OneOf(candidates)
    }
}

impl From<&[FormatTag]> for FormatSpec {
    fn from(candidates: &[FormatTag]) -> Self {
        FormatSpec::OneOf(candidates.to_vec())
    }
}

impl<const N: usize> From<[FormatTag; N]> for FormatSpec {
    fn from(candidates: [FormatTag; N]) -> Self {
        FormatSpec::OneOf(candidates.to_vec())
    }
}
