use serde::Deserialize;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A label identifier as found in the voxel data.
///
/// Label maps are expected to hold integers, but values are kept as read so
/// interpolated maps still report every distinct value. Ordering is numeric.
#[derive(Clone, Copy, Debug)]
pub struct LabelId(f64);

impl LabelId {
    pub fn new(value: f64) -> Self {
        // -0.0 and 0.0 must hash the same
        Self(if value == 0.0 { 0.0 } else { value })
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// The id as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        let v = self.0;
        (v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64).then_some(v as i64)
    }
}

impl From<i32> for LabelId {
    fn from(value: i32) -> Self {
        Self::new(value as f64)
    }
}

impl From<i64> for LabelId {
    fn from(value: i64) -> Self {
        Self::new(value as f64)
    }
}

impl PartialEq for LabelId {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for LabelId {}

impl PartialOrd for LabelId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LabelId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for LabelId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_integer() {
            Some(id) => write!(f, "{id}"),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for LabelId {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<f64>().map(Self::new)
    }
}

impl Serialize for LabelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LabelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LabelIdVisitor;

        impl Visitor<'_> for LabelIdVisitor {
            type Value = LabelId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a numeric label id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<LabelId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(LabelIdVisitor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, Deserialize)]
pub struct LabelStats {
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_normalized: Option<f64>,
}

/// Volume statistics keyed by label id, kept in ascending id order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeReport {
    labels: BTreeMap<LabelId, LabelStats>,
}

impl VolumeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: impl Into<LabelId>) -> Option<&LabelStats> {
        self.labels.get(&label.into())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, LabelId, LabelStats> {
        self.labels.iter()
    }

    pub fn total_volume(&self) -> f64 {
        self.labels.values().map(|stats| stats.volume).sum()
    }

    /// Serialize as a JSON object indented with four spaces.
    pub fn to_json(&self) -> Result<String, ReportError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8(buf)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let mut json = self.to_json()?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a VolumeReport {
    type Item = (&'a LabelId, &'a LabelStats);
    type IntoIter = btree_map::Iter<'a, LabelId, LabelStats>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}

impl FromIterator<(LabelId, LabelStats)> for VolumeReport {
    fn from_iter<I: IntoIterator<Item = (LabelId, LabelStats)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}
