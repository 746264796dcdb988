//! Hypotheses-graph model and tracking result as read from JSON
//!
//! Only the parts the merger resolver consumes are modeled; everything else
//! in the files is ignored during deserialization.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::types::UniqueId;

/// Identifier as it appears in JSON: either a number or a numeric string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    /// Parse into a unique id
    pub fn parse(&self) -> Result<UniqueId, ResolveError> {
        match self {
            RawId::Number(n) => Ok(*n),
            RawId::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| ResolveError::malformed(format!("id '{}' is not an integer", s))),
        }
    }
}

impl From<u64> for RawId {
    fn from(n: u64) -> Self {
        RawId::Number(n)
    }
}

/// Value of a result entry
///
/// Solvers write booleans for divisions and counts for detections and
/// links; both are accepted everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
}

impl ResultValue {
    /// Numeric interpretation (`true` is 1)
    pub fn as_f64(&self) -> f64 {
        match *self {
            ResultValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            ResultValue::Integer(i) => i as f64,
            ResultValue::Float(x) => x,
        }
    }

    /// Whether the entry is active (`value > 0`)
    #[inline]
    pub fn is_active(&self) -> bool {
        self.as_f64() > 0.0
    }

    /// Whether the value equals `true` (numeric 1 compares equal)
    #[inline]
    pub fn is_true(&self) -> bool {
        self.as_f64() == 1.0
    }

    /// Object count of a detection; `None` unless the value is a whole
    /// number in `0..=u32::MAX`
    #[inline]
    pub fn count(&self) -> Option<u32> {
        let v = self.as_f64();
        if v.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&v) {
            return None;
        }
        Some(v as u32)
    }
}

/// One record of a result section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultEntry {
    /// Unique id of a detection or division
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RawId>,
    /// Source unique id of a link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<RawId>,
    /// Destination unique id of a link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<RawId>,
    /// Solver decision
    pub value: ResultValue,
}

impl ResultEntry {
    /// Detection or division record
    pub fn node(id: UniqueId, value: ResultValue) -> Self {
        Self {
            id: Some(id.into()),
            src: None,
            dest: None,
            value,
        }
    }

    /// Link record
    pub fn link(src: UniqueId, dest: UniqueId, value: ResultValue) -> Self {
        Self {
            id: None,
            src: Some(src.into()),
            dest: Some(dest.into()),
            value,
        }
    }

    /// Parsed `id` field
    pub fn id(&self) -> Result<UniqueId, ResolveError> {
        self.id
            .as_ref()
            .ok_or_else(|| ResolveError::malformed("result entry without 'id'"))?
            .parse()
    }

    /// Parsed `src` and `dest` fields
    pub fn endpoints(&self) -> Result<(UniqueId, UniqueId), ResolveError> {
        let src = self
            .src
            .as_ref()
            .ok_or_else(|| ResolveError::malformed("link entry without 'src'"))?
            .parse()?;
        let dest = self
            .dest
            .as_ref()
            .ok_or_else(|| ResolveError::malformed("link entry without 'dest'"))?
            .parse()?;
        Ok((src, dest))
    }
}

/// Hypotheses graph, reduced to the traxel/unique-id table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HypothesesModel {
    /// `timestep -> (local index -> unique id)`, keys as JSON strings
    #[serde(rename = "traxelToUniqueId")]
    pub traxel_to_unique_id: BTreeMap<String, BTreeMap<String, RawId>>,
}

/// Solver output
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingResult {
    #[serde(default)]
    pub detection_results: Option<Vec<ResultEntry>>,
    #[serde(default)]
    pub linking_results: Option<Vec<ResultEntry>>,
    #[serde(default)]
    pub division_results: Option<Vec<ResultEntry>>,
}

impl HypothesesModel {
    /// Parse from a JSON string
    pub fn from_json_str(text: &str) -> Result<Self, ResolveError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl TrackingResult {
    /// Parse from a JSON string
    pub fn from_json_str(text: &str) -> Result<Self, ResolveError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Whether division decisions are present
    #[inline]
    pub fn has_divisions(&self) -> bool {
        self.division_results.is_some()
    }
}

fn read_file(path: &Path) -> Result<String, ResolveError> {
    fs::read_to_string(path).map_err(|e| ResolveError::Io {
        path: path.display().to_string(),
        description: e.to_string(),
    })
}

/// Load a hypotheses model from a JSON file
pub fn load_model(path: impl AsRef<Path>) -> Result<HypothesesModel, ResolveError> {
    HypothesesModel::from_json_str(&read_file(path.as_ref())?)
}

/// Load a tracking result from a JSON file
pub fn load_result(path: impl AsRef<Path>) -> Result<TrackingResult, ResolveError> {
    TrackingResult::from_json_str(&read_file(path.as_ref())?)
}
