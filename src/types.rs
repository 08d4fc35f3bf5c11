//! Core types for the Potsie pipeline
//!
//! This module defines the data structures produced by metric extraction: the
//! closed video verb vocabulary, the per-statement metric row and the time
//! ordered metrics table.

use crate::error::PotsieError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Playback speed used when a statement does not report one
pub const DEFAULT_SPEED: f64 = 1.0;

/// Playback speeds offered by video players emitting the profile
pub const SPEED_VALUES: [f64; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

/// xAPI video profile verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Completed,
    Initialized,
    Interacted,
    Paused,
    Played,
    Seeked,
    Terminated,
}

/// How a time-like result extension is read for a verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Not read, stays absent
    Skip,
    /// Read; a missing container is an error
    Required,
    /// Read; a missing container leaves the field absent
    Lenient,
}

/// How the speed extension is read for a verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedRule {
    /// Not read, the metric keeps [`DEFAULT_SPEED`]
    Default,
    /// Read, falling back to [`DEFAULT_SPEED`] when the key is absent
    Read,
}

/// Fields populated on a metric for a given verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSet {
    pub length: FieldRule,
    pub time: FieldRule,
    pub time_span: FieldRule,
    pub speed: SpeedRule,
}

impl Verb {
    pub const ALL: [Verb; 7] = [
        Verb::Completed,
        Verb::Initialized,
        Verb::Interacted,
        Verb::Paused,
        Verb::Played,
        Verb::Seeked,
        Verb::Terminated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Completed => "completed",
            Verb::Initialized => "initialized",
            Verb::Interacted => "interacted",
            Verb::Paused => "paused",
            Verb::Played => "played",
            Verb::Seeked => "seeked",
            Verb::Terminated => "terminated",
        }
    }

    /// xAPI verb IRI
    pub fn iri(&self) -> &'static str {
        match self {
            Verb::Completed => "http://adlnet.gov/expapi/verbs/completed",
            Verb::Initialized => "http://adlnet.gov/expapi/verbs/initialized",
            Verb::Interacted => "http://adlnet.gov/expapi/verbs/interacted",
            Verb::Paused => "https://w3id.org/xapi/video/verbs/paused",
            Verb::Played => "https://w3id.org/xapi/video/verbs/played",
            Verb::Seeked => "https://w3id.org/xapi/video/verbs/seeked",
            Verb::Terminated => "http://adlnet.gov/expapi/verbs/terminated",
        }
    }

    /// Metric fields extracted for this verb
    pub fn fields(&self) -> FieldSet {
        use FieldRule::{Lenient, Required, Skip};

        let (length, time, time_span, speed) = match self {
            Verb::Completed => (Required, Required, Skip, SpeedRule::Default),
            Verb::Initialized => (Required, Skip, Skip, SpeedRule::Read),
            Verb::Interacted => (Skip, Lenient, Skip, SpeedRule::Read),
            Verb::Paused => (Required, Required, Skip, SpeedRule::Default),
            Verb::Played => (Skip, Required, Skip, SpeedRule::Default),
            Verb::Seeked => (Skip, Skip, Required, SpeedRule::Default),
            Verb::Terminated => (Required, Required, Skip, SpeedRule::Default),
        };

        FieldSet {
            length,
            time,
            time_span,
            speed,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown video verb '{}'", s))
    }
}

/// Metrics extracted from a single xAPI video statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetric {
    #[serde(rename = "_id")]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub verb: Verb,
    pub actor: String,
    pub object_id: String,
    pub length: Option<f64>,
    pub speed: f64,
    pub time: Option<f64>,
    pub time_from: Option<f64>,
    pub time_to: Option<f64>,
}

/// Columns of the metrics table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricColumn {
    Id,
    Timestamp,
    Verb,
    Actor,
    ObjectId,
    Length,
    Speed,
    Time,
    TimeFrom,
    TimeTo,
}

/// Hashable cell value, used to compare rows on a column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Bit pattern of a float value
    Number(u64),
    Absent,
}

impl MetricColumn {
    pub const ALL: [MetricColumn; 10] = [
        MetricColumn::Id,
        MetricColumn::Timestamp,
        MetricColumn::Verb,
        MetricColumn::Actor,
        MetricColumn::ObjectId,
        MetricColumn::Length,
        MetricColumn::Speed,
        MetricColumn::Time,
        MetricColumn::TimeFrom,
        MetricColumn::TimeTo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricColumn::Id => "_id",
            MetricColumn::Timestamp => "timestamp",
            MetricColumn::Verb => "verb",
            MetricColumn::Actor => "actor",
            MetricColumn::ObjectId => "object_id",
            MetricColumn::Length => "length",
            MetricColumn::Speed => "speed",
            MetricColumn::Time => "time",
            MetricColumn::TimeFrom => "time_from",
            MetricColumn::TimeTo => "time_to",
        }
    }
}

impl FromStr for MetricColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = if s == "id" { "_id" } else { s };
        MetricColumn::ALL
            .iter()
            .find(|c| c.name() == s)
            .copied()
            .ok_or_else(|| format!("unknown metrics column '{}'", s))
    }
}

impl VideoMetric {
    /// Numeric value of a column, if the column is numeric and populated
    pub fn number(&self, column: MetricColumn) -> Option<f64> {
        match column {
            MetricColumn::Length => self.length,
            MetricColumn::Speed => Some(self.speed),
            MetricColumn::Time => self.time,
            MetricColumn::TimeFrom => self.time_from,
            MetricColumn::TimeTo => self.time_to,
            _ => None,
        }
    }

    pub fn key(&self, column: MetricColumn) -> CellKey {
        // -0.0 and 0.0 are the same cell
        let number = |v: Option<f64>| {
            v.map_or(CellKey::Absent, |n| {
                CellKey::Number((if n == 0.0 { 0.0f64 } else { n }).to_bits())
            })
        };

        match column {
            MetricColumn::Id => CellKey::Text(self.id.clone()),
            MetricColumn::Timestamp => CellKey::Timestamp(self.timestamp),
            MetricColumn::Verb => CellKey::Text(self.verb.as_str().to_string()),
            MetricColumn::Actor => CellKey::Text(self.actor.clone()),
            MetricColumn::ObjectId => CellKey::Text(self.object_id.clone()),
            other => number(self.number(other)),
        }
    }

    /// Cell rendered as text, empty when absent
    pub fn cell(&self, column: MetricColumn) -> String {
        match column {
            MetricColumn::Id => self.id.clone(),
            MetricColumn::Timestamp => self.timestamp.to_rfc3339(),
            MetricColumn::Verb => self.verb.to_string(),
            MetricColumn::Actor => self.actor.clone(),
            MetricColumn::ObjectId => self.object_id.clone(),
            other => self.number(other).map(|n| n.to_string()).unwrap_or_default(),
        }
    }
}

/// Time ordered collection of video metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsTable {
    rows: Vec<VideoMetric>,
}

impl MetricsTable {
    /// Build a table, sorting rows by timestamp.
    ///
    /// The sort is stable: rows sharing a timestamp keep their input order.
    pub fn new(mut rows: Vec<VideoMetric>) -> Self {
        rows.sort_by_key(|m| m.timestamp);
        MetricsTable { rows }
    }

    pub fn rows(&self) -> &[VideoMetric] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<VideoMetric> {
        self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VideoMetric> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serialize as newline-delimited JSON, one row per line
    pub fn to_ndjson(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for row in &self.rows {
            out.push_str(&serde_json::to_string(row)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Render as comma separated values with a header line
    pub fn to_csv(&self) -> Result<String, PotsieError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(MetricColumn::ALL.iter().map(|c| c.name()))?;

        for row in &self.rows {
            wtr.write_record(MetricColumn::ALL.iter().map(|c| row.cell(*c)))?;
        }

        let bytes = wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl<'a> IntoIterator for &'a MetricsTable {
    type Item = &'a VideoMetric;
    type IntoIter = std::slice::Iter<'a, VideoMetric>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
