//! Metric extraction
//!
//! Converts raw LRS records into a time ordered [`MetricsTable`]. Which fields
//! are read for a statement is decided by the verb's [`FieldSet`]; adding a
//! verb only means extending [`Verb::fields`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::RecordParsingError;
use crate::schema::{RawRecord, Statement, VideoRecord};
use crate::types::{FieldRule, FieldSet, MetricsTable, SpeedRule, Verb, VideoMetric, DEFAULT_SPEED};

/// Extract video metrics from LRS records.
///
/// The whole batch fails on the first record that cannot be parsed.
pub fn extract_metrics(records: &[RawRecord]) -> Result<MetricsTable, RecordParsingError> {
    let rows = records
        .iter()
        .map(extract_metric)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(rows = rows.len(), "extracted video metrics");

    Ok(MetricsTable::new(rows))
}

/// Extract the metric row for a single record
pub fn extract_metric(raw: &RawRecord) -> Result<VideoMetric, RecordParsingError> {
    let record = VideoRecord::from_raw(raw)?;
    let statement = record.statement();

    let verb: Verb = statement.verb.parse().map_err(|_| {
        let err = RecordParsingError::UnsupportedVerb {
            verb: statement.verb.clone(),
            id: statement.display_id(),
        };
        tracing::warn!("{}", err);
        err
    })?;

    let mut metric = VideoMetric {
        id: record.id().to_string(),
        timestamp: parse_timestamp(statement)?,
        verb,
        actor: statement
            .actor
            .as_ref()
            .and_then(|a| a.name())
            .ok_or_else(|| statement.missing_field("actor"))?
            .to_string(),
        object_id: statement
            .object
            .as_ref()
            .and_then(|o| o.id.as_deref())
            .ok_or_else(|| statement.missing_field("object id"))?
            .to_string(),
        length: None,
        speed: DEFAULT_SPEED,
        time: None,
        time_from: None,
        time_to: None,
    };

    apply_fields(&mut metric, &record, verb.fields())?;

    Ok(metric)
}

fn apply_fields(
    metric: &mut VideoMetric,
    record: &VideoRecord,
    fields: FieldSet,
) -> Result<(), RecordParsingError> {
    metric.length = read(fields.length, || record.length())?;
    metric.time = read(fields.time, || record.time())?;
    metric.time_from = read(fields.time_span, || record.time_from())?;
    metric.time_to = read(fields.time_span, || record.time_to())?;

    if fields.speed == SpeedRule::Read {
        metric.speed = record.speed()?.unwrap_or(DEFAULT_SPEED);
    }

    Ok(())
}

fn read<F>(rule: FieldRule, accessor: F) -> Result<Option<f64>, RecordParsingError>
where
    F: FnOnce() -> Result<Option<f64>, RecordParsingError>,
{
    match rule {
        FieldRule::Skip => Ok(None),
        FieldRule::Required => accessor(),
        // Legacy producers omit the whole result block here
        FieldRule::Lenient => match accessor() {
            Err(RecordParsingError::MissingContainer { .. }) => Ok(None),
            other => other,
        },
    }
}

fn parse_timestamp(statement: &Statement) -> Result<DateTime<Utc>, RecordParsingError> {
    let raw = statement
        .timestamp
        .as_deref()
        .ok_or_else(|| statement.missing_field("timestamp"))?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    // Naive timestamps are stored as UTC by the LRS
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| statement.invalid_field("timestamp", &Value::String(raw.to_string())))
}
