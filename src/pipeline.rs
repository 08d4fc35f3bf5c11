//! Pipeline orchestration
//!
//! This module provides the public entry points of Potsie, from raw LRS
//! records (as JSON or fetched through an [`LrsClient`]) to a metrics table.

use crate::error::PotsieError;
use crate::extract::extract_metrics;
use crate::lrs::{LrsClient, LrsTransport};
use crate::schema::RawRecord;
use crate::types::MetricsTable;

/// Input layout of raw records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

/// Parse a JSON array of LRS records
pub fn parse_records_array(json: &str) -> Result<Vec<RawRecord>, PotsieError> {
    Ok(serde_json::from_str(json)?)
}

/// Parse NDJSON (newline-delimited JSON) containing LRS records
pub fn parse_records_ndjson(ndjson: &str) -> Result<Vec<RawRecord>, PotsieError> {
    let mut records = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str::<RawRecord>(trimmed).map_err(|e| {
            PotsieError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Parse raw records in the given layout
pub fn parse_records(input: &str, format: RecordFormat) -> Result<Vec<RawRecord>, PotsieError> {
    match format {
        RecordFormat::Ndjson => parse_records_ndjson(input),
        RecordFormat::Json => parse_records_array(input),
    }
}

/// Convert a raw JSON payload of LRS records to a metrics table.
///
/// # Example
/// ```ignore
/// let table = records_to_metrics(lrs_json, RecordFormat::Json)?;
/// ```
pub fn records_to_metrics(input: &str, format: RecordFormat) -> Result<MetricsTable, PotsieError> {
    let records = parse_records(input, format)?;
    Ok(extract_metrics(&records)?)
}

/// Query video statements from the LRS and convert them to metrics.
///
/// LRS failures surface as [`PotsieError::Api`], parsing failures as
/// [`PotsieError::Parsing`].
pub fn metrics_for_video_id<T: LrsTransport>(
    client: &LrsClient<T>,
    video_id: &str,
) -> Result<MetricsTable, PotsieError> {
    let records = client.records_for_object_id(video_id)?;
    tracing::info!(video_id, records = records.len(), "fetched video statements");
    Ok(extract_metrics(&records)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LrsApiError;
    use crate::types::Verb;
    use serde_json::{json, Value};

    fn sample_records_json() -> &'static str {
        r#"[
            {
                "_id": "605c98315ffb2bc8a7b42aa6",
                "statement": {
                    "id": "a1",
                    "timestamp": "2021-03-25T14:06:41.153Z",
                    "verb": { "display": { "en-US": "played" } },
                    "actor": { "account": { "name": "foo" } },
                    "object": { "id": "uuid://126bd2fb-a846-cd73-2278-fedf9861560b" },
                    "result": { "extensions": { "https://w3id.org/xapi/video/extensions/time": 148.774 } }
                }
            },
            {
                "_id": "605c98315ffb2bc8a7b42aa5",
                "statement": {
                    "id": "a0",
                    "timestamp": "2021-03-25T14:05:00.000Z",
                    "verb": { "display": { "en-US": "initialized" } },
                    "actor": { "account": { "name": "foo" } },
                    "object": { "id": "uuid://126bd2fb-a846-cd73-2278-fedf9861560b" },
                    "context": { "extensions": { "https://w3id.org/xapi/video/extensions/length": 136.81 } }
                }
            }
        ]"#
    }

    struct StaticTransport(Result<Value, LrsApiError>);

    impl LrsTransport for StaticTransport {
        fn get(&self, _endpoint: &str, _params: &[(String, String)]) -> Result<Value, PotsieError> {
            self.0.clone().map_err(PotsieError::from)
        }
    }

    #[test]
    fn test_records_to_metrics() {
        let table = records_to_metrics(sample_records_json(), RecordFormat::Json).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].verb, Verb::Initialized);
        assert_eq!(table.rows()[1].time, Some(148.774));
    }

    #[test]
    fn test_ndjson_input() {
        let records: Vec<Value> = serde_json::from_str(sample_records_json()).unwrap();
        let ndjson = records
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join("\n\n");

        let table = records_to_metrics(&ndjson, RecordFormat::Ndjson).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_invalid_ndjson_line() {
        let err = records_to_metrics("{\"_id\": \"x\"}\n", RecordFormat::Ndjson).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_metrics_for_video_id() {
        let page = json!({
            "edges": serde_json::from_str::<Vec<Value>>(sample_records_json())
                .unwrap()
                .into_iter()
                .map(|node| json!({ "node": node }))
                .collect::<Vec<_>>(),
            "pageInfo": { "hasNextPage": false }
        });
        let client = LrsClient::new(StaticTransport(Ok(page)));

        let table = metrics_for_video_id(&client, "126bd2fb-a846-cd73-2278-fedf9861560b").unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_api_errors_are_not_parsing_errors() {
        let client = LrsClient::new(StaticTransport(Err(LrsApiError {
            verb: "get".to_string(),
            url: "http://lrs/statement".to_string(),
            status: 403,
            body: "forbidden".to_string(),
        })));

        let err = metrics_for_video_id(&client, "abc").unwrap_err();
        assert!(matches!(err, PotsieError::Api(LrsApiError { status: 403, .. })));
    }

    #[test]
    fn test_parsing_errors_surface() {
        let page = json!({
            "edges": [{ "node": {
                "_id": "x",
                "statement": {
                    "id": "s",
                    "timestamp": "2021-03-25T14:05:00Z",
                    "verb": { "display": { "en-US": "completed" } },
                    "actor": { "account": { "name": "foo" } },
                    "object": { "id": "uuid://v" }
                }
            } }]
        });
        let client = LrsClient::new(StaticTransport(Ok(page)));

        let err = metrics_for_video_id(&client, "v").unwrap_err();
        assert!(matches!(err, PotsieError::Parsing(_)));
        assert_eq!(err.to_string(), "Current 'completed' statement s has no context");
    }
}
