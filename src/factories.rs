//! Synthetic xAPI video records
//!
//! Produces LRS records with the same shape as the ones fetched from a real
//! LRS, for demos and tests. Values are drawn from an injectable RNG so a
//! seeded generator yields reproducible batches.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Map, Value};

use crate::schema::video::{
    EXTENSION_LENGTH, EXTENSION_SPEED, EXTENSION_TIME, EXTENSION_TIME_FROM, EXTENSION_TIME_TO,
};
use crate::schema::RawRecord;
use crate::types::{Verb, DEFAULT_SPEED, SPEED_VALUES};

/// Builder for batches of synthetic video records
#[derive(Debug, Clone)]
pub struct VideoRecordFactory {
    /// Earliest statement timestamp
    pub start: DateTime<Utc>,
    /// Latest statement timestamp
    pub end: DateTime<Utc>,
    /// Fixed verb for every record; random when `None`
    pub verb: Option<Verb>,
    /// Video object id (`uuid://...`); random per record when `None`
    pub object_id: Option<String>,
    /// Pool of learners; a random one is picked per record
    pub actors: usize,
    /// Share of `interacted` statements emitted without a result block
    pub legacy_interacted_ratio: f64,
}

impl Default for VideoRecordFactory {
    fn default() -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(365),
            end,
            verb: None,
            object_id: None,
            actors: 20,
            legacy_interacted_ratio: 0.0,
        }
    }
}

impl VideoRecordFactory {
    pub fn with_verb(mut self, verb: Verb) -> Self {
        self.verb = Some(verb);
        self
    }

    pub fn with_object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn with_period(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Generate `count` records
    pub fn build<R: Rng>(&self, rng: &mut R, count: usize) -> Vec<RawRecord> {
        let actors: Vec<String> = (0..self.actors.max(1)).map(|_| random_hex(rng, 20)).collect();
        (0..count).map(|_| self.build_one(rng, &actors)).collect()
    }

    fn build_one<R: Rng>(&self, rng: &mut R, actors: &[String]) -> RawRecord {
        let verb = self
            .verb
            .unwrap_or_else(|| *Verb::ALL.choose(rng).unwrap_or(&Verb::Played));
        let object_id = self
            .object_id
            .clone()
            .unwrap_or_else(|| format!("uuid://{}", random_uuid(rng)));
        let actor = actors.choose(rng).cloned().unwrap_or_default();

        let span = (self.end - self.start).num_seconds().max(0);
        let timestamp = self.start + Duration::seconds(rng.gen_range(0..=span));

        let length: f64 = round3(rng.gen_range(120.0..900.0));
        let mut context = Map::new();
        let mut result = Map::new();

        match verb {
            Verb::Initialized => {
                context.insert(EXTENSION_LENGTH.to_string(), json!(length));
                context.insert(EXTENSION_SPEED.to_string(), json!(speed_string(DEFAULT_SPEED)));
            }
            Verb::Played => {
                result.insert(EXTENSION_TIME.to_string(), json!(fraction(rng, 0.0, 0.6) * length));
            }
            Verb::Paused => {
                context.insert(EXTENSION_LENGTH.to_string(), json!(length));
                result.insert(EXTENSION_TIME.to_string(), json!(fraction(rng, 0.1, 0.9) * length));
            }
            Verb::Seeked => {
                result.insert(EXTENSION_TIME_FROM.to_string(), json!(fraction(rng, 0.0, 0.8) * length));
                result.insert(EXTENSION_TIME_TO.to_string(), json!(fraction(rng, 0.0, 0.5) * length));
            }
            Verb::Interacted => {
                let speed = if rng.gen_bool(0.5) {
                    DEFAULT_SPEED
                } else {
                    let others: Vec<f64> = SPEED_VALUES
                        .iter()
                        .copied()
                        .filter(|s| *s != DEFAULT_SPEED)
                        .collect();
                    others.choose(rng).copied().unwrap_or(DEFAULT_SPEED)
                };
                context.insert(EXTENSION_SPEED.to_string(), json!(speed_string(speed)));
                result.insert(EXTENSION_TIME.to_string(), json!(fraction(rng, 0.0, 0.6) * length));
            }
            Verb::Completed => {
                context.insert(EXTENSION_LENGTH.to_string(), json!(length));
                result.insert(EXTENSION_TIME.to_string(), json!(length));
            }
            Verb::Terminated => {
                context.insert(EXTENSION_LENGTH.to_string(), json!(length));
                result.insert(EXTENSION_TIME.to_string(), json!(fraction(rng, 0.5, 1.0) * length));
            }
        }

        let mut statement = json!({
            "id": random_uuid(rng),
            "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "verb": {
                "id": verb.iri(),
                "display": { "en-US": verb.as_str() }
            },
            "actor": {
                "objectType": "Agent",
                "account": { "name": actor, "homePage": "http://lms.example.org" }
            },
            "object": {
                "id": object_id,
                "definition": { "type": "https://w3id.org/xapi/video/activity-type/video" }
            },
            "context": { "extensions": Value::Object(context) }
        });

        let legacy = verb == Verb::Interacted && rng.gen_bool(self.legacy_interacted_ratio.clamp(0.0, 1.0));
        if !legacy && !result.is_empty() {
            statement["result"] = json!({ "extensions": Value::Object(result) });
        }

        RawRecord::new(random_hex(rng, 12), statement)
    }
}

fn fraction<R: Rng>(rng: &mut R, low: f64, high: f64) -> f64 {
    round3(rng.gen_range(low..high))
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn speed_string(speed: f64) -> String {
    format!("{}x", speed)
}

fn random_uuid<R: Rng>(rng: &mut R) -> uuid::Uuid {
    uuid::Builder::from_random_bytes(rng.gen()).into_uuid()
}

fn random_hex<R: Rng>(rng: &mut R, bytes: usize) -> String {
    (0..bytes).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_metrics;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn factory() -> VideoRecordFactory {
        VideoRecordFactory::default().with_period(
            "2021-01-01T00:00:00Z".parse().unwrap(),
            "2021-12-31T00:00:00Z".parse().unwrap(),
        )
    }

    #[test]
    fn test_generated_records_extract() {
        let mut rng = StdRng::seed_from_u64(42);
        let records = factory().build(&mut rng, 200);
        let table = extract_metrics(&records).unwrap();

        assert_eq!(table.len(), 200);
        for metric in &table {
            let fields = metric.verb.fields();
            assert_eq!(metric.length.is_some(), fields.length != crate::types::FieldRule::Skip);
            assert_eq!(metric.time_from.is_some(), metric.verb == Verb::Seeked);
            assert!(SPEED_VALUES.contains(&metric.speed));
        }
    }

    #[test]
    fn test_seeded_batches_are_reproducible() {
        let first = factory().build(&mut StdRng::seed_from_u64(7), 10);
        let second = factory().build(&mut StdRng::seed_from_u64(7), 10);

        assert_eq!(first, second);
    }

    #[test]
    fn test_fixed_verb_and_object() {
        let mut rng = StdRng::seed_from_u64(1);
        let records = factory()
            .with_verb(Verb::Paused)
            .with_object_id("uuid://video-1")
            .build(&mut rng, 5);
        let table = extract_metrics(&records).unwrap();

        assert!(table.iter().all(|m| m.verb == Verb::Paused));
        assert!(table.iter().all(|m| m.object_id == "uuid://video-1"));
    }

    #[test]
    fn test_legacy_interacted_statements() {
        let mut factory = factory().with_verb(Verb::Interacted);
        factory.legacy_interacted_ratio = 1.0;
        let records = factory.build(&mut StdRng::seed_from_u64(3), 5);

        assert!(records.iter().all(|r| r.statement.get("result").is_none()));
        let table = extract_metrics(&records).unwrap();
        assert!(table.iter().all(|m| m.time.is_none()));
    }
}
