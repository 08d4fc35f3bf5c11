//! Selection and aggregation helpers
//!
//! Filters metrics for a verb (optionally keeping one row per actor) and
//! counts rows per bucket, either over calendar time or over a timecode
//! column of the video.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::types::{MetricColumn, MetricsTable, Verb, VideoMetric};

/// Calendar period used to bucket metrics timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    Hourly,
    #[default]
    Daily,
    /// Weeks start on Monday
    Weekly,
    Monthly,
}

impl Period {
    /// Start of the period containing `ts`
    pub fn floor(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let start = match self {
            Period::Hourly => return day_start(date) + Duration::hours(ts.hour() as i64),
            Period::Daily => date,
            Period::Weekly => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            Period::Monthly => date.with_day(1).unwrap_or(date),
        };
        day_start(start)
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Grouping applied by [`distribution`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupBy {
    /// Bucket rows by calendar period of their timestamp
    Calendar(Period),
    /// Bucket rows by a numeric column rounded to `resolution` seconds
    Timecode {
        column: MetricColumn,
        resolution: f64,
    },
}

impl Default for GroupBy {
    fn default() -> Self {
        GroupBy::Calendar(Period::Daily)
    }
}

impl GroupBy {
    /// Timecode grouping rounding to whole seconds
    pub fn timecode(column: MetricColumn) -> Self {
        GroupBy::Timecode {
            column,
            resolution: 1.0,
        }
    }

    /// Bucket of a row, `None` when the grouped column is absent
    pub fn bucket(&self, metric: &VideoMetric) -> Option<BucketKey> {
        match self {
            GroupBy::Calendar(period) => Some(BucketKey::Period(period.floor(metric.timestamp))),
            GroupBy::Timecode { column, resolution } => {
                let value = metric.number(*column)?;
                let step = if *resolution > 0.0 { *resolution } else { 1.0 };
                let index = (value / step).round_ties_even() as i64;
                Some(BucketKey::Timecode(TimecodeBucket { index, step_ms: (step * 1000.0).round() as i64 }))
            }
        }
    }
}

/// Timecode bucket: `index` multiples of the bucket width
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimecodeBucket {
    pub index: i64,
    pub step_ms: i64,
}

impl TimecodeBucket {
    /// Lower bound of the bucket, in seconds
    pub fn seconds(&self) -> f64 {
        (self.index * self.step_ms) as f64 / 1000.0
    }
}

/// Key of a distribution bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum BucketKey {
    Period(DateTime<Utc>),
    Timecode(#[serde(serialize_with = "serialize_timecode")] TimecodeBucket),
}

fn serialize_timecode<S: serde::Serializer>(
    bucket: &TimecodeBucket,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(bucket.seconds())
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketKey::Period(ts) => write!(f, "{}", ts.to_rfc3339()),
            BucketKey::Timecode(bucket) => write!(f, "{}", bucket.seconds()),
        }
    }
}

/// Select metrics for a verb.
///
/// With `unique`, only the first row (in table order) for each distinct value
/// of `unique_by` is kept. Otherwise every matching row is returned.
pub fn select_for_verb(
    table: &MetricsTable,
    verb: Verb,
    unique: bool,
    unique_by: MetricColumn,
) -> Vec<&VideoMetric> {
    let matching = table.iter().filter(|m| m.verb == verb);

    if !unique {
        return matching.collect();
    }

    let mut seen = HashSet::new();
    matching.filter(|m| seen.insert(m.key(unique_by))).collect()
}

/// Count metrics for a verb per bucket, keys in ascending order.
///
/// When `unique` is set, rows are first deduplicated by actor.
pub fn distribution(
    table: &MetricsTable,
    verb: Verb,
    group_by: GroupBy,
    unique: bool,
) -> BTreeMap<BucketKey, usize> {
    distribution_by(table, verb, unique, |m| group_by.bucket(m))
}

/// Count metrics for a verb per bucket computed by `key_fn`.
///
/// Rows for which `key_fn` returns `None` are not counted.
pub fn distribution_by<K, F>(
    table: &MetricsTable,
    verb: Verb,
    unique: bool,
    key_fn: F,
) -> BTreeMap<K, usize>
where
    K: Ord,
    F: Fn(&VideoMetric) -> Option<K>,
{
    let mut counts = BTreeMap::new();
    for metric in select_for_verb(table, verb, unique, MetricColumn::Actor) {
        if let Some(key) = key_fn(metric) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_SPEED;
    use pretty_assertions::assert_eq;

    fn metric(id: &str, timestamp: &str, verb: Verb, actor: &str, time: Option<f64>) -> VideoMetric {
        VideoMetric {
            id: id.to_string(),
            timestamp: timestamp.parse().unwrap(),
            verb,
            actor: actor.to_string(),
            object_id: "uuid://video".to_string(),
            length: None,
            speed: DEFAULT_SPEED,
            time,
            time_from: None,
            time_to: None,
        }
    }

    fn table() -> MetricsTable {
        MetricsTable::new(vec![
            metric("1", "2021-03-01T08:00:00Z", Verb::Played, "foo", Some(10.2)),
            metric("2", "2021-03-01T09:30:00Z", Verb::Played, "foo", Some(10.7)),
            metric("3", "2021-03-02T10:00:00Z", Verb::Played, "bar", Some(11.4)),
            metric("4", "2021-03-02T11:00:00Z", Verb::Paused, "bar", Some(12.0)),
            metric("5", "2021-03-09T11:00:00Z", Verb::Played, "baz", None),
        ])
    }

    fn ids(rows: &[&VideoMetric]) -> Vec<String> {
        rows.iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn test_select_unique_by_actor() {
        let table = table();
        let selected = select_for_verb(&table, Verb::Played, true, MetricColumn::Actor);

        assert_eq!(ids(&selected), vec!["1", "3", "5"]);
    }

    #[test]
    fn test_select_two_played_from_foo_one_from_bar() {
        let table = MetricsTable::new(vec![
            metric("a", "2021-03-01T08:00:00Z", Verb::Played, "foo", Some(1.0)),
            metric("b", "2021-03-01T08:01:00Z", Verb::Played, "foo", Some(2.0)),
            metric("c", "2021-03-01T08:02:00Z", Verb::Played, "bar", Some(3.0)),
        ]);
        let selected = select_for_verb(&table, Verb::Played, true, MetricColumn::Actor);

        assert_eq!(ids(&selected), vec!["a", "c"]);
    }

    #[test]
    fn test_select_all() {
        let table = table();
        let selected = select_for_verb(&table, Verb::Played, false, MetricColumn::Actor);

        assert_eq!(ids(&selected), vec!["1", "2", "3", "5"]);
    }

    #[test]
    fn test_select_unique_by_other_column() {
        let table = table();
        let selected = select_for_verb(&table, Verb::Played, true, MetricColumn::ObjectId);

        assert_eq!(ids(&selected), vec!["1"]);
    }

    #[test]
    fn test_daily_distribution() {
        let table = table();
        let dist = distribution(&table, Verb::Played, GroupBy::default(), false);
        let counts: Vec<(String, usize)> = dist.iter().map(|(k, v)| (k.to_string(), *v)).collect();

        assert_eq!(
            counts,
            vec![
                ("2021-03-01T00:00:00+00:00".to_string(), 2),
                ("2021-03-02T00:00:00+00:00".to_string(), 1),
                ("2021-03-09T00:00:00+00:00".to_string(), 1),
            ]
        );

        let unique = distribution(&table, Verb::Played, GroupBy::default(), true);
        assert_eq!(unique.values().copied().collect::<Vec<_>>(), vec![1, 1, 1]);
    }

    #[test]
    fn test_weekly_and_monthly_floor() {
        let ts: DateTime<Utc> = "2021-03-10T17:45:00Z".parse().unwrap();

        assert_eq!(Period::Hourly.floor(ts).to_rfc3339(), "2021-03-10T17:00:00+00:00");
        assert_eq!(Period::Weekly.floor(ts).to_rfc3339(), "2021-03-08T00:00:00+00:00");
        assert_eq!(Period::Monthly.floor(ts).to_rfc3339(), "2021-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_timecode_distribution() {
        let table = table();
        let dist = distribution(&table, Verb::Played, GroupBy::timecode(MetricColumn::Time), false);
        let counts: Vec<(f64, usize)> = dist
            .iter()
            .map(|(k, v)| match k {
                BucketKey::Timecode(bucket) => (bucket.seconds(), *v),
                BucketKey::Period(_) => unreachable!(),
            })
            .collect();

        // 10.2 -> 10, 10.7 -> 11, 11.4 -> 11; the row without time is skipped
        assert_eq!(counts, vec![(10.0, 1), (11.0, 2)]);
    }

    #[test]
    fn test_custom_distribution() {
        let table = table();
        let dist = distribution_by(&table, Verb::Played, false, |m| Some(m.actor.clone()));

        assert_eq!(dist.get("foo"), Some(&2));
        assert_eq!(dist.get("bar"), Some(&1));
        assert_eq!(dist.keys().next().map(String::as_str), Some("bar"));
    }

    #[test]
    fn test_timecode_halves_round_to_even() {
        let table = MetricsTable::new(vec![
            metric("1", "2021-03-01T08:00:00Z", Verb::Played, "foo", Some(10.5)),
            metric("2", "2021-03-01T09:00:00Z", Verb::Played, "foo", Some(0.5)),
            metric("3", "2021-03-01T10:00:00Z", Verb::Played, "foo", Some(148.5)),
        ]);
        let dist = distribution(&table, Verb::Played, GroupBy::timecode(MetricColumn::Time), false);
        let buckets: Vec<String> = dist.keys().map(|k| k.to_string()).collect();

        assert_eq!(buckets, vec!["0", "10", "148"]);
    }
}
