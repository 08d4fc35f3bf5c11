//! xAPI video profile records
//!
//! Reference: https://liveaspankaj.gitbooks.io/xapi-video-profile/statement_data_model.html

use serde_json::Value;

use crate::error::RecordParsingError;
use crate::schema::statement::{Extensions, RawRecord, Record, Statement};

/// Video length in seconds (context extension)
pub const EXTENSION_LENGTH: &str = "https://w3id.org/xapi/video/extensions/length";
/// Playhead position in seconds (result extension)
pub const EXTENSION_TIME: &str = "https://w3id.org/xapi/video/extensions/time";
/// Seek origin in seconds (result extension)
pub const EXTENSION_TIME_FROM: &str = "https://w3id.org/xapi/video/extensions/time-from";
/// Seek destination in seconds (result extension)
pub const EXTENSION_TIME_TO: &str = "https://w3id.org/xapi/video/extensions/time-to";
/// Playback speed, encoded as `"<factor>x"` (context extension)
pub const EXTENSION_SPEED: &str = "https://w3id.org/xapi/video/extensions/speed";

/// LRS record following the xAPI video statement data model
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRecord {
    record: Record,
}

impl VideoRecord {
    pub fn from_raw(raw: &RawRecord) -> Result<Self, RecordParsingError> {
        Ok(VideoRecord {
            record: Record::from_raw(raw)?,
        })
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn statement(&self) -> &Statement {
        &self.record.statement
    }

    pub fn length(&self) -> Result<Option<f64>, RecordParsingError> {
        let extensions = self.statement().context_extensions()?;
        self.number(extensions, EXTENSION_LENGTH, "length")
    }

    pub fn time(&self) -> Result<Option<f64>, RecordParsingError> {
        let extensions = self.statement().result_extensions()?;
        self.number(extensions, EXTENSION_TIME, "time")
    }

    pub fn time_from(&self) -> Result<Option<f64>, RecordParsingError> {
        let extensions = self.statement().result_extensions()?;
        self.number(extensions, EXTENSION_TIME_FROM, "time-from")
    }

    pub fn time_to(&self) -> Result<Option<f64>, RecordParsingError> {
        let extensions = self.statement().result_extensions()?;
        self.number(extensions, EXTENSION_TIME_TO, "time-to")
    }

    /// Playback speed: the `λx` string is returned as `λ`
    pub fn speed(&self) -> Result<Option<f64>, RecordParsingError> {
        let extensions = self.statement().context_extensions()?;
        let Some(value) = extensions.get(EXTENSION_SPEED) else {
            return Ok(None);
        };
        match value {
            Value::Null => Ok(None),
            Value::String(s) => parse_speed(s)
                .map(Some)
                .ok_or_else(|| self.statement().invalid_field("speed", value)),
            Value::Number(n) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.statement().invalid_field("speed", value)),
            _ => Err(self.statement().invalid_field("speed", value)),
        }
    }

    fn number(
        &self,
        extensions: &Extensions,
        key: &str,
        field: &'static str,
    ) -> Result<Option<f64>, RecordParsingError> {
        match extensions.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(value @ Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.statement().invalid_field(field, value)),
            Some(value) => Err(self.statement().invalid_field(field, value)),
        }
    }
}

/// Parse a `"1.5x"` style speed string
pub fn parse_speed(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    trimmed.trim_end_matches('x').parse::<f64>().ok()
}
