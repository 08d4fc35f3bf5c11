//! LRS records and xAPI statements
//!
//! A record fetched from the LRS wraps a single xAPI statement. Statements are
//! loosely structured: only the verb is required to build one, everything else
//! is kept as optional and checked when it is actually read.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Container, RecordParsingError};

/// URI-keyed extension mapping attached to a statement result or context
pub type Extensions = Map<String, Value>;

/// Language key used to read the verb display name
pub const VERB_DISPLAY_LANGUAGE: &str = "en-US";

/// Raw record as returned by the LRS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// LRS record identifier
    #[serde(rename = "_id")]
    pub id: String,
    /// Embedded xAPI statement (kept untyped until parsed)
    pub statement: Value,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, statement: Value) -> Self {
        RawRecord {
            id: id.into(),
            statement,
        }
    }
}

/// Statement actor account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "homePage", default, skip_serializing_if = "Option::is_none")]
    pub home_page: Option<String>,
}

/// Statement actor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
}

impl Actor {
    /// Account name identifying the learner
    pub fn name(&self) -> Option<&str> {
        self.account.as_ref().and_then(|a| a.name.as_deref())
    }
}

/// Statement object (the video activity)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Parsed view of an xAPI statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub verb: String,
    pub actor: Option<Actor>,
    pub object: Option<StatementObject>,
    result: Option<Map<String, Value>>,
    context: Option<Map<String, Value>>,
}

impl Statement {
    /// Build a statement from its JSON representation.
    ///
    /// Only `verb.display["en-US"]` is required. `result` and `context` are
    /// stored as-is and validated lazily by the extension accessors.
    pub fn from_value(value: &Value) -> Result<Self, RecordParsingError> {
        let id = value.get("id").and_then(Value::as_str).map(str::to_string);

        let verb = value
            .get("verb")
            .and_then(|v| v.get("display"))
            .and_then(|d| d.get(VERB_DISPLAY_LANGUAGE))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                let err = RecordParsingError::MissingVerb {
                    id: render_id(id.as_deref()),
                };
                tracing::warn!("{}", err);
                err
            })?
            .to_string();

        Ok(Statement {
            id,
            timestamp: value
                .get("timestamp")
                .and_then(Value::as_str)
                .map(str::to_string),
            verb,
            actor: value
                .get("actor")
                .and_then(|a| serde_json::from_value(a.clone()).ok()),
            object: value
                .get("object")
                .and_then(|o| serde_json::from_value(o.clone()).ok()),
            result: value.get("result").and_then(Value::as_object).cloned(),
            context: value.get("context").and_then(Value::as_object).cloned(),
        })
    }

    /// Statement id as rendered in error messages
    pub fn display_id(&self) -> String {
        render_id(self.id.as_deref())
    }

    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// Extensions attached to the statement result
    pub fn result_extensions(&self) -> Result<&Extensions, RecordParsingError> {
        let result = self
            .result
            .as_ref()
            .ok_or_else(|| self.missing(Container::Result))?;
        result
            .get("extensions")
            .and_then(Value::as_object)
            .ok_or_else(|| self.missing(Container::ResultExtensions))
    }

    /// Extensions attached to the statement context
    pub fn context_extensions(&self) -> Result<&Extensions, RecordParsingError> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| self.missing(Container::Context))?;
        context
            .get("extensions")
            .and_then(Value::as_object)
            .ok_or_else(|| self.missing(Container::ContextExtensions))
    }

    /// Build an error for this statement, logging it on the way out
    pub(crate) fn missing(&self, container: Container) -> RecordParsingError {
        let err = RecordParsingError::MissingContainer {
            verb: self.verb.clone(),
            id: self.display_id(),
            container,
        };
        tracing::warn!("{}", err);
        err
    }

    pub(crate) fn missing_field(&self, field: &'static str) -> RecordParsingError {
        let err = RecordParsingError::MissingField {
            verb: self.verb.clone(),
            id: self.display_id(),
            field,
        };
        tracing::warn!("{}", err);
        err
    }

    pub(crate) fn invalid_field(&self, field: &'static str, value: &Value) -> RecordParsingError {
        let err = RecordParsingError::InvalidField {
            verb: self.verb.clone(),
            id: self.display_id(),
            field,
            value: value.to_string(),
        };
        tracing::warn!("{}", err);
        err
    }
}

fn render_id(id: Option<&str>) -> String {
    id.unwrap_or("None").to_string()
}

/// An LRS record with its parsed statement
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub statement: Statement,
}

impl Record {
    pub fn from_raw(raw: &RawRecord) -> Result<Self, RecordParsingError> {
        Ok(Record {
            id: raw.id.clone(),
            statement: Statement::from_value(&raw.statement)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn initialized_statement() -> Value {
        json!({
            "id": "2140967b-563b-464b-90c0-2e114bd8e133",
            "timestamp": "2021-03-25T14:06:41.153Z",
            "verb": {
                "id": "http://adlnet.gov/expapi/verbs/initialized",
                "display": { "en-US": "initialized" }
            },
            "actor": {
                "objectType": "Agent",
                "account": { "name": "d5b3733b-ccd9-4ab1-bb29-22e3c2f2e592", "homePage": "http://lms.example.org" }
            },
            "object": { "id": "uuid://dae8acb4-3b6a-4e05-9a7c-ee08c2b8d4df" },
            "context": {
                "extensions": {
                    "https://w3id.org/xapi/video/extensions/length": 136.81
                }
            }
        })
    }

    #[test]
    fn test_statement_from_value() {
        let statement = Statement::from_value(&initialized_statement()).unwrap();

        assert_eq!(statement.verb, "initialized");
        assert_eq!(
            statement.id.as_deref(),
            Some("2140967b-563b-464b-90c0-2e114bd8e133")
        );
        assert_eq!(
            statement.actor.as_ref().and_then(|a| a.name()),
            Some("d5b3733b-ccd9-4ab1-bb29-22e3c2f2e592")
        );
        assert_eq!(
            statement.object.as_ref().and_then(|o| o.id.as_deref()),
            Some("uuid://dae8acb4-3b6a-4e05-9a7c-ee08c2b8d4df")
        );
        assert!(!statement.has_result());
        assert!(statement.has_context());
    }

    #[test]
    fn test_missing_verb_fails_construction() {
        let value = json!({ "id": "abc", "verb": { "display": { "fr-FR": "joué" } } });
        let err = Statement::from_value(&value).unwrap_err();
        assert_eq!(err, RecordParsingError::MissingVerb { id: "abc".to_string() });
    }

    #[test]
    fn test_missing_result_is_raised_lazily() {
        let statement = Statement::from_value(&initialized_statement()).unwrap();

        let err = statement.result_extensions().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Current 'initialized' statement 2140967b-563b-464b-90c0-2e114bd8e133 has no result"
        );
        assert!(statement.context_extensions().is_ok());
    }

    #[test]
    fn test_missing_extensions() {
        let value = json!({
            "id": "abc",
            "verb": { "display": { "en-US": "played" } },
            "result": {},
            "context": { "contextActivities": {} }
        });
        let statement = Statement::from_value(&value).unwrap();

        assert_eq!(
            statement.result_extensions().unwrap_err().to_string(),
            "Current 'played' statement abc has no result extensions"
        );
        assert_eq!(
            statement.context_extensions().unwrap_err().to_string(),
            "Current 'played' statement abc has no context extensions"
        );
    }

    #[test]
    fn test_statement_without_id() {
        let value = json!({ "verb": { "display": { "en-US": "paused" } } });
        let statement = Statement::from_value(&value).unwrap();

        assert_eq!(statement.id, None);
        assert_eq!(
            statement.context_extensions().unwrap_err().to_string(),
            "Current 'paused' statement None has no context"
        );
    }

    #[test]
    fn test_deserialize_raw_record() {
        let json = r#"{"_id": "605c98315ffb2bc8a7b42aa6", "statement": {"verb": {"display": {"en-US": "played"}}}}"#;
        let raw: RawRecord = serde_json::from_str(json).unwrap();
        let record = Record::from_raw(&raw).unwrap();

        assert_eq!(record.id, "605c98315ffb2bc8a7b42aa6");
        assert_eq!(record.statement.verb, "played");
    }
}
