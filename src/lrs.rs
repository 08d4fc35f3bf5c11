//! Learning Record Store client
//!
//! The client walks the LRS cursor-based pagination and hands back raw
//! records. Talking HTTP is delegated to an [`LrsTransport`]; a blocking
//! `reqwest` transport is available with the `http` feature.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LrsApiError, PotsieError};
use crate::schema::RawRecord;

/// LRS endpoint serving statements
pub const STATEMENT_ENDPOINT: &str = "statement";

/// Query parameters sent with an LRS request
pub type Params = Vec<(String, String)>;

/// Performs a single GET request against the LRS API
pub trait LrsTransport {
    fn get(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value, PotsieError>;
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(rename = "pageInfo")]
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: RawRecord,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage", default)]
    has_next_page: bool,
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
}

/// Paginating LRS client
pub struct LrsClient<T: LrsTransport> {
    transport: T,
}

impl<T: LrsTransport> LrsClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch every object of a model, following `endCursor` while
    /// `hasNextPage` is set
    pub fn objects_for_model(
        &self,
        endpoint: &str,
        mut params: Params,
    ) -> Result<Vec<RawRecord>, PotsieError> {
        let mut records = Vec::new();

        loop {
            let response = self.transport.get(endpoint, &params)?;
            let page: Page = serde_json::from_value(response)
                .map_err(|e| PotsieError::ParseError(format!("Invalid LRS page: {}", e)))?;

            records.extend(page.edges.into_iter().map(|edge| edge.node));

            let Some(info) = page.page_info.filter(|info| info.has_next_page) else {
                break;
            };
            let cursor = info.end_cursor.ok_or_else(|| {
                PotsieError::ParseError("LRS page has a next page but no end cursor".to_string())
            })?;

            tracing::debug!(cursor = %cursor, fetched = records.len(), "following LRS cursor");
            params.retain(|(key, _)| key != "after");
            params.push(("after".to_string(), cursor));
        }

        Ok(records)
    }

    /// Fetch all statements matching `params`
    pub fn records(&self, params: Params) -> Result<Vec<RawRecord>, PotsieError> {
        self.objects_for_model(STATEMENT_ENDPOINT, params)
    }

    /// Fetch all statements about a video (an uuid is expected)
    pub fn records_for_object_id(&self, object_id: &str) -> Result<Vec<RawRecord>, PotsieError> {
        self.records(vec![("filter".to_string(), object_filter(object_id))])
    }
}

/// LRS filter selecting statements for an object uuid
pub fn object_filter(object_id: &str) -> String {
    serde_json::json!({ "$or": [{ "statement.object.id": format!("uuid://{}", object_id) }] })
        .to_string()
}

/// Build the API error for a failed request, logging it
pub fn api_error(verb: &str, url: &str, status: u16, body: String) -> LrsApiError {
    let err = LrsApiError {
        verb: verb.to_string(),
        url: url.to_string(),
        status,
        body,
    };
    tracing::error!("{}", err);
    err
}

/// Body reported in an API error; a body that could not be read is described
fn error_body<E: std::fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|e| format!("<unreadable response body: {}>", e))
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use reqwest::blocking::Client;
    use serde_json::Value;

    use super::{api_error, error_body, LrsTransport};
    use crate::config::LrsConfig;
    use crate::error::PotsieError;

    /// Blocking HTTP transport authenticating with a Basic token
    pub struct HttpTransport {
        client: Client,
        api_url: String,
        auth_token: String,
    }

    impl HttpTransport {
        pub fn new(config: &LrsConfig) -> Result<Self, PotsieError> {
            let api_url = config.require_api_url()?.to_string();
            let client = Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .map_err(|e| PotsieError::Transport(format!("failed to configure HTTP client: {}", e)))?;

            Ok(Self {
                client,
                api_url,
                auth_token: config.auth_token.clone(),
            })
        }
    }

    impl LrsTransport for HttpTransport {
        fn get(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value, PotsieError> {
            let url = format!("{}/{}", self.api_url, endpoint);
            tracing::debug!(url = %url, ?params, "new LRS request started");

            let response = self
                .client
                .get(&url)
                .header("Authorization", format!("Basic {}", self.auth_token))
                .query(params)
                .send()
                .map_err(|e| PotsieError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = error_body(response.text());
                return Err(api_error("get", &url, status.as_u16(), body).into());
            }

            tracing::debug!(status = status.as_u16(), "LRS request ended");
            response
                .json::<Value>()
                .map_err(|e| PotsieError::ParseError(format!("Invalid LRS response: {}", e)))
        }
    }
}
