use std::sync::OnceLock;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{
    QueryError, RangeData, RangeRequest, RangeResponse, RangeSource, ResponseStatus,
    VISIBLE_RANGE_ENDPOINT,
};

/// Returns a shared reqwest client to reuse HTTP connections.
fn get_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(reqwest::Client::new)
}

/// Range source backed by the dashboard's HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpRangeSource {
    server: String,
    timeout: Duration,
}

impl HttpRangeSource {
    #[must_use]
    pub fn new(server: impl Into<String>, timeout: Duration) -> Self {
        let server = server.into();
        Self {
            server: server.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }
}

impl RangeSource for HttpRangeSource {
    fn fetch(&self, request: RangeRequest) -> BoxFuture<'static, Result<RangeData, QueryError>> {
        get_visible_range(self.server.clone(), self.timeout, request).boxed()
    }
}

async fn get_visible_range(
    server: String,
    timeout: Duration,
    request: RangeRequest,
) -> Result<RangeData, QueryError> {
    if request.signal_ids.is_empty() {
        return Ok(RangeData::default());
    }
    let client = get_client();
    let response = client
        .post(format!("{server}/{VISIBLE_RANGE_ENDPOINT}"))
        .timeout(timeout)
        .json(&request)
        .send()
        .await?;
    let status_code = response.status();
    let body = response.text().await?;
    debug!(
        "{} bytes from {server} for {} signals ({status_code})",
        body.len(),
        request.signal_ids.len()
    );

    match serde_json::from_str::<RangeResponse>(&body) {
        // the server reports parameter and lookup errors as JSON with a 4xx/5xx code
        Ok(parsed) if status_code.is_success() || parsed.status == ResponseStatus::Error => {
            parsed.into_range_data()
        }
        Ok(_) => Err(unexpected(status_code)),
        Err(e) if status_code.is_success() => Err(e.into()),
        Err(_) => Err(unexpected(status_code)),
    }
}

fn unexpected(code: StatusCode) -> QueryError {
    warn!("Unexpected response code: {code}");
    QueryError::UnexpectedStatus(code)
}
