use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::api::types::ErrorResponse;
use crate::error::{QuarryError, Result};

/// Header marking a request that was already forwarded once
pub const FORWARDED_HEADER: &str = "x-quarry-forwarded";

/// HTTP client relaying write requests to the leader
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// POST `body` to `path` on `http_addr` and decode the reply.
    ///
    /// Error replies are turned back into the matching local error.
    pub async fn post<Req, Resp>(&self, http_addr: &str, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("http://{}{}", http_addr, path);
        debug!(%url, "Forwarding request");

        let resp = self
            .client
            .post(&url)
            .header(FORWARDED_HEADER, "1")
            .json(body)
            .send()
            .await
            .map_err(|e| QuarryError::Forward(format!("{}: {}", url, e)))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<Resp>()
                .await
                .map_err(|e| QuarryError::Forward(format!("invalid reply from {}: {}", url, e)));
        }
        Err(decode_error(status, resp).await)
    }
}

async fn decode_error(status: StatusCode, resp: reqwest::Response) -> QuarryError {
    match resp.json::<ErrorResponse>().await {
        Ok(err) => QuarryError::from_wire(&err.error, &err.message, err.details.as_ref()),
        Err(_) => QuarryError::Forward(format!("leader replied with status {}", status)),
    }
}
