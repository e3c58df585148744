//! reqwest-backed [`PeerClient`].

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::ProbeError;
use crate::domain::payload::FormPayload;
use crate::ports::{PeerClient, PeerResponse};

#[derive(Debug, Clone)]
pub struct ReqwestPeerClient {
    client: reqwest::Client,
}

impl ReqwestPeerClient {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            ProbeError::configuration(format!("failed to build http client: {e}")).with_source(e)
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PeerClient for ReqwestPeerClient {
    async fn post_form(
        &self,
        url: &str,
        form: &FormPayload,
        timeout: Duration,
    ) -> Result<PeerResponse, ProbeError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form.encode())
            .send()
            .await
            .map_err(|e| ProbeError::transport(format!("POST {url} failed: {e}")).with_source(e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::transport(format!("reading {url} response: {e}")).with_source(e))?;
        Ok(PeerResponse { status, body })
    }
}
