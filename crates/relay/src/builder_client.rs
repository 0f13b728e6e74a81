use std::time::Duration;

use alloy_primitives::{hex, B256};
use crucible_types::{ExecutableData, PeerPayloadResponse};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::BuilderClientError;

pub const PATH_GET_BLOCK: &str = "/eth/v1/builder/block";

/// Fetches finished blocks from a peer builder.
#[derive(Clone, Debug)]
pub struct BuilderClient {
    http: Client,
    base_url: Url,
}

impl BuilderClient {
    /// `host` is either a full url or `host:port`, the latter is reached over plain http.
    pub fn new(host: &str, timeout: Duration) -> Result<Self, BuilderClientError> {
        let base_url = url_for_host(host)?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get_block(
        &self,
        number: u64,
        parent_hash: B256,
    ) -> Result<ExecutableData, BuilderClientError> {
        self.fetch(format!("{PATH_GET_BLOCK}/{number}/{}", hex::encode_prefixed(parent_hash)))
            .await
    }

    pub async fn get_block_by_parent(
        &self,
        parent_hash: B256,
    ) -> Result<ExecutableData, BuilderClientError> {
        self.fetch(format!("{PATH_GET_BLOCK}/{}", hex::encode_prefixed(parent_hash))).await
    }

    async fn fetch(&self, path: String) -> Result<ExecutableData, BuilderClientError> {
        let url = format!("{}{path}", self.base_url.as_str().trim_end_matches('/'));
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BuilderClientError::UnexpectedStatus { status, path, body });
        }

        let body = response.bytes().await?;
        let response: PeerPayloadResponse = serde_json::from_slice(&body)?;
        let payload = ExecutableData::try_from(response.data)?;

        debug!(%path, block_number = payload.block_number, "fetched peer block");
        Ok(payload)
    }
}

fn url_for_host(host: &str) -> Result<Url, BuilderClientError> {
    if let Ok(url) = Url::parse(host) {
        if url.host_str().is_some_and(|h| !h.is_empty()) {
            return Ok(url);
        }
    }

    let invalid = || BuilderClientError::InvalidHost(host.to_string());
    match host.split(':').collect::<Vec<_>>().as_slice() {
        [name, port] if !name.is_empty() && port.parse::<u16>().is_ok() => {
            Url::parse(&format!("http://{name}:{port}")).map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}
