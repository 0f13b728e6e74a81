use std::time::Duration;

use crucible_common::{metrics::RelayMetrics, RelayEndpointConfig};
use crucible_types::SignedBidSubmission;
use reqwest::{
    header::{CONTENT_ENCODING, CONTENT_TYPE},
    Client, StatusCode,
};
use tracing::debug;

use crate::{encoding::encode_submission, error::RelayError};

pub const PATH_SUBMIT_BLOCK: &str = "/relay/v1/builder/blocks";

/// Relay reached over the network.
#[derive(Clone, Debug)]
pub struct RemoteRelay {
    http: Client,
    config: RelayEndpointConfig,
    submit_url: String,
    timeout: Duration,
    name: String,
}

impl RemoteRelay {
    pub fn new(
        http: Client,
        config: RelayEndpointConfig,
        enable_cancellations: bool,
        timeout: Duration,
    ) -> Self {
        let base = config.endpoint.as_str().trim_end_matches('/');
        let mut submit_url = format!("{base}{PATH_SUBMIT_BLOCK}");
        if enable_cancellations {
            submit_url.push_str("?cancellations=1");
        }
        let name = config.endpoint.host_str().unwrap_or("unknown").to_string();

        Self { http, config, submit_url, timeout, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }

    pub async fn submit_block(&self, submission: &SignedBidSubmission) -> Result<(), RelayError> {
        let _timer = RelayMetrics::timer(&self.name);

        let res = self.send(submission).await;
        let status = match &res {
            Ok(()) => "ok",
            Err(RelayError::TooManyRequests) => "rate_limited",
            Err(RelayError::UnexpectedStatus { .. }) => "rejected",
            Err(_) => "error",
        };
        RelayMetrics::submission(&self.name, status);

        res
    }

    async fn send(&self, submission: &SignedBidSubmission) -> Result<(), RelayError> {
        let encoded =
            encode_submission(submission, self.config.ssz_enabled, self.config.gzip_enabled)?;

        let mut request = self
            .http
            .post(&self.submit_url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, encoded.content_type);
        if let Some(encoding) = encoded.content_encoding {
            request = request.header(CONTENT_ENCODING, encoding);
        }

        let response = request.body(encoded.body).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RelayError::TooManyRequests);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UnexpectedStatus { status, body });
        }

        debug!(relay = %self.name, slot = submission.slot(), %status, "block submitted");
        Ok(())
    }
}
