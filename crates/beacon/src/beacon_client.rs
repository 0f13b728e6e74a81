use std::time::Duration;

use futures::StreamExt;
use reqwest_eventsource::EventSource;
use tokio::{sync::mpsc::Sender, time::sleep};
use tracing::{error, warn};
use url::Url;

use crate::{
    error::BeaconClientError,
    types::{ApiResult, BeaconResponse, PayloadAttributesEvent, ProposerDuty, ValidatorSummary},
};

pub const SSE_RECONNECT_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct BeaconClient {
    pub http: reqwest::Client,
    pub endpoint: Url,
}

impl BeaconClient {
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    pub fn from_endpoint_str(endpoint: &str) -> Result<Self, BeaconClientError> {
        let endpoint = Url::parse(endpoint)?;
        Ok(Self::new(reqwest::Client::new(), endpoint))
    }

    pub async fn get<T: serde::Serialize + serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, BeaconClientError> {
        let result = self.http_get(path).await?.json().await?;
        match result {
            ApiResult::Ok(result) => Ok(result),
            ApiResult::Err(err) => Err(err.into()),
        }
    }

    pub async fn http_get(&self, path: &str) -> Result<reqwest::Response, BeaconClientError> {
        let target = self.endpoint.join(path)?;
        Ok(self.http.get(target).send().await?)
    }

    /// Subscribe to SSE events from the beacon client `events` endpoint.
    pub async fn subscribe_to_sse<T: serde::de::DeserializeOwned>(
        &self,
        topic: &str,
        chan: Sender<T>,
    ) -> Result<(), BeaconClientError> {
        let url = format!("{}eth/v1/events?topics={}", self.endpoint, topic);

        loop {
            let mut es = EventSource::get(&url);

            while let Some(event) = es.next().await {
                match event {
                    Ok(reqwest_eventsource::Event::Message(message)) => {
                        match serde_json::from_str::<T>(&message.data) {
                            Ok(data) => {
                                chan.send(data)
                                    .await
                                    .map_err(|_| BeaconClientError::ChannelClosed)?;
                            }
                            Err(err) => error!(err=%err, "Error parsing chunk"),
                        }
                    }
                    Ok(reqwest_eventsource::Event::Open) => {}
                    Err(err) => {
                        warn!(err=%err, "SSE stream ended, reconnecting...");
                        es.close();
                        break;
                    }
                }
            }
            sleep(SSE_RECONNECT_DELAY).await;
        }
    }

    pub async fn subscribe_to_payload_attributes_events(
        &self,
        chan: Sender<PayloadAttributesEvent>,
    ) -> Result<(), BeaconClientError> {
        self.subscribe_to_sse("payload_attributes", chan).await
    }

    pub async fn get_proposer_duties(
        &self,
        epoch: u64,
    ) -> Result<Vec<ProposerDuty>, BeaconClientError> {
        let endpoint = format!("eth/v1/validator/duties/proposer/{epoch}");
        let result: BeaconResponse<Vec<ProposerDuty>> = self.get(&endpoint).await?;
        Ok(result.data)
    }

    pub async fn get_head_validators(&self) -> Result<Vec<ValidatorSummary>, BeaconClientError> {
        let endpoint = "eth/v1/beacon/states/head/validators?status=active,pending";
        let result: BeaconResponse<Vec<ValidatorSummary>> = self.get(endpoint).await?;
        Ok(result.data)
    }

}
