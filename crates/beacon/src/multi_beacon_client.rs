use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use crucible_common::task;
use crucible_types::{BlsPublicKeyBytes, PayloadAttributes};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, Sender};
use tracing::{debug, error, info, warn};

use crate::{
    beacon_client::BeaconClient, error::BeaconClientError, traits::BeaconFeed,
    types::PayloadAttributesEvent,
};

pub const SLOTS_PER_EPOCH: u64 = 32;

#[derive(Default)]
struct DutiesCache {
    epoch: Option<u64>,
    by_slot: HashMap<u64, BlsPublicKeyBytes>,
}

/// Beacon feed over one or more beacon nodes.
///
/// Requests go to the node that last answered successfully, falling back to the others in
/// order. Payload attribute events are subscribed on every node, so the same slot is usually
/// seen more than once.
pub struct MultiBeaconClient {
    pub beacon_clients: Vec<(usize, Arc<BeaconClient>)>,
    /// The ID of the beacon client with the most recent successful response.
    pub best_beacon_instance: AtomicUsize,
    known_validators: RwLock<HashSet<BlsPublicKeyBytes>>,
    duties: RwLock<DutiesCache>,
}

impl MultiBeaconClient {
    pub fn new(beacon_clients: Vec<Arc<BeaconClient>>) -> Self {
        Self {
            beacon_clients: beacon_clients.into_iter().enumerate().collect(),
            best_beacon_instance: AtomicUsize::new(0),
            known_validators: RwLock::new(HashSet::new()),
            duties: RwLock::new(DutiesCache::default()),
        }
    }

    /// Clients with the last successful one first, the rest in their original order.
    pub fn beacon_clients_by_last_response(&self) -> Vec<(usize, Arc<BeaconClient>)> {
        let mut instances = self.beacon_clients.clone();
        let index = self.best_beacon_instance.load(Ordering::Relaxed);
        if let Some(pos) = instances.iter().position(|(i, _)| *i == index) {
            let best = instances.remove(pos);
            instances.insert(0, best);
        }
        instances
    }

    pub async fn get_proposer_duties(
        &self,
        epoch: u64,
    ) -> Result<Vec<crate::types::ProposerDuty>, BeaconClientError> {
        let mut last_err = BeaconClientError::Unavailable;
        for (i, client) in self.beacon_clients_by_last_response() {
            match client.get_proposer_duties(epoch).await {
                Ok(duties) => {
                    self.best_beacon_instance.store(i, Ordering::Relaxed);
                    return Ok(duties);
                }
                Err(err) => {
                    warn!(%err, endpoint = %client.endpoint, epoch, "failed to get proposer duties");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    /// Replaces the known validator set with the head state's active and pending validators.
    pub async fn refresh_known_validators(&self) -> Result<usize, BeaconClientError> {
        let mut last_err = BeaconClientError::Unavailable;
        for (i, client) in self.beacon_clients_by_last_response() {
            match client.get_head_validators().await {
                Ok(validators) => {
                    self.best_beacon_instance.store(i, Ordering::Relaxed);
                    let known: HashSet<_> =
                        validators.into_iter().map(|v| v.validator.pubkey).collect();
                    let count = known.len();
                    *self.known_validators.write() = known;
                    return Ok(count);
                }
                Err(err) => {
                    warn!(%err, endpoint = %client.endpoint, "failed to get validators");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    /// Refreshes known validators every `interval`, starting immediately.
    pub fn start_validator_refresh(self: &Arc<Self>, interval: Duration) {
        let this = self.clone();
        task::spawn(file!(), line!(), async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match this.refresh_known_validators().await {
                    Ok(count) => debug!(count, "refreshed known validators"),
                    Err(err) => error!(%err, "failed to refresh known validators"),
                }
            }
        });
    }

    async fn resolve_proposer(&self, slot: u64) -> BlsPublicKeyBytes {
        match self.proposer_for_slot(slot).await {
            Ok(Some(pubkey)) => pubkey,
            Ok(None) => {
                warn!(slot, "no proposer duty for slot");
                BlsPublicKeyBytes::empty()
            }
            Err(err) => {
                warn!(%err, slot, "failed to resolve proposer");
                BlsPublicKeyBytes::empty()
            }
        }
    }
}

#[async_trait]
impl BeaconFeed for MultiBeaconClient {
    fn is_validator(&self, pubkey: &BlsPublicKeyBytes) -> bool {
        self.known_validators.read().contains(pubkey)
    }

    async fn proposer_for_slot(
        &self,
        slot: u64,
    ) -> Result<Option<BlsPublicKeyBytes>, BeaconClientError> {
        let epoch = slot / SLOTS_PER_EPOCH;
        {
            let cache = self.duties.read();
            if cache.epoch == Some(epoch) {
                return Ok(cache.by_slot.get(&slot).cloned());
            }
        }

        let duties = self.get_proposer_duties(epoch).await?;
        let by_slot: HashMap<_, _> = duties.into_iter().map(|d| (d.slot, d.pubkey)).collect();
        let proposer = by_slot.get(&slot).cloned();

        let mut cache = self.duties.write();
        // a concurrent lookup may have cached a newer epoch already
        if cache.epoch.is_none_or(|cached| cached <= epoch) {
            *cache = DutiesCache { epoch: Some(epoch), by_slot };
        }

        Ok(proposer)
    }

    async fn subscribe_payload_attributes(&self, chan: Sender<PayloadAttributes>) {
        let (events_tx, mut events_rx) = mpsc::channel::<PayloadAttributesEvent>(64);

        let mut handles = Vec::with_capacity(self.beacon_clients.len());
        for (_, client) in self.beacon_clients_by_last_response() {
            let events_tx = events_tx.clone();
            handles.push(task::spawn(file!(), line!(), async move {
                if let Err(err) = client.subscribe_to_payload_attributes_events(events_tx).await {
                    error!(%err, endpoint = %client.endpoint, "payload attributes subscription ended");
                }
            }));
        }
        drop(events_tx);

        info!(clients = handles.len(), "subscribed to payload attributes");

        loop {
            let event = tokio::select! {
                event = events_rx.recv() => event,
                _ = chan.closed() => break,
            };
            let Some(event) = event else { break };

            let proposer = self.resolve_proposer(event.data.proposal_slot).await;
            let attrs = event.data.into_payload_attributes(proposer);
            if chan.send(attrs).await.is_err() {
                break;
            }
        }

        for handle in handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy_primitives::B256;
    use mockito::Matcher;

    use super::*;

    const PUBKEY: &str = "0x933ad9491b62059dd065b560d256d8957a8c402cc6e8d8ee7290ae11e8f7329267a8811c397529dac52ae1342ba58c95";

    fn pubkey() -> BlsPublicKeyBytes {
        serde_json::from_value(serde_json::json!(PUBKEY)).unwrap()
    }

    fn duties_body(slot: u64) -> String {
        format!(
            r#"{{"dependent_root":"0x44bff3186a234cf4fb2799c9a44dc089e33cd976a804081c652c47a8d66f11c2","execution_optimistic":false,"data":[{{"pubkey":"{PUBKEY}","validator_index":"1","slot":"{slot}"}}]}}"#
        )
    }

    fn client(server: &mockito::ServerGuard) -> Arc<BeaconClient> {
        Arc::new(BeaconClient::from_endpoint_str(&server.url()).unwrap())
    }

    #[tokio::test]
    async fn test_proposer_duties_are_cached_per_epoch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/eth/v1/validator/duties/proposer/2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(duties_body(65))
            .expect(1)
            .create_async()
            .await;

        let multi = MultiBeaconClient::new(vec![client(&server)]);
        assert_eq!(multi.proposer_for_slot(65).await.unwrap(), Some(pubkey()));
        assert_eq!(multi.proposer_for_slot(66).await.unwrap(), None);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_falls_back_to_healthy_client() {
        let mut bad = mockito::Server::new_async().await;
        let _bad = bad
            .mock("GET", Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let mut good = mockito::Server::new_async().await;
        let _good = good
            .mock("GET", "/eth/v1/validator/duties/proposer/0")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(duties_body(3))
            .create_async()
            .await;

        let multi = MultiBeaconClient::new(vec![client(&bad), client(&good)]);
        assert_eq!(multi.proposer_for_slot(3).await.unwrap(), Some(pubkey()));
        assert_eq!(multi.best_beacon_instance.load(Ordering::Relaxed), 1);
        assert_eq!(multi.beacon_clients_by_last_response()[0].0, 1);
    }

    #[tokio::test]
    async fn test_known_validators() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/eth/v1/beacon/states/head/validators")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"data":[{{"index":"0","balance":"1","status":"active_ongoing","validator":{{"pubkey":"{PUBKEY}"}}}}]}}"#
            ))
            .create_async()
            .await;

        let multi = MultiBeaconClient::new(vec![client(&server)]);
        assert!(!multi.is_validator(&pubkey()));

        assert_eq!(multi.refresh_known_validators().await.unwrap(), 1);
        assert!(multi.is_validator(&pubkey()));
        assert!(!multi.is_validator(&BlsPublicKeyBytes::empty()));
    }

    #[tokio::test]
    async fn test_subscribe_resolves_proposer() {
        let event = r#"{"version":"capella","data":{"proposer_index":"1","proposal_slot":"33","parent_block_number":"99","parent_block_root":"0x0101010101010101010101010101010101010101010101010101010101010101","parent_block_hash":"0x0202020202020202020202020202020202020202020202020202020202020202","payload_attributes":{"timestamp":"1700000396","prev_randao":"0x0303030303030303030303030303030303030303030303030303030303030303","suggested_fee_recipient":"0x0404040404040404040404040404040404040404","withdrawals":[]}}}"#;

        let mut server = mockito::Server::new_async().await;
        let _events = server
            .mock("GET", "/eth/v1/events")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(format!("data: {event}\n\n"))
            .create_async()
            .await;
        let _duties = server
            .mock("GET", "/eth/v1/validator/duties/proposer/1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(duties_body(33))
            .create_async()
            .await;

        let multi = Arc::new(MultiBeaconClient::new(vec![client(&server)]));
        let (tx, mut rx) = mpsc::channel(4);
        let feed = multi.clone();
        let handle = tokio::spawn(async move { feed.subscribe_payload_attributes(tx).await });

        let attrs = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(attrs.slot, 33);
        assert_eq!(attrs.block_number, 100);
        assert_eq!(attrs.parent_hash, B256::repeat_byte(2));
        assert_eq!(attrs.proposer_pubkey, pubkey());

        drop(rx);
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
