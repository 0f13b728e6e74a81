use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, I256};
use async_trait::async_trait;
use crucible_common::SimulatorConfig;
use crucible_types::{Bundle, ExecutableData, PayloadAttributes, SimulatedBundle, Withdrawal};
use reqwest::{
    header::{HeaderValue, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::{
    candidate::CandidateBlock,
    control::SyncProbe,
    error::SimulationError,
    traits::{BundleSimulator, PayloadSealer, SimulationOutcome, Snapshot, SnapshotProvider},
};

/// Parent block plus the transactions applied on top of it so far. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcSnapshot {
    pub parent_hash: B256,
    pub block_number: u64,
    pub timestamp: u64,
    pub fee_recipient: Address,
    pub prefix: Arc<Vec<Bytes>>,
    pub gas_used: u64,
    pub profit: I256,
}

impl Snapshot for RpcSnapshot {
    fn parent_hash(&self) -> B256 {
        self.parent_hash
    }
}

impl RpcSnapshot {
    fn apply(&self, sim: &SimulatedBundle) -> Self {
        let mut prefix = Vec::with_capacity(self.prefix.len() + sim.bundle.txs.len());
        prefix.extend(self.prefix.iter().cloned());
        prefix.extend(sim.bundle.txs.iter().cloned());

        Self {
            prefix: Arc::new(prefix),
            gas_used: self.gas_used + sim.gas_used,
            profit: self.profit + sim.profit,
            ..self.clone()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateBundleArgs<'a> {
    parent_hash: B256,
    block_number: u64,
    timestamp: u64,
    fee_recipient: Address,
    /// Transactions already in the block, executed before the bundle.
    prefix: &'a [Bytes],
    txs: &'a [Bytes],
    reverting_tx_indices: &'a [usize],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulateBundleResult {
    gas_used: u64,
    /// Decimal wei, negative when the bundle costs the fee recipient.
    profit: String,
    success: bool,
    #[serde(default)]
    revert_reason: Option<String>,
    #[serde(default)]
    failed_tx: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SealBlockArgs<'a> {
    parent_hash: B256,
    block_number: u64,
    timestamp: u64,
    fee_recipient: Address,
    prev_randao: B256,
    gas_limit: u64,
    withdrawals: &'a [Withdrawal],
    txs: &'a [Bytes],
}

/// Execution engine reached over JSON-RPC, using the `{namespace}_simulateBundle` and
/// `{namespace}_sealBlock` methods.
#[derive(Clone)]
pub struct RpcEngine {
    http: Client,
    url: Url,
    simulate_method: String,
    seal_method: String,
}

impl RpcEngine {
    pub fn new(http: Client, config: &SimulatorConfig) -> Self {
        Self {
            http,
            url: config.url.clone(),
            simulate_method: format!("{}_simulateBundle", config.namespace),
            seal_method: format!("{}_sealBlock", config.namespace),
        }
    }

    async fn call_raw(&self, method: &str, params: Value) -> Result<Value, SimulationError> {
        let rpc_payload = json!({
            "jsonrpc": "2.0",
            "id": "1",
            "method": method,
            "params": params
        });

        debug!(method, "sending rpc request");
        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&rpc_payload)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(SimulationError::Rpc(response.status().to_string()));
        }

        let response: JsonRpcResponse =
            response.json().await.map_err(|err| SimulationError::Decode(err.to_string()))?;
        if let Some(error) = response.error {
            return Err(SimulationError::Engine(error.message));
        }
        Ok(response.result)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, SimulationError> {
        let result = self.call_raw(method, params).await?;
        serde_json::from_value(result).map_err(|err| SimulationError::Decode(err.to_string()))
    }
}

#[async_trait]
impl SnapshotProvider<RpcSnapshot> for RpcEngine {
    async fn snapshot_at(&self, attrs: &PayloadAttributes) -> Result<RpcSnapshot, SimulationError> {
        let parent = self.call_raw("eth_getBlockByHash", json!([attrs.parent_hash, false])).await?;
        if parent.is_null() {
            return Err(SimulationError::UnknownParent(attrs.parent_hash));
        }

        Ok(RpcSnapshot {
            parent_hash: attrs.parent_hash,
            block_number: attrs.block_number,
            timestamp: attrs.timestamp,
            fee_recipient: attrs.fee_recipient,
            prefix: Arc::new(Vec::new()),
            gas_used: 0,
            profit: I256::ZERO,
        })
    }
}

#[async_trait]
impl BundleSimulator<RpcSnapshot> for RpcEngine {
    async fn simulate(
        &self,
        snapshot: &RpcSnapshot,
        bundle: Arc<Bundle>,
    ) -> Result<SimulationOutcome<RpcSnapshot>, SimulationError> {
        let args = SimulateBundleArgs {
            parent_hash: snapshot.parent_hash,
            block_number: snapshot.block_number,
            timestamp: snapshot.timestamp,
            fee_recipient: snapshot.fee_recipient,
            prefix: &snapshot.prefix,
            txs: &bundle.txs,
            reverting_tx_indices: &bundle.reverting_tx_indices,
        };
        let result: SimulateBundleResult = self.call(&self.simulate_method, json!([args])).await?;

        let profit = I256::from_dec_str(&result.profit)
            .map_err(|err| SimulationError::Decode(format!("profit {}: {err}", result.profit)))?;
        let simulated = SimulatedBundle {
            bundle,
            gas_used: result.gas_used,
            profit,
            success: result.success,
            revert_reason: result.revert_reason,
            failed_tx: result.failed_tx,
        };

        let post_state =
            if simulated.success { snapshot.apply(&simulated) } else { snapshot.clone() };
        Ok(SimulationOutcome { simulated, post_state })
    }
}

#[async_trait]
impl PayloadSealer for RpcEngine {
    async fn seal(
        &self,
        attrs: &PayloadAttributes,
        block: &CandidateBlock,
    ) -> Result<ExecutableData, SimulationError> {
        let args = SealBlockArgs {
            parent_hash: block.parent_hash,
            block_number: block.block_number,
            timestamp: block.timestamp,
            fee_recipient: block.fee_recipient,
            prev_randao: attrs.prev_randao,
            gas_limit: block.gas_limit,
            withdrawals: &block.withdrawals,
            txs: &block.transactions,
        };
        self.call(&self.seal_method, json!([args])).await
    }
}

#[async_trait]
impl SyncProbe for RpcEngine {
    async fn is_syncing(&self) -> Result<bool, SimulationError> {
        // `false` when synced, a progress object otherwise
        let result = self.call_raw("eth_syncing", json!([])).await?;
        Ok(!matches!(result, Value::Bool(false)))
    }
}
