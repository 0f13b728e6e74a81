use alloy_primitives::{hex, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    error::PayloadDecodeError,
    fields::{Bloom, ExtraData, Transaction, Transactions, Withdrawal, Withdrawals},
    ExecutableData, LOGS_BLOOM_SIZE,
};

/// Response of a peer builder's `/eth/v1/builder/block` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerPayloadResponse {
    pub version: String,
    pub data: PeerExecutableData,
}

/// Payload as served by peer builders: quoted integers and free-form hex strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerExecutableData {
    pub parent_hash: B256,
    pub fee_recipient: Address,
    pub state_root: B256,
    pub receipts_root: B256,
    #[serde(default)]
    pub logs_bloom: String,
    pub prev_randao: B256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub block_number: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_used: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub timestamp: u64,
    #[serde(default)]
    pub extra_data: String,
    #[serde(with = "serde_utils::quoted_u64")]
    pub base_fee_per_gas: u64,
    pub block_hash: B256,
    #[serde(default)]
    pub transactions: Vec<Bytes>,
    #[serde(default)]
    pub withdrawals: Option<Vec<Withdrawal>>,
}

/// Decodes `0x` prefixed hex, bare hex is rejected.
fn decode_hex(field: &'static str, s: &str) -> Result<Vec<u8>, PayloadDecodeError> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).ok_or_else(|| {
        PayloadDecodeError::InvalidHex { field, reason: "missing 0x prefix".to_string() }
    })?;
    hex::decode(digits).map_err(|e| PayloadDecodeError::InvalidHex { field, reason: e.to_string() })
}

impl TryFrom<PeerExecutableData> for ExecutableData {
    type Error = PayloadDecodeError;

    fn try_from(data: PeerExecutableData) -> Result<Self, Self::Error> {
        let mut logs_bloom = Bloom::ZERO;
        if !data.logs_bloom.is_empty() {
            let bytes = decode_hex("logs_bloom", &data.logs_bloom)?;
            if bytes.len() != LOGS_BLOOM_SIZE {
                return Err(PayloadDecodeError::InvalidBloomLength(bytes.len()));
            }
            logs_bloom = Bloom::from_slice(&bytes);
        }

        let mut extra_data = ExtraData::default();
        if !data.extra_data.is_empty() {
            let bytes = decode_hex("extra_data", &data.extra_data)?;
            extra_data = ExtraData::from_bor(bytes);
        }

        let num_txs = data.transactions.len();
        let mut txs = Vec::with_capacity(num_txs);
        for (index, tx) in data.transactions.into_iter().enumerate() {
            let tx = Transaction::try_new(tx)
                .map_err(|len| PayloadDecodeError::TransactionTooLong { index, len })?;
            txs.push(tx);
        }
        let transactions = Transactions::new(txs)
            .map_err(|_| PayloadDecodeError::TooManyTransactions(num_txs))?;

        let withdrawals = data.withdrawals.unwrap_or_default();
        let num_withdrawals = withdrawals.len();
        let withdrawals = Withdrawals::new(withdrawals)
            .map_err(|_| PayloadDecodeError::TooManyWithdrawals(num_withdrawals))?;

        Ok(ExecutableData {
            parent_hash: data.parent_hash,
            fee_recipient: data.fee_recipient,
            state_root: data.state_root,
            receipts_root: data.receipts_root,
            logs_bloom,
            prev_randao: data.prev_randao,
            block_number: data.block_number,
            gas_limit: data.gas_limit,
            gas_used: data.gas_used,
            timestamp: data.timestamp,
            extra_data,
            base_fee_per_gas: U256::from(data.base_fee_per_gas),
            block_hash: data.block_hash,
            transactions,
            withdrawals,
        })
    }
}
