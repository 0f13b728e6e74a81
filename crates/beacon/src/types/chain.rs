use alloy_primitives::{Address, B256};
use crucible_types::{BlsPublicKeyBytes, PayloadAttributes, Withdrawal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PayloadAttributesEvent {
    pub version: String,
    pub data: PayloadAttributesEventData,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PayloadAttributesEventData {
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_index: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposal_slot: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub parent_block_number: u64,
    pub parent_block_root: B256,
    pub parent_block_hash: B256,
    pub payload_attributes: EventPayloadAttributes,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EventPayloadAttributes {
    #[serde(with = "serde_utils::quoted_u64")]
    pub timestamp: u64,
    pub prev_randao: B256,
    pub suggested_fee_recipient: Address,
    #[serde(default)]
    pub withdrawals: Vec<Withdrawal>,
    #[serde(default)]
    pub parent_beacon_block_root: Option<B256>,
}

impl PayloadAttributesEventData {
    /// Build parameters for the proposal slot. The proposer is resolved separately from duties.
    pub fn into_payload_attributes(self, proposer_pubkey: BlsPublicKeyBytes) -> PayloadAttributes {
        PayloadAttributes {
            slot: self.proposal_slot,
            parent_hash: self.parent_block_hash,
            block_number: self.parent_block_number + 1,
            proposer_pubkey,
            fee_recipient: self.payload_attributes.suggested_fee_recipient,
            prev_randao: self.payload_attributes.prev_randao,
            timestamp: self.payload_attributes.timestamp,
            gas_limit: None,
            withdrawals: self.payload_attributes.withdrawals,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProposerDuty {
    pub pubkey: BlsPublicKeyBytes,
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidatorSummary {
    #[serde(with = "serde_utils::quoted_u64")]
    pub index: u64,
    pub status: String,
    pub validator: ValidatorData,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidatorData {
    pub pubkey: BlsPublicKeyBytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{"version":"capella","data":{"proposer_index":"123","proposal_slot":"10","parent_block_number":"9","parent_block_root":"0x0101010101010101010101010101010101010101010101010101010101010101","parent_block_hash":"0x0202020202020202020202020202020202020202020202020202020202020202","payload_attributes":{"timestamp":"1700000120","prev_randao":"0x0303030303030303030303030303030303030303030303030303030303030303","suggested_fee_recipient":"0x0404040404040404040404040404040404040404","withdrawals":[{"index":"5","validator_index":"6","address":"0x0505050505050505050505050505050505050505","amount":"7"}]}}}"#;

    #[test]
    fn test_payload_attributes_event() {
        let event: PayloadAttributesEvent = serde_json::from_str(EVENT).unwrap();
        let attrs = event.data.into_payload_attributes(BlsPublicKeyBytes::empty());

        assert_eq!(attrs.slot, 10);
        assert_eq!(attrs.block_number, 10);
        assert_eq!(attrs.parent_hash, B256::repeat_byte(2));
        assert_eq!(attrs.prev_randao, B256::repeat_byte(3));
        assert_eq!(attrs.fee_recipient, Address::repeat_byte(4));
        assert_eq!(attrs.timestamp, 1700000120);
        assert_eq!(attrs.withdrawals.len(), 1);
        assert_eq!(attrs.withdrawals[0].amount, 7);
        assert_eq!(attrs.gas_limit, None);
    }
}
