use alloy_primitives::FixedBytes;
use lh_types::{EthSpec, MainnetEthSpec, VariableList};

use crate::byte_list;

pub type Withdrawal = lh_types::withdrawal::Withdrawal;
pub type Withdrawals = lh_types::execution_payload::Withdrawals<MainnetEthSpec>;
pub type Transactions =
    VariableList<Transaction, <MainnetEthSpec as EthSpec>::MaxTransactionsPerPayload>;

pub const LOGS_BLOOM_SIZE: usize = 256;
pub type Bloom = FixedBytes<LOGS_BLOOM_SIZE>;

byte_list! {
    /// VariableList<u8, E::MaxExtraDataBytes>
    pub struct ExtraData;
    max = <MainnetEthSpec as EthSpec>::MaxExtraDataBytes;
}

impl ExtraData {
    /// Bor headers carry a 32 byte vanity plus a 65 byte seal, so extra data from bor peers is
    /// kept whole instead of being rejected by the list maximum.
    pub fn from_bor(bytes: impl Into<alloy_primitives::Bytes>) -> Self {
        Self(bytes.into())
    }
}

byte_list! {
    /// VariableList<u8, E::MaxBytesPerTransaction>
    pub struct Transaction;
    max = <MainnetEthSpec as EthSpec>::MaxBytesPerTransaction;
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Bytes;
    use ssz::{Decode, Encode};
    use ssz_types::VariableList;
    use tree_hash::TreeHash;

    use super::*;

    #[test]
    fn test_consts() {
        assert_eq!(LOGS_BLOOM_SIZE, <MainnetEthSpec as EthSpec>::bytes_per_logs_bloom());
    }

    #[test]
    fn test_extra_data_matches_variable_list() {
        type LhExtraData = VariableList<u8, <MainnetEthSpec as EthSpec>::MaxExtraDataBytes>;
        let raw = b"crucible/v0.0.1".to_vec();
        let lh_extra_data = LhExtraData::new(raw.clone()).unwrap();
        let extra_data = ExtraData(Bytes::from(raw));

        assert_eq!(extra_data.as_ssz_bytes(), lh_extra_data.as_ssz_bytes());
        assert_eq!(extra_data.tree_hash_root(), lh_extra_data.tree_hash_root());

        let decoded = ExtraData::from_ssz_bytes(&extra_data.as_ssz_bytes()).unwrap();
        assert_eq!(decoded, extra_data);

        let json = serde_json::to_string(&extra_data).unwrap();
        assert_eq!(json, "\"0x6372756369626c652f76302e302e31\"");
    }

    #[test]
    fn test_extra_data_max_len() {
        assert!(ExtraData::try_new(vec![0u8; 32]).is_ok());
        assert_eq!(ExtraData::try_new(vec![0u8; 33]), Err(33));
        assert_eq!(ExtraData::from_bor(vec![0u8; 97]).len(), 97);
    }
}
