use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Bundle selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AlgoType {
    MevGeth,
    Greedy,
    GreedyBuckets,
    GreedyMultiSnap,
    GreedyBucketsMultiSnap,
}

impl AlgoType {
    pub const ALL: [AlgoType; 5] = [
        AlgoType::MevGeth,
        AlgoType::Greedy,
        AlgoType::GreedyBuckets,
        AlgoType::GreedyMultiSnap,
        AlgoType::GreedyBucketsMultiSnap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgoType::MevGeth => "mev-geth",
            AlgoType::Greedy => "greedy",
            AlgoType::GreedyBuckets => "greedy-buckets",
            AlgoType::GreedyMultiSnap => "greedy-multi-snap",
            AlgoType::GreedyBucketsMultiSnap => "greedy-buckets-multi-snap",
        }
    }

    pub fn is_multi_snap(&self) -> bool {
        matches!(self, AlgoType::GreedyMultiSnap | AlgoType::GreedyBucketsMultiSnap)
    }
}

impl fmt::Display for AlgoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgoType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        AlgoType::ALL
            .into_iter()
            .find(|algo| algo.as_str() == lower)
            .ok_or_else(|| ConfigError::UnknownAlgorithm(s.to_string()))
    }
}

impl TryFrom<String> for AlgoType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AlgoType> for String {
    fn from(value: AlgoType) -> Self {
        value.to_string()
    }
}
