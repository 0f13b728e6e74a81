use std::{error::Error, sync::Arc};

use alloy_primitives::B256;
use async_trait::async_trait;
use auto_impl::auto_impl;
use crucible_types::{
    Bundle, ExecutableData, PayloadAttributes, SignedBidSubmission, SimulatedBundle,
};

use crate::{candidate::CandidateBlock, error::SimulationError};

/// Immutable point-in-time view of chain state. Applying a bundle yields a new snapshot, the
/// original stays valid so concurrent algorithms never observe each other's inclusions.
pub trait Snapshot: Clone + Send + Sync + 'static {
    fn parent_hash(&self) -> B256;
}

/// Result of simulating one bundle on top of a snapshot.
#[derive(Debug, Clone)]
pub struct SimulationOutcome<S> {
    pub simulated: SimulatedBundle,
    /// State with the bundle applied. Equal to the input snapshot when the bundle failed.
    pub post_state: S,
}

#[async_trait]
#[auto_impl(Arc)]
pub trait SnapshotProvider<S: Snapshot>: Send + Sync + 'static {
    async fn snapshot_at(&self, attrs: &PayloadAttributes) -> Result<S, SimulationError>;
}

#[async_trait]
#[auto_impl(Arc)]
pub trait BundleSimulator<S: Snapshot>: Send + Sync + 'static {
    async fn simulate(
        &self,
        snapshot: &S,
        bundle: Arc<Bundle>,
    ) -> Result<SimulationOutcome<S>, SimulationError>;
}

#[async_trait]
#[auto_impl(Arc)]
pub trait PayloadSealer: Send + Sync + 'static {
    /// Executes the candidate's transactions on the parent block and returns the finished payload.
    async fn seal(
        &self,
        attrs: &PayloadAttributes,
        block: &CandidateBlock,
    ) -> Result<ExecutableData, SimulationError>;
}

/// Admitted bundles, already filtered by the ingestion layer.
#[auto_impl(Arc)]
pub trait BundleSource: Send + Sync + 'static {
    fn bundles_for(&self, block_number: u64) -> Vec<Arc<Bundle>>;
}

#[async_trait]
#[auto_impl(Arc)]
pub trait BlockSubmitter: Send + Sync + 'static {
    type Error: Error + Send + Sync + 'static;

    async fn submit_block(&self, submission: Arc<SignedBidSubmission>) -> Result<(), Self::Error>;
}

pub trait Engine<S: Snapshot>: SnapshotProvider<S> + BundleSimulator<S> + PayloadSealer {}

impl<S: Snapshot, T> Engine<S> for T where T: SnapshotProvider<S> + BundleSimulator<S> + PayloadSealer {}

/// Concrete collaborators of one builder instance.
pub trait BuilderApi: Send + Sync + 'static {
    type Snapshot: Snapshot;
    type Engine: Engine<Self::Snapshot>;
    type BundleSource: BundleSource;
    type Submitter: BlockSubmitter;
}
