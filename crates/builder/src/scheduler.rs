use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crucible_common::{
    metrics::SchedulerMetrics, task, BuilderConfig, ConfigError, SigningContext,
};
use crucible_types::{BidTrace, ExecutableData, PayloadAttributes, SignedBidSubmission};
use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    algorithms::AlgoSettings,
    assembler::BlockAssembler,
    candidate::CandidateBlock,
    control::Worker,
    error::{AssemblyError, SchedulerError},
    limiter::RateLimiter,
    traits::{BlockSubmitter, BuilderApi, BundleSource, PayloadSealer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Assembling { slot: u64 },
    Submitting { slot: u64 },
    /// The cycle for `slot` was superseded and its result will be discarded.
    Cancelled { slot: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Submitted,
    /// Built, sealed and signed but kept away from relays.
    DryRun,
}

/// Turns payload attribute events into at most one signed submission per slot.
///
/// Every accepted event bumps a generation counter. A cycle only advances past assembly and
/// sealing while its generation is still the latest one, so a superseded cycle may run to
/// completion but never submits.
pub struct Scheduler<A: BuilderApi> {
    engine: Arc<A::Engine>,
    assembler: BlockAssembler<A::Snapshot, A::Engine>,
    bundles: Arc<A::BundleSource>,
    submitter: Arc<A::Submitter>,
    signing: Arc<SigningContext>,
    limiter: RateLimiter,
    submission_offset: Duration,
    dry_run: bool,

    generation: AtomicU64,
    last_slot: Mutex<Option<u64>>,
    state: Mutex<SchedulerState>,
    running: AtomicBool,
    closed: AtomicBool,
}

impl<A: BuilderApi> Scheduler<A> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<A::Engine>,
        assembler: BlockAssembler<A::Snapshot, A::Engine>,
        bundles: Arc<A::BundleSource>,
        submitter: Arc<A::Submitter>,
        signing: Arc<SigningContext>,
        limiter: RateLimiter,
        submission_offset: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            engine,
            assembler,
            bundles,
            submitter,
            signing,
            limiter,
            submission_offset,
            dry_run,
            generation: AtomicU64::new(0),
            last_slot: Mutex::new(None),
            state: Mutex::new(SchedulerState::Idle),
            running: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(
        config: &BuilderConfig,
        engine: Arc<A::Engine>,
        bundles: Arc<A::BundleSource>,
        submitter: Arc<A::Submitter>,
        signing: Arc<SigningContext>,
    ) -> Result<Self, ConfigError> {
        let assembler = BlockAssembler::new(
            engine.clone(),
            config.algorithms()?,
            AlgoSettings::from_config(config),
            config.gas_ceil,
        );
        let limiter = RateLimiter::new(config.rate_limit_interval()?, config.rate_limit_max_burst);

        Ok(Self::new(
            engine,
            assembler,
            bundles,
            submitter,
            signing,
            limiter,
            config.submission_offset()?,
            config.dry_run,
        ))
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    /// Consumes payload attribute events until the feed closes or the scheduler is closed.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<PayloadAttributes>) {
        while let Some(attrs) = events.recv().await {
            if self.closed.load(Ordering::Relaxed) {
                break;
            }
            self.on_payload_attributes(attrs);
        }
        info!("scheduler stopped");
    }

    /// Starts a cycle for `attrs` unless it is stale, a duplicate or rate limited.
    pub fn on_payload_attributes(
        self: &Arc<Self>,
        attrs: PayloadAttributes,
    ) -> Option<JoinHandle<Result<CycleOutcome, SchedulerError>>> {
        let slot = attrs.slot;
        if !self.is_running() {
            debug!(slot, "builder paused, ignoring payload attributes");
            return None;
        }

        let generation = {
            let mut last_slot = self.last_slot.lock();
            if last_slot.is_some_and(|last| slot <= last) {
                debug!(slot, last_slot = ?*last_slot, "ignoring stale or duplicate payload attributes");
                return None;
            }
            if !self.limiter.try_acquire() {
                SchedulerMetrics::rate_limited();
                warn!(slot, "rate limited, dropping payload attributes");
                return None;
            }
            *last_slot = Some(slot);

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let mut state = self.state.lock();
            if let SchedulerState::Assembling { slot: old } | SchedulerState::Submitting { slot: old } =
                *state
            {
                info!(old_slot = old, slot, "cancelling in-flight cycle");
                *state = SchedulerState::Cancelled { slot: old };
            }
            generation
        };

        let scheduler = self.clone();
        Some(task::spawn(file!(), line!(), async move { scheduler.run_cycle(attrs, generation).await }))
    }

    #[tracing::instrument(skip_all, fields(slot = attrs.slot))]
    async fn run_cycle(
        &self,
        attrs: PayloadAttributes,
        generation: u64,
    ) -> Result<CycleOutcome, SchedulerError> {
        let result = self.build_and_submit(&attrs, generation).await;

        let outcome = match &result {
            Ok(CycleOutcome::Submitted) => "submitted",
            Ok(CycleOutcome::DryRun) => "dry_run",
            Err(SchedulerError::Cancelled) => "cancelled",
            Err(SchedulerError::Assembly(AssemblyError::NoViableBlock)) => "no_block",
            Err(SchedulerError::DeadlinePassed) => "deadline_passed",
            Err(_) => "failed",
        };
        SchedulerMetrics::cycle(outcome);

        match &result {
            Ok(outcome) => info!(?outcome, "slot cycle finished"),
            Err(SchedulerError::Cancelled) => info!("slot cycle superseded, result discarded"),
            Err(err) => warn!(%err, "slot cycle failed"),
        }

        self.set_state(generation, SchedulerState::Idle);
        result
    }

    async fn build_and_submit(
        &self,
        attrs: &PayloadAttributes,
        generation: u64,
    ) -> Result<CycleOutcome, SchedulerError> {
        let slot = attrs.slot;
        let window = self.signing.chain_info.submission_window(slot, self.submission_offset);
        let remaining = window.remaining();
        if remaining.is_zero() {
            return Err(SchedulerError::DeadlinePassed);
        }
        let deadline = Instant::now() + remaining;

        self.set_state(generation, SchedulerState::Assembling { slot });
        let bundles = self.bundles.bundles_for(attrs.block_number);
        debug!(num_bundles = bundles.len(), remaining_ms = remaining.as_millis(), "assembling block");

        let block = self.assembler.assemble(attrs, bundles, deadline).await?;
        self.ensure_current(generation)?;

        self.set_state(generation, SchedulerState::Submitting { slot });
        let payload = self.engine.seal(attrs, &block).await.map_err(SchedulerError::Seal)?;
        self.ensure_current(generation)?;

        let submission = self.sign_bid(attrs, &block, payload);

        if self.dry_run {
            submission.verify_signature(self.signing.builder_domain())?;
            info!(
                block_hash = %submission.block_hash(),
                value = %submission.value(),
                algo = %block.algo,
                "dry run, bid signed and verified but not submitted",
            );
            return Ok(CycleOutcome::DryRun);
        }

        if Instant::now() >= deadline {
            return Err(SchedulerError::DeadlinePassed);
        }
        self.ensure_current(generation)?;

        info!(
            block_hash = %submission.block_hash(),
            value = %submission.value(),
            algo = %block.algo,
            num_txs = block.transactions.len(),
            "submitting block",
        );
        self.submitter
            .submit_block(Arc::new(submission))
            .await
            .map_err(|err| SchedulerError::Submission(err.to_string()))?;

        Ok(CycleOutcome::Submitted)
    }

    fn sign_bid(
        &self,
        attrs: &PayloadAttributes,
        block: &CandidateBlock,
        payload: ExecutableData,
    ) -> SignedBidSubmission {
        let message = BidTrace {
            slot: attrs.slot,
            parent_hash: payload.parent_hash,
            block_hash: payload.block_hash,
            builder_pubkey: self.signing.pubkey().clone(),
            proposer_pubkey: attrs.proposer_pubkey.clone(),
            proposer_fee_recipient: attrs.fee_recipient,
            gas_limit: payload.gas_limit,
            gas_used: payload.gas_used,
            value: block.value,
        };
        let signature = self.signing.sign_builder_message(&message).into();

        SignedBidSubmission { message, execution_payload: payload, signature }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn ensure_current(&self, generation: u64) -> Result<(), SchedulerError> {
        if self.is_current(generation) {
            Ok(())
        } else {
            Err(SchedulerError::Cancelled)
        }
    }

    /// Only the latest cycle may move the state machine.
    fn set_state(&self, generation: u64, next: SchedulerState) {
        let mut state = self.state.lock();
        if self.is_current(generation) {
            *state = next;
        }
    }
}

impl<A: BuilderApi> Worker for Scheduler<A> {
    fn start(&self) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("block building started");
        }
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            // in-flight cycles must not submit after a stop
            self.generation.fetch_add(1, Ordering::SeqCst);
            *self.state.lock() = SchedulerState::Idle;
            info!("block building stopped");
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.stop();
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{FixedBytes, U256};
    use crucible_common::{utils::utcnow_sec, AlgoType, ChainConfig, ChainInfo};
    use crucible_types::BlsKeypair;

    use super::*;
    use crate::{
        pool::BundlePool,
        test_utils::{attrs, bundle, tx, MockEngine, RecordingSubmitter, TestApi, TxSpec},
    };

    struct Setup {
        scheduler: Arc<Scheduler<TestApi>>,
        engine: Arc<MockEngine>,
        submitter: Arc<RecordingSubmitter>,
        slot: u64,
    }

    fn setup(limiter: RateLimiter, dry_run: bool, fail_submit: bool) -> Setup {
        // one second into slot 0, so bids for slot 1 have most of a slot left
        setup_with_genesis(utcnow_sec() - 1, limiter, dry_run, fail_submit)
    }

    fn setup_with_genesis(
        genesis_time: u64,
        limiter: RateLimiter,
        dry_run: bool,
        fail_submit: bool,
    ) -> Setup {
        let engine = Arc::new(MockEngine::default());
        engine.set(tx(1), TxSpec::new(100_000, 1_000));
        engine.set(tx(2), TxSpec::new(50_000, 900));

        let pool = Arc::new(BundlePool::new());
        pool.insert(bundle(&[1]));
        pool.insert(bundle(&[2]));

        let chain_info = Arc::new(ChainInfo::new(&ChainConfig {
            genesis_time,
            seconds_in_slot: 12,
            genesis_fork_version: FixedBytes::ZERO,
        }));
        let slot = chain_info.current_slot() + 1;
        let signing = Arc::new(SigningContext::new(BlsKeypair::random(), chain_info));

        let submitter = Arc::new(RecordingSubmitter { fail: fail_submit, ..Default::default() });
        let assembler = BlockAssembler::new(
            engine.clone(),
            vec![AlgoType::MevGeth, AlgoType::Greedy],
            AlgoSettings::default(),
            30_000_000,
        );
        let scheduler = Arc::new(Scheduler::<TestApi>::new(
            engine.clone(),
            assembler,
            pool,
            submitter.clone(),
            signing,
            limiter,
            Duration::from_secs(3),
            dry_run,
        ));
        scheduler.start();

        Setup { scheduler, engine, submitter, slot }
    }

    fn default_limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_millis(500), 10)
    }

    #[tokio::test]
    async fn test_submits_signed_bid() {
        let Setup { scheduler, submitter, slot, .. } = setup(default_limiter(), false, false);

        let handle = scheduler.on_payload_attributes(attrs(slot)).unwrap();
        assert_eq!(handle.await.unwrap().unwrap(), CycleOutcome::Submitted);

        let submissions = submitter.submissions.lock().clone();
        assert_eq!(submissions.len(), 1);
        let submission = &submissions[0];
        assert_eq!(submission.slot(), slot);
        assert_eq!(submission.value(), U256::from(1_900));
        assert_eq!(submission.message.gas_used, 150_000);
        assert_eq!(submission.execution_payload.transactions.len(), 2);
        assert!(submission.verify_signature(scheduler.signing.builder_domain()).is_ok());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_duplicate_and_stale_slots_dropped() {
        let Setup { scheduler, submitter, slot, .. } = setup(default_limiter(), false, false);

        let handle = scheduler.on_payload_attributes(attrs(slot)).unwrap();
        assert!(scheduler.on_payload_attributes(attrs(slot)).is_none());
        assert!(scheduler.on_payload_attributes(attrs(slot - 1)).is_none());
        handle.await.unwrap().unwrap();

        assert_eq!(submitter.slots(), vec![slot]);
    }

    #[tokio::test]
    async fn test_rate_limited_event_does_not_mark_slot() {
        let limiter = RateLimiter::new(Duration::from_millis(300), 1);
        let Setup { scheduler, submitter, slot, .. } = setup(limiter, false, false);

        let first = scheduler.on_payload_attributes(attrs(slot)).unwrap();
        first.await.unwrap().unwrap();
        assert!(scheduler.on_payload_attributes(attrs(slot + 1)).is_none());

        tokio::time::sleep(Duration::from_millis(400)).await;
        let second = scheduler.on_payload_attributes(attrs(slot + 1)).unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(submitter.slots(), vec![slot, slot + 1]);
    }

    #[tokio::test]
    async fn test_newer_slot_cancels_older_cycle() {
        let Setup { scheduler, engine, submitter, slot } = setup(default_limiter(), false, false);
        engine.set_delay(Duration::from_millis(50));

        let older = scheduler.on_payload_attributes(attrs(slot)).unwrap();
        let newer = scheduler.on_payload_attributes(attrs(slot + 1)).unwrap();

        assert!(matches!(older.await.unwrap(), Err(SchedulerError::Cancelled)));
        assert_eq!(newer.await.unwrap().unwrap(), CycleOutcome::Submitted);

        assert_eq!(submitter.slots(), vec![slot + 1]);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_stop_discards_in_flight_cycle() {
        let Setup { scheduler, engine, submitter, slot } = setup(default_limiter(), false, false);
        engine.set_delay(Duration::from_millis(50));

        let handle = scheduler.on_payload_attributes(attrs(slot)).unwrap();
        scheduler.stop();

        assert!(matches!(handle.await.unwrap(), Err(SchedulerError::Cancelled)));
        assert!(submitter.slots().is_empty());
        assert!(scheduler.on_payload_attributes(attrs(slot + 1)).is_none());
    }

    #[tokio::test]
    async fn test_dry_run_never_submits() {
        let Setup { scheduler, engine, submitter, slot } = setup(default_limiter(), true, false);

        let handle = scheduler.on_payload_attributes(attrs(slot)).unwrap();
        assert_eq!(handle.await.unwrap().unwrap(), CycleOutcome::DryRun);

        assert_eq!(engine.seals(), 1);
        assert!(submitter.slots().is_empty());
    }

    #[tokio::test]
    async fn test_slot_failures_do_not_stop_scheduler() {
        let Setup { scheduler, engine, submitter, slot } = setup(default_limiter(), false, false);

        // nothing simulates successfully
        engine.fail_engine_on(tx(1));
        engine.fail_engine_on(tx(2));
        let handle = scheduler.on_payload_attributes(attrs(slot)).unwrap();
        assert!(matches!(
            handle.await.unwrap(),
            Err(SchedulerError::Assembly(AssemblyError::NoViableBlock))
        ));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(submitter.slots().is_empty());

        assert!(scheduler.on_payload_attributes(attrs(slot + 1)).is_some());
    }

    #[tokio::test]
    async fn test_relay_failure_reported() {
        let Setup { scheduler, submitter, slot, .. } = setup(default_limiter(), false, true);

        let handle = scheduler.on_payload_attributes(attrs(slot)).unwrap();
        assert!(matches!(handle.await.unwrap(), Err(SchedulerError::Submission(_))));
        assert_eq!(submitter.slots(), vec![slot]);
    }

    #[tokio::test]
    async fn test_past_deadline_skipped() {
        let Setup { scheduler, engine, submitter, .. } =
            setup_with_genesis(1_000, default_limiter(), false, false);

        let handle = scheduler.on_payload_attributes(attrs(1)).unwrap();
        assert!(matches!(handle.await.unwrap(), Err(SchedulerError::DeadlinePassed)));
        assert_eq!(engine.seals(), 0);
        assert!(submitter.slots().is_empty());
    }

    #[tokio::test]
    async fn test_started_proposal_slot_skipped() {
        // 4s into slot 0: the proposer is already asking for headers
        let Setup { scheduler, engine, submitter, .. } =
            setup_with_genesis(utcnow_sec() - 4, default_limiter(), false, false);

        let handle = scheduler.on_payload_attributes(attrs(0)).unwrap();
        assert!(matches!(handle.await.unwrap(), Err(SchedulerError::DeadlinePassed)));
        assert_eq!(engine.seals(), 0);
        assert!(submitter.slots().is_empty());
    }

    #[tokio::test]
    async fn test_offset_before_proposal_slot_skipped() {
        // slot 0 starts in 2s, inside the 3s offset
        let Setup { scheduler, submitter, .. } =
            setup_with_genesis(utcnow_sec() + 2, default_limiter(), false, false);

        let handle = scheduler.on_payload_attributes(attrs(0)).unwrap();
        assert!(matches!(handle.await.unwrap(), Err(SchedulerError::DeadlinePassed)));
        assert!(submitter.slots().is_empty());
    }

    #[tokio::test]
    async fn test_run_consumes_channel() {
        let Setup { scheduler, submitter, slot, .. } = setup(default_limiter(), false, false);
        let (tx, rx) = mpsc::channel(8);

        let runner = tokio::spawn(scheduler.clone().run(rx));
        tx.send(attrs(slot)).await.unwrap();
        tx.send(attrs(slot)).await.unwrap();
        drop(tx);
        runner.await.unwrap();

        for _ in 0..50 {
            if !submitter.slots().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(submitter.slots(), vec![slot]);
    }
}
