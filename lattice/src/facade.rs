//! The lattice facade.
//!
//! Owns every mutable subsystem — pool, lattice data, strong-ack closure,
//! total ordering, consensus timestamp — behind a single reader-writer lock.
//! They form one invariant boundary; no partial locking is safe. Sub-modules
//! return data and the facade dispatches: database writes happen inline,
//! application callbacks are queued and fired only after every write of the
//! call has succeeded.

use crate::authenticator::Authenticator;
use crate::broadcast::ReliableBroadcast;
use crate::data::LatticeData;
use crate::error::LatticeError;
use crate::interfaces::{Application, DebugHooks, Governance};
use crate::ordering::TotalOrdering;
use crate::pool::BlockPool;
use crate::timestamp::ConsensusTimestamp;
use braid_store::BlockDatabase;
use braid_types::{Block, BlockHash, KeyPair, LatticeConfig, NodeId, Position, Timestamp};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Cooperative cancellation token shared with the node's driving loops.
///
/// Once cancelled, every subsequent facade operation returns
/// [`LatticeError::Cancelled`]; an in-flight `process_block` completes.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result of one `process_block` call.
pub struct ProcessOutput {
    /// Previously shelved blocks that passed sanity this time; they were
    /// admitted within the same call.
    pub rechecked: Vec<Block>,
    /// Blocks delivered to the application, final timestamps assigned.
    pub delivered: Vec<Block>,
}

/// Callback queued during `process_block`, fired after persistence.
enum Event {
    StronglyAcked(BlockHash),
    Confirmed(BlockHash),
    OrderingDelivered(Vec<BlockHash>, bool),
    Delivered(Block),
}

struct Inner {
    pool: BlockPool,
    data: LatticeData,
    broadcast: ReliableBroadcast,
    ordering: TotalOrdering,
    timestamp: ConsensusTimestamp,
    last_round: u64,
}

/// The block-lattice consensus core for one node.
pub struct Lattice {
    authenticator: Authenticator,
    app: Arc<dyn Application>,
    debug: Option<Arc<dyn DebugHooks>>,
    db: Arc<dyn BlockDatabase>,
    cancel: CancelToken,
    inner: RwLock<Inner>,
}

impl Lattice {
    pub fn new(
        config: LatticeConfig,
        keypair: KeyPair,
        app: Arc<dyn Application>,
        debug: Option<Arc<dyn DebugHooks>>,
        db: Arc<dyn BlockDatabase>,
    ) -> Self {
        let inner = Inner {
            pool: BlockPool::new(config.num_chains),
            data: LatticeData::new(config.clone()),
            broadcast: ReliableBroadcast::new(config.clone()),
            ordering: TotalOrdering::new(&config),
            timestamp: ConsensusTimestamp::new(config.num_chains),
            last_round: 0,
        };
        Self {
            authenticator: Authenticator::new(keypair),
            app,
            debug,
            db,
            cancel: CancelToken::new(),
            inner: RwLock::new(inner),
        }
    }

    /// The local node's identity.
    pub fn node_id(&self) -> NodeId {
        self.authenticator.node_id()
    }

    /// A handle the node's loops use to stop the facade.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn check_cancelled(&self) -> Result<(), LatticeError> {
        if self.cancel.is_cancelled() {
            return Err(LatticeError::Cancelled);
        }
        Ok(())
    }

    /// Fill in every lattice- and application-derived field of a block the
    /// local node proposes on `b.position.chain_id`, then sign it.
    pub fn prepare_block(
        &self,
        b: &mut Block,
        propose_time: Timestamp,
    ) -> Result<(), LatticeError> {
        self.check_cancelled()?;
        if b.proposer.is_empty() {
            return Err(LatticeError::MissingBlockInfo { field: "proposer" });
        }
        let inner = self.inner.read().expect("lattice lock poisoned");
        inner.data.prepare_block(b, propose_time)?;
        b.payload = self.app.prepare_payload(b.position);
        b.witness = self.app.prepare_witness(b.witness.height);
        self.authenticator.sign_block(b);
        Ok(())
    }

    /// Prepare the height-0 block of a chain: no parent, no acks, and a
    /// payload-free body.
    pub fn prepare_genesis_block(
        &self,
        b: &mut Block,
        propose_time: Timestamp,
    ) -> Result<(), LatticeError> {
        self.check_cancelled()?;
        if b.proposer.is_empty() {
            return Err(LatticeError::MissingBlockInfo { field: "proposer" });
        }
        if !b.payload.is_empty() {
            return Err(LatticeError::GenesisBlockNotEmpty);
        }
        b.position.round = 0;
        b.position.height = 0;
        b.parent = BlockHash::ZERO;
        b.acks.clear();
        b.timestamp = propose_time;
        b.witness = self.app.prepare_witness(b.witness.height);
        self.authenticator.sign_block(b);
        Ok(())
    }

    /// Check a foreign block against signature, application, and lattice
    /// rules.
    ///
    /// A block whose acked blocks are unknown is shelved in the pool as a
    /// side effect — the error is still returned — and retried automatically
    /// once the lattice advances.
    pub fn sanity_check(&self, b: &Block) -> Result<(), LatticeError> {
        self.check_cancelled()?;
        self.authenticator.verify_block(b)?;
        if !self.app.verify_block(b) {
            return Err(LatticeError::InvalidBlock);
        }
        let mut inner = self.inner.write().expect("lattice lock poisoned");
        match inner.data.sanity_check(b) {
            Ok(()) => Ok(()),
            Err(e) if e.is_recoverable() => {
                inner.pool.add(b.clone());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Admit a block, replay any shelved blocks it unblocks, run strong-ack
    /// extraction and total ordering, stamp and persist delivered blocks.
    ///
    /// Must only be called for blocks that passed [`Self::sanity_check`].
    /// Application callbacks fire only after every database write of this
    /// call has succeeded.
    pub fn process_block(&self, block: &Block) -> Result<ProcessOutput, LatticeError> {
        self.check_cancelled()?;
        // Operate on a clone so the caller cannot mutate admitted state.
        let input = block.clone();

        let mut inner = self.inner.write().expect("lattice lock poisoned");
        let inner = &mut *inner;
        let mut events: Vec<Event> = Vec::new();
        let mut rechecked: Vec<Block> = Vec::new();
        let mut delivered: Vec<Block> = Vec::new();

        let mut queue: VecDeque<Block> = VecDeque::from([input]);
        while let Some(b) = queue.pop_front() {
            inner.data.add_block(&b)?;
            self.db.put(&b)?;
            events.push(Event::StronglyAcked(b.hash));
            events.push(Event::Confirmed(b.hash));

            // The chain advanced: drop superseded shelf entries, then replay
            // the shelf tips that have become valid.
            inner
                .pool
                .purge_below(b.position.chain_id, b.position.height);
            for c in 0..inner.pool.num_chains() {
                let Some(tip) = inner.pool.tip(c).cloned() else {
                    continue;
                };
                match inner.data.sanity_check(&tip) {
                    Ok(()) => {
                        inner.pool.remove_tip(c);
                        rechecked.push(tip.clone());
                        queue.push_back(tip);
                    }
                    Err(e) if e.is_recoverable() => {}
                    Err(e) => {
                        tracing::warn!(block = %tip.hash, error = %e, "dropping shelved block");
                        inner.pool.remove_tip(c);
                    }
                }
            }

            for acked in inner.broadcast.process(&b) {
                for mut batch in inner.ordering.process_block(acked)? {
                    let hashes: Vec<BlockHash> =
                        batch.blocks.iter().map(|d| d.hash).collect();
                    events.push(Event::OrderingDelivered(hashes, batch.early));
                    inner.timestamp.process_batch(&mut batch.blocks)?;
                    for d in &batch.blocks {
                        self.db.update(d)?;
                        events.push(Event::Delivered(d.clone()));
                    }
                    delivered.extend(batch.blocks);
                }
            }
        }

        // Persistence succeeded in full; release the queued callbacks.
        for event in events {
            match event {
                Event::StronglyAcked(h) => {
                    if let Some(debug) = &self.debug {
                        debug.strongly_acked(h);
                    }
                }
                Event::Confirmed(h) => {
                    if let Some(debug) = &self.debug {
                        debug.block_confirmed(h);
                    }
                }
                Event::OrderingDelivered(hashes, early) => {
                    if let Some(debug) = &self.debug {
                        debug.total_ordering_delivered(hashes, early);
                    }
                }
                Event::Delivered(b) => self.app.block_delivered(b),
            }
        }

        Ok(ProcessOutput {
            rechecked,
            delivered,
        })
    }

    /// The position the next block on `chain_id` must claim.
    pub fn next_position(&self, chain_id: u32) -> Position {
        let inner = self.inner.read().expect("lattice lock poisoned");
        inner.data.next_position(chain_id)
    }

    /// Append the configuration for round `last + 1` and propagate it to
    /// every subsystem.
    pub fn append_config(
        &self,
        round: u64,
        config: LatticeConfig,
    ) -> Result<(), LatticeError> {
        self.check_cancelled()?;
        let mut inner = self.inner.write().expect("lattice lock poisoned");
        let expected = inner.last_round + 1;
        if round != expected {
            return Err(LatticeError::ConfigOutOfOrder { round, expected });
        }
        inner.data.append_config(round, config.clone())?;
        inner.broadcast.append_config(config.clone());
        inner.ordering.append_config(&config);
        inner.timestamp.append_config(config.num_chains);
        inner.pool.resize(config.num_chains);
        inner.last_round = round;
        tracing::info!(round, "config appended");
        Ok(())
    }

    /// Pull every round configuration governance has decided beyond the
    /// last appended one. Returns the last round known after catching up.
    pub fn catch_up(&self, governance: &dyn Governance) -> Result<u64, LatticeError> {
        loop {
            let next = {
                let inner = self.inner.read().expect("lattice lock poisoned");
                inner.last_round + 1
            };
            let Some(config) = governance.configuration(next) else {
                return Ok(next - 1);
            };
            self.append_config(next, config)?;
        }
    }
}
