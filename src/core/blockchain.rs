// This is the consensus core of the node: the chain of sealed blocks, the pending
// pool with its duplicate index, and the ledgers that hold every balance.
// One Blockchain value is shared (cloned) by the RPC and peer threads.
//
// Lock order is always pool -> blocks. Ledger stripe locks are taken inside
// either, never the other way around, and the mining mutex is outermost.

use crate::core::monetary::{
    DEFAULT_CHAIN_ID, DEFAULT_DIFFICULTY, DEFAULT_FAUCET_AMOUNT, DEFAULT_MINING_REWARD,
};
use crate::core::raw_tx::{contract_address, decode_raw_transaction};
use crate::core::{
    scaled_reward, Address, Amount, Block, ContentScorer, ContractRegistry, DeployedContract,
    PendingPool, Transaction,
};
use crate::error::{BlockchainError, Result};
use crate::ledger::{BalanceLedger, NonceLedger};
use crate::storage::{BlockStore, LedgerStore, MemoryStore, SledStore};
use crate::utils::current_timestamp;
use log::{debug, info, warn};
use num_bigint::{BigInt, BigUint};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use uuid::Uuid;

/// Consensus and economic parameters, fixed for the node's lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    pub difficulty: u32,
    pub mining_reward: Amount,
    pub faucet_amount: Amount,
    pub chain_id: u64,
}

impl Default for ChainParams {
    fn default() -> Self {
        ChainParams {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: BigUint::from(DEFAULT_MINING_REWARD),
            faucet_amount: BigUint::from(DEFAULT_FAUCET_AMOUNT),
            chain_id: DEFAULT_CHAIN_ID,
        }
    }
}

/// Result of accepting a raw signed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub tx_hash: String,
    pub contract_address: Option<Address>,
}

/// Where a transaction currently lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionLocation {
    Pending,
    Sealed { block_index: u64, block_hash: String },
}

#[derive(Clone)]
pub struct Blockchain {
    inner: Arc<ChainState>,
}

struct ChainState {
    blocks: RwLock<Vec<Block>>,
    pool: Mutex<PendingPool>,
    // At most one minePending per node
    mining: Mutex<()>,
    balances: BalanceLedger,
    nonces: NonceLedger,
    contracts: ContractRegistry,
    params: ChainParams,
    scorer: RwLock<Option<Arc<dyn ContentScorer>>>,
    block_store: Option<BlockStore>,
}

impl Blockchain {
    /// Genesis-only chain over `store`, nothing persisted for blocks
    pub fn new(store: Arc<dyn LedgerStore>, params: ChainParams) -> Result<Blockchain> {
        Self::build(store, None, vec![Block::genesis()?], params)
    }

    /// Throwaway chain with an in-memory ledger
    pub fn in_memory(params: ChainParams) -> Result<Blockchain> {
        Self::new(Arc::new(MemoryStore::new()), params)
    }

    /// Chain and ledger persisted in the node's sled database. A stored chain
    /// that fails validation is discarded in favour of genesis.
    pub fn open(db: &sled::Db, params: ChainParams) -> Result<Blockchain> {
        let store = Arc::new(SledStore::open(db)?);
        let block_store = BlockStore::open(db)?;

        let stored = block_store.load()?;
        let blocks = if !stored.is_empty() && Self::is_valid(&stored) {
            info!("Loaded {} blocks from storage", stored.len());
            stored
        } else {
            if !stored.is_empty() {
                warn!("Stored chain failed validation, starting from genesis");
            }
            let genesis = vec![Block::genesis()?];
            block_store.replace_all(&genesis)?;
            genesis
        };

        Self::build(store, Some(block_store), blocks, params)
    }

    fn build(
        store: Arc<dyn LedgerStore>,
        block_store: Option<BlockStore>,
        blocks: Vec<Block>,
        params: ChainParams,
    ) -> Result<Blockchain> {
        Ok(Blockchain {
            inner: Arc::new(ChainState {
                blocks: RwLock::new(blocks),
                pool: Mutex::new(PendingPool::new()),
                mining: Mutex::new(()),
                balances: BalanceLedger::new(Arc::clone(&store)),
                nonces: NonceLedger::new(store),
                contracts: ContractRegistry::new(),
                params,
                scorer: RwLock::new(None),
                block_store,
            }),
        })
    }

    /// Scale mining rewards by the scorer's rating of each sealed batch
    pub fn set_scorer(&self, scorer: Arc<dyn ContentScorer>) {
        *self
            .inner
            .scorer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(scorer);
    }

    fn pool(&self) -> MutexGuard<'_, PendingPool> {
        self.inner.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_blocks(&self) -> RwLockReadGuard<'_, Vec<Block>> {
        self.inner
            .blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_blocks(&self) -> RwLockWriteGuard<'_, Vec<Block>> {
        self.inner
            .blocks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept a raw signed Ethereum transaction.
    ///
    /// Debits `value + gasLimit * gasUnitPrice` from the recovered sender and
    /// credits `value` to the receiver in one ledger batch, registers the
    /// bytecode when there is no receiver and queues the transaction. The
    /// sender's nonce is advanced after the funds check and before the batch.
    /// Raw transactions skip the duplicate index.
    pub fn submit_signed(&self, raw_tx: &str) -> Result<SubmitOutcome> {
        let decoded = decode_raw_transaction(raw_tx)?;
        let sender = decoded.sender.clone();

        let tx = Transaction::new(
            Some(sender.clone()),
            decoded.receiver.clone(),
            decoded.data,
            decoded.gas_limit,
            decoded.value,
        )?
        .with_signature(decoded.signature);

        let (tx, deployed_at) = match decoded.receiver {
            Some(_) => (tx, None),
            None => {
                let address = contract_address(&sender, decoded.nonce)?;
                (tx.with_receiver(address.clone()), Some(address))
            }
        };
        let tx_hash = tx.compute_hash()?;

        let total_cost = tx.total_cost();
        let available = self.inner.balances.get(&sender)?;
        if available < total_cost {
            return Err(BlockchainError::InsufficientFunds {
                required: total_cost,
                available,
            });
        }

        // Nonce first: a failed nonce write must leave funds and the pool untouched
        let nonce = self.inner.nonces.next(&sender)?;

        let mut changes = vec![(sender.clone(), -BigInt::from(total_cost))];
        if deployed_at.is_none() {
            if let Some(receiver) = tx.get_receiver() {
                changes.push((receiver.clone(), BigInt::from(tx.get_value().clone())));
            }
        }
        self.inner.balances.apply(&changes)?;

        if let Some(address) = &deployed_at {
            let (height, tip_hash) = {
                let blocks = self.read_blocks();
                let tip_hash = blocks
                    .last()
                    .map(|block| block.get_hash().to_string())
                    .unwrap_or_default();
                (blocks.len() as u64, tip_hash)
            };
            self.inner.contracts.deploy(
                DeployedContract {
                    address: address.clone(),
                    deployer: sender.clone(),
                    bytecode: tx.get_payload().to_vec(),
                    deployed_by_tx: tx_hash.clone(),
                    deployed_at: tx.get_timestamp(),
                    storage: BTreeMap::new(),
                },
                height,
                &tip_hash,
            );
            info!("Contract deployed at {address} by {sender}");
        }

        self.pool().push(tx);
        info!("Accepted signed transaction {tx_hash} from {sender} (nonce {nonce})");

        Ok(SubmitOutcome {
            tx_hash,
            contract_address: deployed_at,
        })
    }

    /// Admit a reconstructed transaction (peer relay, RPC) into the pool.
    ///
    /// Duplicate payloads are rejected first. System transactions credit their
    /// receiver; signed ones must verify and then move `value` plus gas.
    pub fn admit(&self, tx: Transaction) -> Result<String> {
        let tx_hash = tx.compute_hash()?;
        let mut pool = self.pool();
        pool.check_admissible(&tx)?;

        let changes = match tx.get_sender() {
            None => {
                let receiver = tx.get_receiver().ok_or_else(|| {
                    BlockchainError::InvalidRecipient(
                        "system transaction without a receiver".to_string(),
                    )
                })?;
                vec![(receiver.clone(), BigInt::from(tx.get_value().clone()))]
            }
            Some(sender) => {
                if !tx.is_valid()? {
                    return Err(BlockchainError::InvalidSignature);
                }
                let mut changes = vec![(sender.clone(), -BigInt::from(tx.total_cost()))];
                if let Some(receiver) = tx.get_receiver() {
                    changes.push((receiver.clone(), BigInt::from(tx.get_value().clone())));
                }
                changes
            }
        };
        self.inner.balances.apply(&changes)?;

        pool.admit(tx)?;
        info!("Admitted transaction {tx_hash} ({} pending)", pool.len());
        Ok(tx_hash)
    }

    /// Admit a privileged (sender-less) transaction such as a reward or grant
    pub fn submit_system(&self, tx: Transaction) -> Result<String> {
        if !tx.is_system() {
            return Err(BlockchainError::InvalidTransaction(
                "system transactions carry no sender".to_string(),
            ));
        }
        self.admit(tx)
    }

    /// Grant the configured faucet amount to `address`
    pub fn faucet(&self, address: &Address) -> Result<String> {
        let payload = format!("faucet:{address}:{}", Uuid::new_v4()).into_bytes();
        let tx = Transaction::new_system(
            address.clone(),
            payload,
            self.inner.params.faucet_amount.clone(),
        )?;
        self.submit_system(tx)
    }

    pub fn is_duplicate(&self, tx: &Transaction) -> bool {
        self.pool().is_duplicate(tx)
    }

    /// Seal the pending pool into a new block and pay `miner`.
    /// Returns `None` without side effects when the pool is empty.
    pub fn mine_pending(&self, miner: &Address) -> Result<Option<String>> {
        self.mine_pending_with_cancel(miner, &AtomicBool::new(false))
    }

    /// [`Blockchain::mine_pending`] that gives up when `cancel` is raised.
    ///
    /// The pool is only snapshotted while sealing; sealed transactions leave
    /// the pool in the same critical section that appends the block, so a
    /// cancelled run changes nothing.
    pub fn mine_pending_with_cancel(
        &self,
        miner: &Address,
        cancel: &AtomicBool,
    ) -> Result<Option<String>> {
        let _mining = self
            .inner
            .mining
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        loop {
            let (snapshot, index, previous_hash) = {
                let pool = self.pool();
                if pool.is_empty() {
                    debug!("Nothing to mine");
                    return Ok(None);
                }
                let blocks = self.read_blocks();
                let tip = blocks
                    .last()
                    .ok_or_else(|| BlockchainError::InvalidChain("empty chain".to_string()))?;
                (pool.get_all(), blocks.len() as u64, tip.get_hash().to_string())
            };
            let sealed_count = snapshot.len();
            let reward = self.reward_for(&snapshot, miner);

            info!(
                "Mining block {index} with {sealed_count} transactions (difficulty {})",
                self.inner.params.difficulty
            );
            let mut block = Block::new_block(index, current_timestamp()?, snapshot, previous_hash)?;
            if !block.mine_with_cancel(self.inner.params.difficulty, cancel)? {
                return Err(BlockchainError::Mining("mining cancelled".to_string()));
            }
            let block = block.with_miner_reward(reward.clone());

            {
                let mut pool = self.pool();
                let mut blocks = self.write_blocks();
                let tip_moved = blocks.len() as u64 != index
                    || blocks.last().map(|tip| tip.get_hash()) != Some(block.get_previous_hash());
                if tip_moved {
                    warn!("Chain tip moved while mining block {index}, rebuilding");
                    continue;
                }
                if let Some(store) = &self.inner.block_store {
                    store.append(&block)?;
                }
                pool.remove_sealed(sealed_count);
                blocks.push(block.clone());
            }

            self.inner
                .balances
                .adjust(miner, &BigInt::from(reward.clone()))?;
            info!(
                "Mined block {index}: {} (reward {reward} to {miner})",
                block.get_hash()
            );
            return Ok(Some(block.get_hash().to_string()));
        }
    }

    fn reward_for(&self, transactions: &[Transaction], miner: &Address) -> Amount {
        let base = self.inner.params.mining_reward.clone();
        let scorer = self
            .inner
            .scorer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(scorer) = scorer else {
            return base;
        };

        let payload: Vec<u8> = transactions
            .iter()
            .flat_map(|tx| tx.get_payload().iter().copied())
            .collect();
        match scorer.score(&payload, miner) {
            Ok(score) => scaled_reward(&base, score),
            Err(e) => {
                warn!("Content scorer failed, paying base reward: {e}");
                base
            }
        }
    }

    /// Structural check: every hash recomputes and each block links to its
    /// predecessor. Proof-of-work difficulty is not re-checked.
    pub fn is_valid(chain: &[Block]) -> bool {
        let Some(first) = chain.first() else {
            return false;
        };
        first.has_consistent_hash()
            && chain.windows(2).all(|pair| {
                pair[1].get_previous_hash() == pair[0].get_hash() && pair[1].has_consistent_hash()
            })
    }

    /// Longest-valid-chain fork choice. Adopts `candidate` only when it is
    /// strictly longer and valid; otherwise nothing changes.
    pub fn try_replace(&self, candidate: Vec<Block>) -> Result<bool> {
        let current_len = self.len();
        if candidate.len() <= current_len {
            debug!(
                "Ignoring candidate chain of {} blocks (have {current_len})",
                candidate.len()
            );
            return Ok(false);
        }
        if !Self::is_valid(&candidate) {
            info!("Rejected candidate chain of {} blocks: invalid", candidate.len());
            return Ok(false);
        }

        let mut blocks = self.write_blocks();
        if candidate.len() <= blocks.len() {
            return Ok(false);
        }
        if let Some(store) = &self.inner.block_store {
            store.replace_all(&candidate)?;
        }
        info!(
            "Replaced chain of {} blocks with {} blocks",
            blocks.len(),
            candidate.len()
        );
        *blocks = candidate;
        Ok(true)
    }

    /// Every sealed transaction in block order
    pub fn all_transactions(&self) -> Vec<Transaction> {
        self.read_blocks()
            .iter()
            .flat_map(|block| block.get_transactions().iter().cloned())
            .collect()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.pool().get_all()
    }

    pub fn pending_count(&self) -> usize {
        self.pool().len()
    }

    /// Look a transaction up by hash, pending pool first
    pub fn find_transaction(&self, tx_hash: &str) -> Option<(Transaction, TransactionLocation)> {
        let matches = |tx: &Transaction| {
            tx.compute_hash()
                .map(|hash| hash.eq_ignore_ascii_case(tx_hash))
                .unwrap_or(false)
        };

        if let Some(tx) = self.pool().iter().find(|tx| matches(tx)) {
            return Some((tx.clone(), TransactionLocation::Pending));
        }
        self.read_blocks().iter().find_map(|block| {
            block
                .get_transactions()
                .iter()
                .find(|tx| matches(tx))
                .map(|tx| {
                    (
                        tx.clone(),
                        TransactionLocation::Sealed {
                            block_index: block.get_index(),
                            block_hash: block.get_hash().to_string(),
                        },
                    )
                })
        })
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.read_blocks().clone()
    }

    pub fn len(&self) -> usize {
        self.read_blocks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_blocks().is_empty()
    }

    pub fn tip(&self) -> Option<Block> {
        self.read_blocks().last().cloned()
    }

    pub fn block_by_number(&self, index: u64) -> Option<Block> {
        let position = usize::try_from(index).ok()?;
        self.read_blocks().get(position).cloned()
    }

    /// Hash match is case-insensitive and tolerates a `0x` prefix
    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        let wanted = hash.strip_prefix("0x").unwrap_or(hash);
        self.read_blocks()
            .iter()
            .find(|block| block.get_hash().eq_ignore_ascii_case(wanted))
            .cloned()
    }

    pub fn balance(&self, address: &Address) -> Result<Amount> {
        self.inner.balances.get(address)
    }

    pub fn transaction_count(&self, address: &Address) -> Result<u64> {
        self.inner.nonces.current(address)
    }

    pub fn balances(&self) -> &BalanceLedger {
        &self.inner.balances
    }

    pub fn nonces(&self) -> &NonceLedger {
        &self.inner.nonces
    }

    pub fn contracts(&self) -> &ContractRegistry {
        &self.inner.contracts
    }

    pub fn params(&self) -> &ChainParams {
        &self.inner.params
    }
}
