use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{
        AccountAddress, EntityKind, ObjectId, PackageId, PizzaRecipe, RawRecipe,
        TransactionDigest,
    },
    error::ValidationError,
    protocol::{
        CallArg, CallDescriptor, CallTarget, ObjectData, TransactionEffects, COOK_FUNCTION,
        GET_FLAG_FUNCTION,
    },
};
use storage::Storage;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod rpc;
mod snapshot;
pub use snapshot::{decode_recipe, EntitySnapshot};

/// External wallet boundary: signs a call descriptor for the given account
/// and submits it, returning the transaction digest on acceptance.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign_and_execute(
        &self,
        account: &AccountAddress,
        call: CallDescriptor,
    ) -> Result<TransactionDigest>;
}

pub struct MissingSigner;

#[async_trait]
impl TransactionSigner for MissingSigner {
    async fn sign_and_execute(
        &self,
        account: &AccountAddress,
        _call: CallDescriptor,
    ) -> Result<TransactionDigest> {
        Err(anyhow!(
            "no transaction signer configured for account {account}; connect a wallet-backed signer"
        ))
    }
}

/// Read boundary against the ledger: finality wait plus object fetch.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn wait_for_transaction(
        &self,
        digest: &TransactionDigest,
    ) -> Result<TransactionEffects>;
    async fn get_object(&self, object_id: &ObjectId) -> Result<Option<ObjectData>>;
}

pub struct MissingLedgerReader;

#[async_trait]
impl LedgerReader for MissingLedgerReader {
    async fn wait_for_transaction(
        &self,
        digest: &TransactionDigest,
    ) -> Result<TransactionEffects> {
        Err(anyhow!("no ledger reader configured; cannot await {digest}"))
    }

    async fn get_object(&self, object_id: &ObjectId) -> Result<Option<ObjectData>> {
        Err(anyhow!("no ledger reader configured; cannot fetch {object_id}"))
    }
}

/// Durable per-account object-reference store.
#[async_trait]
pub trait ObjectRefStore: Send + Sync {
    async fn save_object_ref(
        &self,
        kind: EntityKind,
        account: &AccountAddress,
        object_id: &ObjectId,
    ) -> Result<()>;
    async fn load_object_ref(
        &self,
        kind: EntityKind,
        account: &AccountAddress,
    ) -> Result<Option<ObjectId>>;
    async fn clear_account_refs(&self, account: &AccountAddress) -> Result<u64>;
}

#[async_trait]
impl ObjectRefStore for Storage {
    async fn save_object_ref(
        &self,
        kind: EntityKind,
        account: &AccountAddress,
        object_id: &ObjectId,
    ) -> Result<()> {
        Storage::save_object_ref(self, kind, account, object_id).await
    }

    async fn load_object_ref(
        &self,
        kind: EntityKind,
        account: &AccountAddress,
    ) -> Result<Option<ObjectId>> {
        Ok(Storage::load_object_ref(self, kind, account)
            .await?
            .map(|stored| stored.object_id))
    }

    async fn clear_account_refs(&self, account: &AccountAddress) -> Result<u64> {
        Storage::clear_account_refs(self, account).await
    }
}

pub struct MissingObjectRefStore;

#[async_trait]
impl ObjectRefStore for MissingObjectRefStore {
    async fn save_object_ref(
        &self,
        kind: EntityKind,
        account: &AccountAddress,
        _object_id: &ObjectId,
    ) -> Result<()> {
        Err(anyhow!("no object store configured; cannot save {kind} for {account}"))
    }

    async fn load_object_ref(
        &self,
        kind: EntityKind,
        account: &AccountAddress,
    ) -> Result<Option<ObjectId>> {
        Err(anyhow!("no object store configured; cannot load {kind} for {account}"))
    }

    async fn clear_account_refs(&self, account: &AccountAddress) -> Result<u64> {
        Err(anyhow!("no object store configured; cannot clear refs for {account}"))
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no active account; connect a wallet first")]
    NoActiveAccount,
    #[error("a submission is already in flight; wait for it to settle")]
    Busy,
    #[error("transaction submission failed: {0}")]
    Submission(String),
    #[error("finality wait failed for {digest}: {message}")]
    FinalityWait {
        digest: TransactionDigest,
        message: String,
    },
    #[error("snapshot fetch failed: {0}")]
    SnapshotFetch(String),
    #[error("object reference store error: {0}")]
    Store(String),
    #[error("session changed while the operation was in flight")]
    Cancelled,
}

/// Workflow flags exposed to a presentation layer, consistent as of the last
/// completed step of the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowState {
    pub pending: bool,
    pub loading: bool,
    pub digest: Option<TransactionDigest>,
    pub error: Option<String>,
}

impl WorkflowState {
    pub fn confirmed(&self) -> bool {
        self.digest.is_some() && !self.pending && !self.loading
    }
}

/// One settled submission cycle: the digest plus the created object id, if
/// the action had object-creation semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub digest: TransactionDigest,
    pub created: Option<ObjectId>,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    AccountChanged(Option<AccountAddress>),
    TransactionSubmitted { digest: TransactionDigest },
    TransactionConfirmed { outcome: TransactionOutcome },
    SnapshotUpdated(EntitySnapshot),
    Error(String),
}

struct ControllerInner {
    account: Option<AccountAddress>,
    /// Bumped on every account switch; in-flight cycles re-check it after
    /// each await so a stale result cannot mutate the new session's state.
    generation: u64,
    in_flight: bool,
    state: WorkflowState,
    snapshot: EntitySnapshot,
}

/// Drives one submit → finality → extract → persist → refetch cycle per user
/// action against the external signer and read boundaries.
pub struct ContractClient {
    signer: Arc<dyn TransactionSigner>,
    ledger: Arc<dyn LedgerReader>,
    store: Arc<dyn ObjectRefStore>,
    package_id: PackageId,
    inner: Mutex<ControllerInner>,
    events: broadcast::Sender<ClientEvent>,
}

impl ContractClient {
    pub fn new(package_id: PackageId) -> Arc<Self> {
        Self::with_dependencies(
            package_id,
            Arc::new(MissingSigner),
            Arc::new(MissingLedgerReader),
            Arc::new(MissingObjectRefStore),
        )
    }

    pub fn with_dependencies(
        package_id: PackageId,
        signer: Arc<dyn TransactionSigner>,
        ledger: Arc<dyn LedgerReader>,
        store: Arc<dyn ObjectRefStore>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            signer,
            ledger,
            store,
            package_id,
            inner: Mutex::new(ControllerInner {
                account: None,
                generation: 0,
                in_flight: false,
                state: WorkflowState::default(),
                snapshot: EntitySnapshot::idle(),
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn active_account(&self) -> Option<AccountAddress> {
        self.inner.lock().await.account.clone()
    }

    pub async fn workflow_state(&self) -> WorkflowState {
        self.inner.lock().await.state.clone()
    }

    pub async fn entity_snapshot(&self) -> EntitySnapshot {
        self.inner.lock().await.snapshot.clone()
    }

    pub async fn pizza_box_id(&self) -> Result<Option<ObjectId>, WorkflowError> {
        self.stored_ref(EntityKind::PizzaBox).await
    }

    pub async fn flag_id(&self) -> Result<Option<ObjectId>, WorkflowError> {
        self.stored_ref(EntityKind::Flag).await
    }

    async fn stored_ref(&self, kind: EntityKind) -> Result<Option<ObjectId>, WorkflowError> {
        let Some(account) = self.active_account().await else {
            return Ok(None);
        };
        self.store
            .load_object_ref(kind, &account)
            .await
            .map_err(|err| WorkflowError::Store(err.to_string()))
    }

    /// Switches the session to another account (or to none). Any in-flight
    /// finality wait loses its right to mutate state or the store.
    pub async fn set_active_account(&self, account: Option<AccountAddress>) {
        {
            let mut inner = self.inner.lock().await;
            if inner.account == account {
                return;
            }
            inner.generation += 1;
            inner.in_flight = false;
            inner.account = account.clone();
            inner.state = WorkflowState::default();
            inner.snapshot = EntitySnapshot::idle();
        }
        let _ = self.events.send(ClientEvent::AccountChanged(account.clone()));

        if account.is_some() {
            if let Err(err) = self.refresh_snapshot().await {
                warn!("initial snapshot load failed: {err}");
            }
        }
    }

    /// Validates the recipe at the boundary, then runs a full submission
    /// cycle for `pizza::cook`. Out-of-range ingredients are rejected before
    /// anything reaches the signer.
    pub async fn cook_pizza(&self, raw: RawRecipe) -> Result<TransactionOutcome, WorkflowError> {
        let recipe = PizzaRecipe::from_raw(&raw)?;
        let call = CallDescriptor {
            target: CallTarget::contract(self.package_id.clone(), COOK_FUNCTION),
            arguments: recipe
                .as_args()
                .iter()
                .copied()
                .map(CallArg::PureU16)
                .collect(),
        };
        self.submit_and_settle(EntityKind::PizzaBox, call).await
    }

    /// Runs a submission cycle for `pizza::get_flag`. Without a stored pizza
    /// box reference this is a guarded no-op: nothing is submitted and the
    /// workflow state is untouched.
    pub async fn get_flag(&self) -> Result<Option<TransactionOutcome>, WorkflowError> {
        let account = self
            .active_account()
            .await
            .ok_or(WorkflowError::NoActiveAccount)?;
        let box_ref = self
            .store
            .load_object_ref(EntityKind::PizzaBox, &account)
            .await
            .map_err(|err| WorkflowError::Store(err.to_string()))?;
        let Some(box_ref) = box_ref else {
            info!("get_flag ignored: no pizza box reference stored for {account}");
            return Ok(None);
        };

        let call = CallDescriptor {
            target: CallTarget::contract(self.package_id.clone(), GET_FLAG_FUNCTION),
            arguments: vec![CallArg::Object(box_ref)],
        };
        self.submit_and_settle(EntityKind::Flag, call).await.map(Some)
    }

    /// Wipes both stored references and the error state for the active
    /// account. Safe to call repeatedly.
    pub async fn clear_object(&self) -> Result<(), WorkflowError> {
        let Some(account) = self.active_account().await else {
            return Ok(());
        };
        self.store
            .clear_account_refs(&account)
            .await
            .map_err(|err| WorkflowError::Store(err.to_string()))?;

        {
            let mut inner = self.inner.lock().await;
            inner.state.error = None;
            inner.snapshot = EntitySnapshot::idle();
        }
        let _ = self
            .events
            .send(ClientEvent::SnapshotUpdated(EntitySnapshot::idle()));
        info!("cleared stored object references for {account}");
        Ok(())
    }

    /// Fetches and decodes the pizza box for the active account. With no
    /// stored reference this resolves to the idle snapshot, which is not an
    /// error.
    pub async fn refresh_snapshot(&self) -> Result<EntitySnapshot, WorkflowError> {
        let (account, generation) = {
            let inner = self.inner.lock().await;
            match inner.account.clone() {
                Some(account) => (account, inner.generation),
                None => return Ok(EntitySnapshot::idle()),
            }
        };

        let box_ref = self
            .store
            .load_object_ref(EntityKind::PizzaBox, &account)
            .await
            .map_err(|err| WorkflowError::Store(err.to_string()))?;
        let Some(object_id) = box_ref else {
            return self.install_snapshot(generation, EntitySnapshot::idle()).await;
        };

        let record = match self.ledger.get_object(&object_id).await {
            Ok(record) => record,
            Err(err) => {
                let message = format!("failed to fetch object {object_id}: {err}");
                {
                    let mut inner = self.inner.lock().await;
                    if inner.generation == generation {
                        inner.state.error = Some(message.clone());
                    }
                }
                let _ = self.events.send(ClientEvent::Error(message.clone()));
                return Err(WorkflowError::SnapshotFetch(message));
            }
        };

        let snapshot = match record {
            None => EntitySnapshot {
                reference: Some(object_id),
                exists: false,
                has_valid_data: false,
                recipe: None,
            },
            Some(record) => {
                let recipe = decode_recipe(&record);
                if recipe.is_none() {
                    warn!(
                        object_id = %record.object_id,
                        "object exists but its fields do not match the pizza layout"
                    );
                }
                EntitySnapshot {
                    reference: Some(object_id),
                    exists: true,
                    has_valid_data: recipe.is_some(),
                    recipe,
                }
            }
        };

        self.install_snapshot(generation, snapshot).await
    }

    async fn install_snapshot(
        &self,
        generation: u64,
        snapshot: EntitySnapshot,
    ) -> Result<EntitySnapshot, WorkflowError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return Err(WorkflowError::Cancelled);
            }
            inner.snapshot = snapshot.clone();
        }
        let _ = self
            .events
            .send(ClientEvent::SnapshotUpdated(snapshot.clone()));
        Ok(snapshot)
    }

    async fn begin_cycle(&self) -> Result<(AccountAddress, u64), WorkflowError> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .account
            .clone()
            .ok_or(WorkflowError::NoActiveAccount)?;
        if inner.in_flight {
            return Err(WorkflowError::Busy);
        }
        inner.in_flight = true;
        inner.state.pending = true;
        inner.state.error = None;
        Ok((account, inner.generation))
    }

    /// Records a failed step. Returns false when the session changed while
    /// the step was in flight, in which case nothing was mutated.
    async fn fail_cycle(&self, generation: u64, message: String) -> bool {
        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                warn!("dropping stale transaction failure: {message}");
                return false;
            }
            inner.in_flight = false;
            inner.state.pending = false;
            inner.state.loading = false;
            inner.state.error = Some(message.clone());
        }
        let _ = self.events.send(ClientEvent::Error(message));
        true
    }

    async fn submit_and_settle(
        &self,
        kind: EntityKind,
        call: CallDescriptor,
    ) -> Result<TransactionOutcome, WorkflowError> {
        let (account, generation) = self.begin_cycle().await?;
        info!(call = %call.target, account = %account, "submitting transaction");

        let digest = match self.signer.sign_and_execute(&account, call).await {
            Ok(digest) => digest,
            Err(err) => {
                if !self
                    .fail_cycle(generation, format!("transaction submission failed: {err}"))
                    .await
                {
                    return Err(WorkflowError::Cancelled);
                }
                return Err(WorkflowError::Submission(err.to_string()));
            }
        };

        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                warn!(%digest, "session changed during submission; ignoring digest");
                return Err(WorkflowError::Cancelled);
            }
            inner.state.pending = false;
            inner.state.loading = true;
            inner.state.digest = Some(digest.clone());
        }
        let _ = self.events.send(ClientEvent::TransactionSubmitted {
            digest: digest.clone(),
        });

        let effects = match self.ledger.wait_for_transaction(&digest).await {
            Ok(effects) => effects,
            Err(err) => {
                if !self
                    .fail_cycle(generation, format!("finality wait failed for {digest}: {err}"))
                    .await
                {
                    return Err(WorkflowError::Cancelled);
                }
                return Err(WorkflowError::FinalityWait {
                    digest,
                    message: err.to_string(),
                });
            }
        };

        // A stale finality result must not reach the store either.
        {
            let inner = self.inner.lock().await;
            if inner.generation != generation {
                warn!(%digest, "session changed while awaiting finality; dropping result");
                return Err(WorkflowError::Cancelled);
            }
        }

        if !effects.status.is_success() {
            warn!(
                %digest,
                error = effects.status.error.as_deref().unwrap_or("unknown"),
                "transaction finalized with failure status"
            );
        }

        let created = effects.first_created().cloned();
        match &created {
            Some(object_id) => {
                if let Err(err) = self.store.save_object_ref(kind, &account, object_id).await {
                    if !self
                        .fail_cycle(generation, format!("failed to persist {kind} reference: {err}"))
                        .await
                    {
                        return Err(WorkflowError::Cancelled);
                    }
                    return Err(WorkflowError::Store(err.to_string()));
                }
                info!(%digest, %object_id, kind = %kind, "stored created object reference");
            }
            // Complete but produced no new entity; a warning, not an error.
            None => warn!(%digest, "no created object id found in transaction effects"),
        }

        if created.is_some() && kind == EntityKind::PizzaBox {
            if let Err(err) = self.refresh_snapshot().await {
                warn!(%digest, "snapshot refresh after cook failed: {err}");
            }
        }

        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return Err(WorkflowError::Cancelled);
            }
            inner.in_flight = false;
            inner.state.loading = false;
        }

        let outcome = TransactionOutcome { digest, created };
        let _ = self.events.send(ClientEvent::TransactionConfirmed {
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/snapshot_tests.rs"]
mod snapshot_tests;

#[cfg(test)]
#[path = "tests/rpc_tests.rs"]
mod rpc_tests;
