//! Upgrade orchestrator
//!
//! Drives one upgrade from request to recorded outcome:
//! - Deploys or locates every requested module
//! - Plans cuts against the live table
//! - Submits with bounded retries, then waits for the receipt
//! - Verifies the table and records the new addresses
//! - Writes one audit record per finished run

use crate::address_book::AddressBook;
use crate::config::UpgradeConfig;
use crate::deployer::ModuleDeployer;
use crate::error::{UpgradeError, UpgradeErrorKind};
use crate::types::{DeployedModule, Deployment, InitRequest, ModuleRequest, Supersedes, UpgradeReport, UpgradeRequest};
use diamond_cut::{CutPlanner, PlanError, TargetModule, UpgradeTarget};
use diamond_kernel::{
    validate_transition, AuditEntry, AuditLog, AuditOutcome, CutAuthority, CutExecutor,
    ExecutionError, InitCall, OperatorId, Receipt, StateError, TxReference, UpgradeState,
    UpgradeTransaction, VerificationService,
};
use diamond_selector::{ModuleAddress, ModuleInterface, Selector, SelectorExtractor};
use diamond_table::{TableReader, TableSnapshot};
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Handle that aborts an orchestrator from another task
///
/// Aborting prevents any further submission. A transaction already handed
/// to the authority is still confirmed and verified.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Request abort
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once abort was requested
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Module identity fixed during `Draft -> ModulesReady`
#[derive(Debug, Clone)]
struct ResolvedModule {
    interface: ModuleInterface,
    address: ModuleAddress,
    supersedes: Vec<ModuleAddress>,
}

/// States visited by one run
#[derive(Debug)]
struct Progress {
    state: UpgradeState,
    history: Vec<UpgradeState>,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: UpgradeState::Draft,
            history: vec![UpgradeState::Draft],
        }
    }

    fn advance(&mut self, to: UpgradeState) -> Result<(), StateError> {
        validate_transition(self.state, to)?;
        info!(from = %self.state, to = %to, "Upgrade stage");
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = UpgradeState::Failed;
            self.history.push(UpgradeState::Failed);
        }
    }
}

/// Runs upgrades against one authority
///
/// # Workflow
/// 1. `Draft -> ModulesReady`: deploy or look up every module
/// 2. `ModulesReady -> Planned`: diff the live table against the target
/// 3. `Planned -> Submitted`: submit, retrying transport failures
/// 4. `Submitted -> Confirmed`: wait for the terminal receipt
/// 5. `Confirmed -> Verified`: re-read every touched selector
/// 6. `Verified -> Complete`: record addresses and report
pub struct UpgradeOrchestrator {
    config: UpgradeConfig,
    authority: Arc<dyn CutAuthority>,
    deployer: Arc<dyn ModuleDeployer>,
    address_book: Mutex<AddressBook>,
    audit: Arc<AuditLog>,
    extractor: SelectorExtractor,
    protected: Vec<Selector>,
    planner: CutPlanner,
    executor: CutExecutor,
    verifier: VerificationService,
    endpoint: Option<String>,
    abort: AbortHandle,
}

impl UpgradeOrchestrator {
    /// Create an orchestrator
    ///
    /// Opens the address book and audit log files named in `config`.
    ///
    /// # Errors
    /// Returns [`UpgradeError`] in the `Draft` stage if the configuration is
    /// invalid or a configured file cannot be opened
    pub fn new(
        config: UpgradeConfig,
        authority: Arc<dyn CutAuthority>,
        deployer: Arc<dyn ModuleDeployer>,
    ) -> Result<Self, UpgradeError> {
        let draft = |kind: UpgradeErrorKind| UpgradeError::new(UpgradeState::Draft, kind);

        config.validate().map_err(|e| draft(e.into()))?;
        let extractor = config.extractor().map_err(|e| draft(e.into()))?;
        let protected = config.protected_selectors().map_err(|e| draft(e.into()))?;

        let address_book = match &config.address_book {
            Some(path) => AddressBook::load(path).map_err(|e| draft(e.into()))?,
            None => AddressBook::new(),
        };
        let audit = match &config.audit_log {
            Some(path) => AuditLog::open(path).map_err(|e| draft(e.into()))?,
            None => AuditLog::new(),
        };

        let executor = CutExecutor::new(Arc::clone(&authority), OperatorId::new(config.operator.clone()))
            .with_poll_interval(config.poll_interval());

        let endpoint = config.network.resolved_endpoint();
        info!(
            network = %config.network.name,
            endpoint = endpoint.as_deref().unwrap_or("<none>"),
            operator = %config.operator,
            "Orchestrator ready"
        );

        Ok(Self {
            endpoint,
            planner: CutPlanner::with_extractor(extractor.clone()),
            extractor,
            protected,
            authority,
            deployer,
            address_book: Mutex::new(address_book),
            audit: Arc::new(audit),
            executor,
            verifier: VerificationService::new(),
            abort: AbortHandle::default(),
            config,
        })
    }

    /// Use `book` instead of the configured address book
    #[must_use]
    pub fn with_address_book(mut self, book: AddressBook) -> Self {
        self.address_book = Mutex::new(book);
        self
    }

    /// Share an existing audit log
    #[must_use]
    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &UpgradeConfig {
        &self.config
    }

    /// Network endpoint after environment overrides
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Copy of the address book
    #[must_use]
    pub fn address_book(&self) -> AddressBook {
        self.address_book.lock().clone()
    }

    /// Audit log
    #[inline]
    #[must_use]
    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Handle for aborting from another task
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Prevent any further submission
    pub fn abort(&self) {
        warn!("Abort requested");
        self.abort.abort();
    }

    /// Run one upgrade to `Complete` or `Failed`
    ///
    /// # Errors
    /// Returns [`UpgradeError`] tagged with the stage that failed. The
    /// failure is also written to the audit log.
    pub async fn run(&self, request: UpgradeRequest) -> Result<UpgradeReport, UpgradeError> {
        let mut progress = Progress::new();
        let mut entry = AuditEntry::default();
        debug!(
            network = %self.config.network.name,
            endpoint = self.endpoint().unwrap_or("<none>"),
            "Upgrade started"
        );

        match self.drive(&request, &mut progress, &mut entry).await {
            Ok(report) => Ok(report),
            Err(kind) => {
                let err = UpgradeError {
                    stage: progress.state,
                    kind,
                };
                error!(stage = %err.stage, error = %err.kind, "Upgrade failed");
                progress.fail();
                self.write_audit(
                    entry,
                    AuditOutcome::Failed {
                        stage: err.stage.to_string(),
                        error: err.kind.to_string(),
                    },
                );
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        request: &UpgradeRequest,
        progress: &mut Progress,
        entry: &mut AuditEntry,
    ) -> Result<UpgradeReport, UpgradeErrorKind> {
        // Draft -> ModulesReady
        self.check_abort()?;
        let modules = self.resolve_modules(&request.modules).await?;
        let init = match &request.init {
            Some(init) => Some(self.resolve_init(init).await?),
            None => None,
        };
        progress.advance(UpgradeState::ModulesReady)?;

        // ModulesReady -> Planned
        self.check_abort()?;
        let snapshot = self.authority.snapshot().await?;
        let target = self.build_target(&modules, request, &snapshot)?;
        let plan = self.planner.plan(&snapshot, &target)?;
        for cut in plan.cuts() {
            debug!(%cut, "Planned cut");
        }
        entry.plan = Some(plan.clone());
        progress.advance(UpgradeState::Planned)?;

        // Planned -> Submitted
        let mut transaction = UpgradeTransaction::from_plan(&plan);
        if let Some((_, call)) = &init {
            transaction = transaction.with_init(call.clone());
        }
        entry.transaction_id = Some(transaction.id);
        let reference = self.submit(&transaction).await?;
        entry.reference = Some(reference);
        progress.advance(UpgradeState::Submitted)?;

        // Submitted -> Confirmed
        let receipt = self.confirm(reference, entry).await?;
        progress.advance(UpgradeState::Confirmed)?;

        // Confirmed -> Verified
        let after = self.authority.snapshot().await?;
        self.verifier.verify(&plan, &receipt, &after)?;
        progress.advance(UpgradeState::Verified)?;

        // Verified -> Complete
        let mut warnings = Vec::new();
        let deployed = self.record_addresses(&modules, init.as_ref(), &transaction, &mut warnings);
        let routes: IndexMap<Selector, Option<ModuleAddress>> = plan
            .touched()
            .map(|selector| (selector, after.resolve(selector)))
            .collect();
        progress.advance(UpgradeState::Complete)?;

        if let Some(warning) = self.write_audit(entry.clone(), AuditOutcome::Complete) {
            warnings.push(warning);
        }
        info!(
            transaction = %transaction.id,
            %reference,
            cuts = plan.cuts().len(),
            modules = deployed.len(),
            "Upgrade complete"
        );

        Ok(UpgradeReport {
            transaction_id: transaction.id,
            reference,
            revision: receipt.revision,
            modules: deployed,
            routes,
            plan,
            history: progress.history.clone(),
            warnings,
        })
    }

    fn check_abort(&self) -> Result<(), UpgradeErrorKind> {
        if self.abort.is_aborted() {
            Err(UpgradeErrorKind::Aborted)
        } else {
            Ok(())
        }
    }

    async fn resolve_modules(&self, requests: &[ModuleRequest]) -> Result<Vec<ResolvedModule>, UpgradeErrorKind> {
        let mut modules = Vec::with_capacity(requests.len());
        for request in requests {
            let address = self.resolve_address(&request.interface, &request.deployment).await?;

            let mut supersedes = Vec::new();
            for previous in &request.supersedes {
                match previous {
                    Supersedes::At(old) => supersedes.push(*old),
                    Supersedes::PreviousVersion => match self.recorded(request.interface.name()) {
                        Some(old) if old != address => supersedes.push(old),
                        Some(_) => {}
                        None => debug!(module = request.interface.name(), "No previous version recorded"),
                    },
                }
            }

            info!(module = request.interface.name(), %address, "Module ready");
            modules.push(ResolvedModule {
                interface: request.interface.clone(),
                address,
                supersedes,
            });
        }
        Ok(modules)
    }

    async fn resolve_init(&self, init: &InitRequest) -> Result<(ModuleInterface, InitCall), UpgradeErrorKind> {
        let address = self.resolve_address(&init.interface, &init.deployment).await?;
        info!(module = init.interface.name(), %address, "Initializer ready");
        Ok((init.interface.clone(), InitCall::new(address, init.calldata.clone())))
    }

    async fn resolve_address(
        &self,
        interface: &ModuleInterface,
        deployment: &Deployment,
    ) -> Result<ModuleAddress, UpgradeErrorKind> {
        match deployment {
            Deployment::Deploy { constructor_args } => {
                Ok(self.deployer.deploy(interface, constructor_args).await?)
            }
            Deployment::At(address) => Ok(*address),
            Deployment::Recorded => {
                self.recorded(interface.name())
                    .ok_or_else(|| UpgradeErrorKind::UnknownModule {
                        name: interface.name().to_string(),
                        network: self.config.network.name.clone(),
                    })
            }
        }
    }

    fn recorded(&self, module: &str) -> Option<ModuleAddress> {
        self.address_book
            .lock()
            .latest(&self.config.network.name, module)
            .map(|record| record.address)
    }

    fn build_target(
        &self,
        modules: &[ResolvedModule],
        request: &UpgradeRequest,
        snapshot: &TableSnapshot,
    ) -> Result<UpgradeTarget, UpgradeErrorKind> {
        let targets = modules.iter().map(|module| {
            module.supersedes.iter().fold(
                TargetModule::from_interface(module.address, module.interface.clone()),
                |target, &old| target.superseding(old),
            )
        });

        let mut target = UpgradeTarget::new()
            .with_protected(self.protected.iter().copied())
            .with_modules(targets)
            .with_purge(request.purge.iter().copied());

        if request.purge_all {
            let mut claimed: IndexSet<Selector> = IndexSet::new();
            for module in modules {
                let selectors = self
                    .extractor
                    .extract(&module.interface)
                    .map_err(|source| PlanError::InterfaceParse {
                        module: module.interface.name().to_string(),
                        source,
                    })?;
                claimed.extend(selectors.iter().copied());
            }
            let unclaimed: Vec<Selector> = snapshot
                .iter()
                .map(|(selector, _)| selector)
                .filter(|selector| !claimed.contains(selector) && !self.protected.contains(selector))
                .collect();
            debug!(count = unclaimed.len(), "Purging every unclaimed selector");
            target = target.with_purge(unclaimed);
        }

        Ok(target)
    }

    async fn submit(&self, transaction: &UpgradeTransaction) -> Result<TxReference, UpgradeErrorKind> {
        let max_attempts = self.config.retry.max_submission_attempts.max(1);
        let mut attempt = 1;
        loop {
            self.check_abort()?;
            match self.executor.submit(transaction).await {
                Ok(reference) => return Ok(reference),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(
                        transaction = %transaction.id,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Submission failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.config.backoff()).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn confirm(&self, reference: TxReference, entry: &mut AuditEntry) -> Result<Receipt, UpgradeErrorKind> {
        match self.executor.confirm(reference).await {
            Ok(receipt) => {
                entry.receipt = Some(receipt.clone());
                Ok(receipt)
            }
            Err(ExecutionError::TransactionFailed { receipt }) => {
                entry.receipt = Some((*receipt).clone());
                Err(ExecutionError::TransactionFailed { receipt }.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn record_addresses(
        &self,
        modules: &[ResolvedModule],
        init: Option<&(ModuleInterface, InitCall)>,
        transaction: &UpgradeTransaction,
        warnings: &mut Vec<String>,
    ) -> Vec<DeployedModule> {
        let network = &self.config.network.name;
        let mut book = self.address_book.lock();

        let deployed: Vec<DeployedModule> = modules
            .iter()
            .map(|module| {
                let name = module.interface.name().to_string();
                let version = book.record(network, &name, module.address, Some(transaction.id));
                DeployedModule {
                    name,
                    address: module.address,
                    version,
                }
            })
            .collect();
        if let Some((interface, call)) = init {
            book.record(network, interface.name(), call.target, Some(transaction.id));
        }

        if let Err(err) = book.save() {
            warn!(error = %err, "Failed to save address book");
            warnings.push(format!("address book not saved: {err}"));
        }
        deployed
    }

    /// Append to the audit log; a failure comes back as a report warning
    fn write_audit(&self, entry: AuditEntry, outcome: AuditOutcome) -> Option<String> {
        match self.audit.append(entry, outcome) {
            Ok(_) => None,
            Err(err) => {
                error!(error = %err, "Failed to write audit record");
                Some(format!("audit record not written: {err}"))
            }
        }
    }
}

impl std::fmt::Debug for UpgradeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeOrchestrator")
            .field("network", &self.config.network.name)
            .field("endpoint", &self.endpoint)
            .field("operator", &self.config.operator)
            .field("aborted", &self.abort.is_aborted())
            .finish_non_exhaustive()
    }
}
