//! Sync coordinator
//!
//! Fans one authenticated session out to every contract on the account and
//! keeps the latest normalized bundle per contract. Refreshes are
//! single-flight: concurrent callers share one upstream round-trip and one
//! outcome. A failed cycle leaves the previous snapshot in place.

mod cache;
mod scheduler;
mod single_flight;

pub use cache::{Snapshot, SnapshotCache, SnapshotView};
pub use scheduler::Scheduler;
pub use single_flight::SingleFlight;

use crate::api::ApiClient;
use crate::api::types::RawHouseDetails;
use crate::classify::{ErrorKind, Operation};
use crate::error::{Result, SyncError};
use crate::logging::{LogContext, StructuredLogger, get_logger, get_logger_with_context};
use crate::model::{Contract, ContractBundle};
use crate::normalize;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Coordinator lifecycle as seen by observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Refreshing,
    /// Last cycle failed; the cache still holds the previous snapshot
    Failed { kind: ErrorKind },
    ShutDown,
}

/// Pushed after every refresh cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RefreshEvent {
    Completed { cups: Vec<String> },
    Failed { kind: ErrorKind, message: String },
}

/// Classified outcome of a failed refresh
#[derive(Debug, Clone, Error)]
#[error("{kind}: {error}")]
pub struct RefreshError {
    pub kind: ErrorKind,
    pub error: SyncError,
}

impl From<SyncError> for RefreshError {
    fn from(error: SyncError) -> Self {
        Self {
            kind: error.kind(),
            error,
        }
    }
}

type RefreshOutcome = std::result::Result<SnapshotView, RefreshError>;

struct Inner {
    client: ApiClient,
    selected_contract: Option<String>,
    contracts: RwLock<Option<Arc<Vec<Contract>>>>,
    cache: SnapshotCache,
    flight: SingleFlight<RefreshOutcome>,
    state: watch::Sender<CoordinatorState>,
    events: broadcast::Sender<RefreshEvent>,
    last_error: Mutex<Option<RefreshError>>,
    closed: AtomicBool,
    logger: StructuredLogger,
}

/// Cheap to clone; all clones share one cache and one in-flight cycle
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// `selected_contract` limits refreshes to one contract, matched by code or CUPS
    pub fn new(client: ApiClient, selected_contract: Option<String>) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                client,
                selected_contract: selected_contract.filter(|s| !s.trim().is_empty()),
                contracts: RwLock::new(None),
                cache: SnapshotCache::new(),
                flight: SingleFlight::new(),
                state,
                events,
                last_error: Mutex::new(None),
                closed: AtomicBool::new(false),
                logger: get_logger("coordinator"),
            }),
        }
    }

    /// Run a refresh cycle, or join the one already in flight
    pub async fn refresh(&self) -> RefreshOutcome {
        if self.is_shut_down() {
            return Err(SyncError::cancelled("coordinator is shut down").into());
        }
        let inner = Arc::clone(&self.inner);
        match self.inner.flight.run(move || inner.run_cycle()).await {
            Some(outcome) => outcome,
            None => Err(SyncError::cancelled("refresh abandoned by shutdown").into()),
        }
    }

    /// Latest bundle for a contract; never performs I/O
    pub fn get(&self, cups: &str) -> Option<Arc<ContractBundle>> {
        self.inner.cache.get(cups)
    }

    pub fn snapshot(&self) -> SnapshotView {
        self.inner.cache.view()
    }

    /// Contracts as last enumerated, empty before the first listing
    pub fn contracts(&self) -> Vec<Contract> {
        self.inner
            .contracts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.as_ref().clone())
            .unwrap_or_default()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    pub fn last_error(&self) -> Option<RefreshError> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.inner.events.subscribe()
    }

    /// Forget the contract listing so the next cycle enumerates again
    pub fn reload_contracts(&self) {
        *self
            .inner
            .contracts
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Abandon any in-flight cycle and refuse further refreshes
    ///
    /// The cache keeps the last committed snapshot.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.inner.flight.close() {
            self.inner.logger.info("In-flight refresh abandoned");
        }
        self.inner.state.send_replace(CoordinatorState::ShutDown);
        self.inner.logger.info("Coordinator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl Inner {
    /// Publish a state unless the coordinator has already shut down
    fn set_state(&self, next: CoordinatorState) {
        self.state.send_if_modified(|current| {
            if *current == CoordinatorState::ShutDown {
                return false;
            }
            *current = next;
            true
        });
    }

    async fn run_cycle(self: Arc<Self>) -> RefreshOutcome {
        let logger = get_logger_with_context(
            LogContext::new("coordinator").with_refresh_id(uuid::Uuid::new_v4().to_string()),
        );
        self.set_state(CoordinatorState::Refreshing);
        logger.debug("Refresh started");

        let outcome = self.fetch_all(&logger).await;
        if self.closed.load(Ordering::SeqCst) {
            logger.info("Refresh finished after shutdown, discarded");
            return Err(SyncError::cancelled("coordinator is shut down").into());
        }

        // Nothing below awaits; an abort lands either before the commit or not at all
        match outcome {
            Ok((bundles, complete)) => {
                let cups: Vec<String> = bundles.iter().map(|b| b.contract.cups.clone()).collect();
                let view = if complete {
                    self.cache.replace(bundles)
                } else {
                    self.cache.commit(bundles)
                };
                *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
                self.set_state(CoordinatorState::Idle);
                logger.info(&format!("Refresh completed for {} contract(s)", cups.len()));
                let _ = self.events.send(RefreshEvent::Completed { cups });
                Ok(view)
            }
            Err(e) => {
                let err = RefreshError::from(e);
                logger.error(&format!("Refresh failed: {}", err));
                *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.clone());
                self.set_state(CoordinatorState::Failed { kind: err.kind });
                let _ = self.events.send(RefreshEvent::Failed {
                    kind: err.kind,
                    message: err.error.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Bundles in listing order, and whether they cover the whole listing
    async fn fetch_all(&self, logger: &StructuredLogger) -> Result<(Vec<ContractBundle>, bool)> {
        let contracts = self.load_contracts(logger).await?;
        let targets = self.targets(&contracts)?;
        let complete = targets.len() == contracts.len();
        let houses = self.fetch_houses(&targets).await?;

        let mut tasks = JoinSet::new();
        for (index, contract) in targets.into_iter().enumerate() {
            let Some(house) = houses.get(&contract.house_id).cloned() else {
                return Err(SyncError::schema(
                    Operation::GetHouse,
                    format!("no details for house {}", contract.house_id),
                ));
            };
            let client = self.client.clone();
            let logger = logger.for_contract(&contract.cups);
            tasks.spawn(async move {
                (index, fetch_bundle(&client, contract, &house, &logger).await)
            });
        }

        let mut bundles = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(bundle))) => bundles.push((index, bundle)),
                // Dropping the set aborts the remaining fetches
                Ok((_, Err(e))) => return Err(e),
                Err(e) => return Err(SyncError::cancelled(e.to_string())),
            }
        }
        bundles.sort_by_key(|(index, _)| *index);
        Ok((bundles.into_iter().map(|(_, bundle)| bundle).collect(), complete))
    }

    /// One details request per distinct house, shared by its contracts
    async fn fetch_houses(
        &self,
        targets: &[Contract],
    ) -> Result<HashMap<String, Arc<RawHouseDetails>>> {
        let ids: BTreeSet<&str> = targets.iter().map(|c| c.house_id.as_str()).collect();

        let mut tasks = JoinSet::new();
        for id in ids {
            let client = self.client.clone();
            let id = id.to_string();
            tasks.spawn(async move {
                let house = client.get_house(&id).await;
                (id, house)
            });
        }

        let mut houses = HashMap::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(house))) => {
                    houses.insert(id, Arc::new(house));
                }
                Ok((_, Err(e))) => return Err(e),
                Err(e) => return Err(SyncError::cancelled(e.to_string())),
            }
        }
        Ok(houses)
    }

    async fn load_contracts(&self, logger: &StructuredLogger) -> Result<Arc<Vec<Contract>>> {
        let cached = self
            .contracts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(contracts) = cached {
            return Ok(contracts);
        }

        let houses = self.client.list_contracts().await?;
        let contracts = normalize::contracts(&houses)?;
        if contracts.is_empty() {
            return Err(SyncError::NoContracts);
        }
        logger.info(&format!("Enumerated {} contract(s)", contracts.len()));

        let contracts = Arc::new(contracts);
        *self
            .contracts
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&contracts));
        Ok(contracts)
    }

    fn targets(&self, contracts: &[Contract]) -> Result<Vec<Contract>> {
        let Some(selected) = self.selected_contract.as_deref() else {
            return Ok(contracts.to_vec());
        };
        contracts
            .iter()
            .find(|c| c.code == selected || c.cups == selected)
            .map(|c| vec![c.clone()])
            .ok_or_else(|| {
                SyncError::schema(
                    Operation::ListContracts,
                    format!("selected contract {} is not on the account", selected),
                )
            })
    }
}

/// Fetch and normalize every resource of one contract
async fn fetch_bundle(
    client: &ApiClient,
    contract: Contract,
    house: &RawHouseDetails,
    logger: &StructuredLogger,
) -> Result<ContractBundle> {
    let battery = async {
        if contract.kind.has_virtual_battery() {
            client.get_battery(&contract).await.map(Some)
        } else {
            Ok(None)
        }
    };
    let (costs, invoices, next_invoice, battery) = tokio::try_join!(
        client.get_consumption(&contract),
        client.get_invoices(&contract),
        client.get_next_invoice(&contract),
        battery,
    )?;

    let now = Utc::now();
    let bundle = ContractBundle {
        consumption: normalize::consumption(&contract, &costs, now)?,
        invoices: normalize::invoices(&contract, invoices)?,
        next_invoice: next_invoice
            .as_ref()
            .map(normalize::next_invoice)
            .transpose()?,
        house: normalize::house_details(&contract, house)?,
        battery: battery
            .as_ref()
            .map(|raw| normalize::battery(&contract, raw))
            .transpose()?,
        refreshed_at: now,
        contract,
    };
    logger.debug(&format!(
        "Fetched {} invoice(s), battery {}",
        bundle.invoices.len(),
        if bundle.battery.is_some() { "present" } else { "n/a" }
    ));
    Ok(bundle)
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state())
            .field("contracts", &self.inner.cache.view().len())
            .finish_non_exhaustive()
    }
}
