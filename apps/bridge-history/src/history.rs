//! Page engine and the stateful page controller.
//!
//! [`HistoryEngine`] runs one page through the whole pipeline: indexer query,
//! bounded concurrent resolution, transformation and the live merge.
//! [`PageController`] keeps the caller's current page and drops results of
//! superseded requests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::Address;
use futures::future::join_all;
use serde::{Serialize, Serializer};
use tokio::sync::Semaphore;

use crate::chain::{ChainRpc, MessageReader};
use crate::error::Result;
use crate::indexer::{IndexerKind, IndexerQuery, IndexerQueryClient, IndexerTransport, RetryPolicy};
use crate::live::{merge, LiveMergeRegistry};
use crate::model::{CanonicalTransaction, ChainIds, DisplayTime, RawDepositEvent};
use crate::pagination::{PageParams, PaginationSearchPolicy, DEFAULT_PAGE_SIZE};
use crate::resolver::{DepositResolution, ReceiptResolver};
use crate::transform::{transform_deposit, transform_withdrawal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySettings {
    pub page_size: u32,
    /// Upper bound on concurrent per-record resolutions.
    pub resolution_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            resolution_concurrency: 8,
            retry: RetryPolicy::default(),
        }
    }
}

/// Caller-supplied block window. `to_block` defaults to the source chain head.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockRange {
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Error,
    Success,
}

/// What a consumer renders for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    #[serde(serialize_with = "serialize_records")]
    pub records: Vec<CanonicalTransaction>,
    pub status: LoadStatus,
    pub next_page_available: bool,
    pub prev_page_available: bool,
    pub search_validation_error: bool,
    pub no_search_results: bool,
    pub page: PageParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A record as rendered, with its timestamps also given as date and time.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DisplayedRecord<'a> {
    #[serde(flatten)]
    record: &'a CanonicalTransaction,
    created_display: Option<DisplayTime>,
    resolved_display: Option<DisplayTime>,
}

fn serialize_records<S: Serializer>(
    records: &[CanonicalTransaction],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(records.iter().map(|record| DisplayedRecord {
        record,
        created_display: record.created_display(),
        resolved_display: record.resolved_display(),
    }))
}

impl HistoryView {
    pub fn loading(page: PageParams) -> Self {
        Self {
            records: Vec::new(),
            status: LoadStatus::Loading,
            next_page_available: false,
            prev_page_available: false,
            search_validation_error: false,
            no_search_results: false,
            page,
            error: None,
        }
    }

    pub fn from_outcome(
        policy: &PaginationSearchPolicy,
        page: PageParams,
        outcome: Result<Vec<CanonicalTransaction>>,
    ) -> Self {
        let prev_page_available = policy.prev_page_available(&page);
        match outcome {
            Ok(records) => Self {
                next_page_available: policy.next_page_available(&page, records.len()),
                prev_page_available,
                search_validation_error: false,
                no_search_results: page.search().is_some() && records.is_empty(),
                status: LoadStatus::Success,
                records,
                page,
                error: None,
            },
            Err(e) => Self {
                status: LoadStatus::Error,
                prev_page_available,
                error: Some(e.to_string()),
                ..Self::loading(page)
            },
        }
    }

    /// View for a rejected search when no page has been shown yet.
    pub fn invalid_search(page: PageParams) -> Self {
        Self {
            search_validation_error: true,
            ..Self::loading(page)
        }
    }
}

pub struct HistoryEngine {
    indexer: IndexerQueryClient,
    resolver: ReceiptResolver,
    l1: Arc<dyn ChainRpc>,
    l2: Arc<dyn ChainRpc>,
    live: Arc<LiveMergeRegistry>,
    policy: PaginationSearchPolicy,
    permits: Semaphore,
}

impl HistoryEngine {
    pub fn new(
        transport: Arc<dyn IndexerTransport>,
        l1: Arc<dyn ChainRpc>,
        l2: Arc<dyn ChainRpc>,
        messages: Arc<dyn MessageReader>,
        live: Arc<LiveMergeRegistry>,
        settings: HistorySettings,
    ) -> Self {
        Self {
            indexer: IndexerQueryClient::new(transport, settings.retry),
            resolver: ReceiptResolver::new(Arc::clone(&l1), Arc::clone(&l2), messages),
            l1,
            l2,
            live,
            policy: PaginationSearchPolicy::new(settings.page_size),
            permits: Semaphore::new(settings.resolution_concurrency.max(1)),
        }
    }

    pub fn policy(&self) -> &PaginationSearchPolicy {
        &self.policy
    }

    pub fn live(&self) -> &Arc<LiveMergeRegistry> {
        &self.live
    }

    pub async fn chain_ids(&self) -> Result<ChainIds> {
        Ok(ChainIds {
            l1: self.l1.chain_id().await?,
            l2: self.l2.chain_id().await?,
        })
    }

    pub async fn page(
        &self,
        kind: IndexerKind,
        address: Address,
        params: &PageParams,
        range: BlockRange,
    ) -> Result<Vec<CanonicalTransaction>> {
        match kind {
            IndexerKind::Deposits => self.deposits_page(address, params, range).await,
            IndexerKind::Withdrawals => self.withdrawals_page(address, params, range).await,
        }
    }

    pub async fn deposits_page(
        &self,
        address: Address,
        params: &PageParams,
        range: BlockRange,
    ) -> Result<Vec<CanonicalTransaction>> {
        let chains = self.chain_ids().await?;
        let query = self.indexer_query(self.l1.as_ref(), address, params, range).await?;
        let events = self.indexer.deposits(&query).await?;

        let resolutions = self.resolve_all(&events).await;
        let records = events
            .iter()
            .zip(&resolutions)
            .map(|(event, resolution)| transform_deposit(event, resolution, chains))
            .collect();

        let live = self.live.snapshot().await;
        Ok(merge(records, &live))
    }

    pub async fn withdrawals_page(
        &self,
        address: Address,
        params: &PageParams,
        range: BlockRange,
    ) -> Result<Vec<CanonicalTransaction>> {
        let chains = self.chain_ids().await?;
        let query = self.indexer_query(self.l2.as_ref(), address, params, range).await?;
        let events = self.indexer.withdrawals(&query).await?;

        let records = events
            .iter()
            .map(|event| transform_withdrawal(event, chains))
            .collect();

        let live = self.live.snapshot().await;
        Ok(merge(records, &live))
    }

    async fn indexer_query(
        &self,
        source: &dyn ChainRpc,
        address: Address,
        params: &PageParams,
        range: BlockRange,
    ) -> Result<IndexerQuery> {
        let to_block = match range.to_block {
            Some(block) => block,
            None => source.block_number().await?,
        };

        Ok(IndexerQuery {
            address,
            from_block: range.from_block.unwrap_or(0),
            to_block,
            page_size: params.page_size,
            page_number: params.page_number,
            search: params.search().map(String::from),
        })
    }

    /// Resolves every event under the concurrency cap. Output order matches
    /// input order whatever order the lookups finish in.
    async fn resolve_all(&self, events: &[RawDepositEvent]) -> Vec<DepositResolution> {
        let tasks = events.iter().map(|event| async move {
            // The semaphore is never closed.
            let _permit = self.permits.acquire().await.ok();
            self.resolver.resolve_deposit(event).await
        });
        join_all(tasks).await
    }
}

struct ControllerState {
    version: u64,
    params: PageParams,
    view: HistoryView,
}

/// One consumer's view of one address and direction.
pub struct PageController {
    engine: Arc<HistoryEngine>,
    kind: IndexerKind,
    address: Address,
    range: BlockRange,
    state: Mutex<ControllerState>,
}

impl PageController {
    pub fn new(engine: Arc<HistoryEngine>, kind: IndexerKind, address: Address, range: BlockRange) -> Self {
        let params = engine.policy().initial();
        Self {
            engine,
            kind,
            address,
            range,
            state: Mutex::new(ControllerState {
                version: 0,
                view: HistoryView::loading(params.clone()),
                params,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view(&self) -> HistoryView {
        self.state().view.clone()
    }

    pub fn params(&self) -> PageParams {
        self.state().params.clone()
    }

    /// Loads `params` and publishes the result unless a newer load started in
    /// the meantime. Returns whether the result was published.
    pub async fn load(&self, params: PageParams) -> bool {
        let version = {
            let mut state = self.state();
            state.version += 1;
            state.params = params.clone();
            state.view = HistoryView::loading(params.clone());
            state.version
        };

        let outcome = self
            .engine
            .page(self.kind, self.address, &params, self.range)
            .await;

        let mut state = self.state();
        if state.version != version {
            tracing::debug!(
                version,
                current = state.version,
                page = params.page_number,
                "Dropping stale page result"
            );
            return false;
        }
        if let Err(e) = &outcome {
            tracing::warn!(address = %self.address, error = %e, "Page load failed");
        }
        state.view = HistoryView::from_outcome(self.engine.policy(), params, outcome);
        true
    }

    pub async fn reload(&self) -> bool {
        let params = self.params();
        self.load(params).await
    }

    /// Validates `input` and, when accepted, loads the first page of the new
    /// search. A rejected search only raises the validation flag.
    pub async fn search(&self, input: &str) -> Result<bool> {
        match self.engine.policy().apply_search(input) {
            Ok(params) => Ok(self.load(params).await),
            Err(e) => {
                self.state().view.search_validation_error = true;
                Err(e)
            }
        }
    }

    pub async fn next_page(&self) -> bool {
        let params = {
            let state = self.state();
            if state.view.status == LoadStatus::Loading || !state.view.next_page_available {
                return false;
            }
            self.engine.policy().next(&state.params)
        };
        self.load(params).await
    }

    pub async fn prev_page(&self) -> bool {
        let params = {
            let state = self.state();
            if state.view.status == LoadStatus::Loading || !state.view.prev_page_available {
                return false;
            }
            self.engine.policy().prev(&state.params)
        };
        self.load(params).await
    }
}
