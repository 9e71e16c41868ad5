use alloy::primitives::Address;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::history::{BlockRange, HistoryView};
use crate::indexer::IndexerKind;
use crate::pagination::{validate_search, PageParams};

use super::state::AppState;

const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
}

pub async fn deposits(
    State(state): State<AppState>,
    Path(address): Path<Address>,
    Query(query): Query<HistoryQuery>,
) -> (StatusCode, Json<HistoryView>) {
    history_page(&state, IndexerKind::Deposits, address, query).await
}

pub async fn withdrawals(
    State(state): State<AppState>,
    Path(address): Path<Address>,
    Query(query): Query<HistoryQuery>,
) -> (StatusCode, Json<HistoryView>) {
    history_page(&state, IndexerKind::Withdrawals, address, query).await
}

async fn history_page(
    state: &AppState,
    kind: IndexerKind,
    address: Address,
    query: HistoryQuery,
) -> (StatusCode, Json<HistoryView>) {
    let policy = state.engine.policy();
    let mut params = PageParams {
        search_string: String::new(),
        page_number: query.page.unwrap_or(0),
        page_size: query
            .page_size
            .unwrap_or(policy.page_size())
            .clamp(1, MAX_PAGE_SIZE),
    };

    match validate_search(query.search.as_deref().unwrap_or_default()) {
        Ok(search) => params.search_string = search,
        Err(e) => {
            tracing::debug!(%address, error = %e, "Rejected search");
            let view = HistoryView {
                error: Some(e.to_string()),
                ..HistoryView::invalid_search(params)
            };
            return (StatusCode::BAD_REQUEST, Json(view));
        }
    }

    let range = BlockRange {
        from_block: query.from_block,
        to_block: query.to_block,
    };
    let outcome = state.engine.page(kind, address, &params, range).await;
    let status = match &outcome {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(%address, ?kind, error = %e, "History page failed");
            StatusCode::BAD_GATEWAY
        }
    };

    (status, Json(HistoryView::from_outcome(policy, params, outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::history::{HistoryEngine, HistorySettings, LoadStatus};
    use crate::indexer::RetryPolicy;
    use crate::live::LiveMergeRegistry;
    use crate::model::ChainIds;
    use crate::testing::{deposit_json, tx_hash, FakeChain, FakeMessages, FakeTransport, SENDER};
    use std::sync::Arc;
    use std::time::Duration;

    fn state(transport: Arc<FakeTransport>) -> AppState {
        let settings = HistorySettings {
            retry: RetryPolicy {
                retries: 0,
                interval: Duration::ZERO,
            },
            ..Default::default()
        };
        let engine = HistoryEngine::new(
            transport,
            Arc::new(FakeChain::new(1, 1_000)),
            Arc::new(FakeChain::new(42161, 1_000)),
            Arc::new(FakeMessages::default()),
            Arc::new(LiveMergeRegistry::new()),
            settings,
        );
        let config = Config::from_lookup(|name| {
            name.ends_with("_URL").then(|| "http://localhost".to_string())
        })
        .unwrap();
        AppState::new(Arc::new(engine), config, ChainIds { l1: 1, l2: 42161 })
    }

    fn transport() -> Arc<FakeTransport> {
        Arc::new(FakeTransport::new((1..=3).map(|i| deposit_json(i, None)).collect()))
    }

    #[tokio::test]
    async fn test_deposits_endpoint() {
        let transport = transport();
        let query = HistoryQuery {
            page_size: Some(2),
            ..Default::default()
        };

        let (status, Json(view)) =
            deposits(State(state(transport.clone())), Path(SENDER), Query(query)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(view.status, LoadStatus::Success);
        assert_eq!(view.records.len(), 2);
        assert!(view.next_page_available);
        assert_eq!(view.records[0].tx_id, tx_hash(1).to_string());

        let json = serde_json::to_value(&view).unwrap();
        let record = &json["records"][0];
        assert_eq!(record["txId"], tx_hash(1).to_string());
        assert_eq!(record["createdDisplay"]["date"], "Aug 01, 2022");
        assert!(record["resolvedDisplay"].is_null());
    }

    #[tokio::test]
    async fn test_malformed_search_is_bad_request() {
        let transport = transport();
        let query = HistoryQuery {
            search: Some("0xdeadbeef".into()),
            ..Default::default()
        };

        let (status, Json(view)) =
            deposits(State(state(transport.clone())), Path(SENDER), Query(query)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(view.search_validation_error);
        assert!(view.records.is_empty());
        assert_eq!(transport.calls(), 0);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["searchValidationError"], true);
    }

    #[tokio::test]
    async fn test_indexer_failure_is_bad_gateway() {
        let state = state(Arc::new(FakeTransport::default().failing_first(10)));

        let (status, Json(view)) =
            withdrawals(State(state), Path(SENDER), Query(HistoryQuery::default())).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(view.status, LoadStatus::Error);
        assert!(view.error.is_some());
    }
}
