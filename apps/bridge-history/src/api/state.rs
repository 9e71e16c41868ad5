use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::history::HistoryEngine;
use crate::model::ChainIds;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<HistoryEngine>,
    pub config: Arc<Config>,
    /// Read once at startup.
    pub chains: ChainIds,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<HistoryEngine>, config: Config, chains: ChainIds) -> Self {
        Self {
            engine,
            config: Arc::new(config),
            chains,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
