//! File-based discovery feed.
//!
//! The discovery file carries the desired collector set, the scrape config
//! of every job and the target groups discovered for each job:
//!
//! ```json
//! {
//!   "collectors": ["collector-0", "collector-1"],
//!   "scrape_configs": {"node": {"job_name": "node", "scrape_interval": "30s"}},
//!   "target_groups": {
//!     "node": [{"targets": ["10.0.0.1:9100"], "labels": {"env": "prod"}}]
//!   }
//! }
//! ```
//!
//! Each tick pushes collectors first, then targets, then the scrape config
//! response, so a freshly started allocator has collectors in place before
//! its first targets arrive.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use allocation::{items_by_hash, Allocator, Labels, TargetItem};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::metrics::DISCOVERY_TICKS;
use crate::server::ScrapeConfigStore;

/// Label carrying the target address, as in Prometheus target groups.
pub const ADDRESS_LABEL: &str = "__address__";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryDocument {
    #[serde(default)]
    pub collectors: Vec<String>,
    #[serde(default)]
    pub scrape_configs: BTreeMap<String, Value>,
    #[serde(default)]
    pub target_groups: BTreeMap<String, Vec<TargetGroup>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    #[serde(default)]
    pub labels: Labels,
}

impl DiscoveryDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Flattens every target group into items keyed by hash. The same
    /// address reported twice with the same labels collapses into one.
    pub fn target_items(&self) -> HashMap<String, TargetItem> {
        let items = self.target_groups.iter().flat_map(|(job, groups)| {
            groups.iter().flat_map(move |group| {
                group.targets.iter().map(move |address| {
                    let mut labels = group.labels.clone();
                    labels.insert(ADDRESS_LABEL, address.as_str());
                    TargetItem::new(job.as_str(), address.as_str(), labels, "")
                })
            })
        });
        items_by_hash(items)
    }
}

pub struct FileDiscovery {
    path: PathBuf,
    static_collectors: Vec<String>,
}

impl FileDiscovery {
    /// A non-empty `static_collectors` replaces the collector list of the file.
    pub fn new(path: impl Into<PathBuf>, static_collectors: Vec<String>) -> Self {
        Self {
            path: path.into(),
            static_collectors,
        }
    }

    pub async fn load(&self) -> Result<DiscoveryDocument> {
        let bytes = tokio::fs::read(&self.path).await?;
        DiscoveryDocument::from_slice(&bytes)
    }

    /// Reads the file once and pushes its content into the allocator and the
    /// scrape config store.
    pub async fn tick(
        &self,
        allocator: &Allocator,
        scrape_configs: &ScrapeConfigStore,
    ) -> Result<()> {
        let document = self.load().await?;

        let collectors = if self.static_collectors.is_empty() {
            document.collectors.clone()
        } else {
            self.static_collectors.clone()
        };
        allocator.set_collectors(collectors);

        let targets = document.target_items();
        let target_count = targets.len();
        allocator.set_targets(targets);

        scrape_configs.update(&document.scrape_configs)?;

        tracing::debug!(
            path = %self.path.display(),
            jobs = document.scrape_configs.len(),
            targets = target_count,
            "discovery tick applied"
        );
        Ok(())
    }

    /// Ticks every `interval` until `cancel` fires. A failed tick is logged
    /// and leaves the previous state in place.
    pub async fn run(
        self,
        allocator: Arc<Allocator>,
        scrape_configs: Arc<ScrapeConfigStore>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("discovery loop stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.tick(&allocator, &scrape_configs).await {
                Ok(()) => {
                    metrics::counter!(DISCOVERY_TICKS, "outcome" => "success").increment(1);
                }
                Err(e) => {
                    metrics::counter!(DISCOVERY_TICKS, "outcome" => "failure").increment(1);
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "discovery tick failed, keeping previous state"
                    );
                }
            }
        }
    }
}
