//! `/coins/list` snapshot kept on disk between runs

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use dexai_core::{now_ms, FetchResult};

use super::types::CoinListEntry;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    fetched_at: i64,
    coins: Vec<CoinListEntry>,
}

/// JSON file holding the last coin list and when it was fetched
#[derive(Debug, Clone)]
pub struct CoinListFile {
    path: PathBuf,
    ttl: Duration,
}

impl CoinListFile {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fresh snapshot contents, or `None` when missing, stale or unreadable
    pub async fn load(&self) -> Option<Arc<Vec<CoinListEntry>>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!("coin list cache {} unavailable: {}", self.path.display(), e);
                return None;
            }
        };

        let snapshot: Snapshot = match serde_json::from_slice(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("coin list cache {} is corrupt: {}", self.path.display(), e);
                return None;
            }
        };

        let age_ms = now_ms().saturating_sub(snapshot.fetched_at);
        if age_ms < 0 || age_ms as u128 >= self.ttl.as_millis() {
            debug!("coin list cache is {}ms old, refetching", age_ms);
            return None;
        }
        Some(Arc::new(snapshot.coins))
    }

    pub async fn store(&self, coins: &[CoinListEntry]) -> FetchResult<()> {
        #[derive(Serialize)]
        struct SnapshotRef<'a> {
            fetched_at: i64,
            coins: &'a [CoinListEntry],
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec(&SnapshotRef {
            fetched_at: now_ms(),
            coins,
        })
        .map_err(dexai_core::FetchError::decode)?;
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }
}

/// Coins whose symbol matches, case-insensitively
pub fn find_by_symbol<'a>(coins: &'a [CoinListEntry], symbol: &str) -> Vec<&'a CoinListEntry> {
    coins
        .iter()
        .filter(|coin| coin.symbol.eq_ignore_ascii_case(symbol.trim()))
        .collect()
}

/// The coin deployed at `address` on `platform`
pub fn find_by_contract<'a>(
    coins: &'a [CoinListEntry],
    platform: &str,
    address: &str,
) -> Option<&'a CoinListEntry> {
    let address = address.trim();
    coins.iter().find(|coin| {
        coin.platforms
            .get(platform)
            .and_then(|addr| addr.as_deref())
            .is_some_and(|addr| addr.eq_ignore_ascii_case(address))
    })
}
