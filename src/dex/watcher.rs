//! Periodic refresh of pool state and wallet balances.
//!
//! Each watcher awaits its fetch inside the tick loop, so a slow fetch delays
//! the next one instead of overlapping it. Results are tagged with the tick's
//! sequence number and never replace a newer published value.

use super::state::PoolStateReader;
use crate::amount::TokenAmount;
use crate::errors::{AppError, Result};
use crate::ledger::Ledger;
use crate::models::PoolSnapshot;
use crate::utils::Shutdown;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// A published value and the tick that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub seq: u64,
    pub value: T,
}

pub type Feed<T> = watch::Receiver<Option<Versioned<T>>>;

/// Spawns a single-flight poller publishing the latest `fetch` result.
///
/// Fetch errors are logged and the loop continues. The task ends when
/// `shutdown` fires or every receiver is gone.
pub fn spawn_poller<T, F>(
    name: &'static str,
    every: Duration,
    mut fetch: F,
    mut shutdown: Shutdown,
) -> (Feed<T>, JoinHandle<()>)
where
    T: Send + Sync + 'static,
    F: FnMut() -> BoxFuture<'static, Result<T>> + Send + 'static,
{
    let (tx, rx) = watch::channel::<Option<Versioned<T>>>(None);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut seq: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if tx.is_closed() {
                break;
            }
            seq += 1;
            match shutdown.run(fetch()).await {
                Ok(value) => {
                    let published = tx.send_if_modified(|current| {
                        if current.as_ref().is_some_and(|c| c.seq >= seq) {
                            return false;
                        }
                        *current = Some(Versioned { seq, value });
                        true
                    });
                    debug!(watcher = name, seq, published, "[WATCH] refreshed");
                }
                Err(AppError::Cancelled) => break,
                Err(e) => warn!(watcher = name, seq, error = %e, "[WATCH] refresh failed"),
            }
        }
        debug!(watcher = name, "[WATCH] stopped");
    });
    (rx, handle)
}

/// Polls one pool's snapshot.
pub fn spawn_pool_watcher(
    reader: PoolStateReader,
    pool_id: String,
    every: Duration,
    shutdown: Shutdown,
) -> (Feed<PoolSnapshot>, JoinHandle<()>) {
    spawn_poller(
        "pool",
        every,
        move || {
            let reader = reader.clone();
            let pool_id = pool_id.clone();
            async move { reader.fetch(&pool_id).await }.boxed()
        },
        shutdown,
    )
}

/// Polls a wallet's balance of one coin type.
pub fn spawn_balance_watcher(
    ledger: Arc<dyn Ledger>,
    owner: String,
    coin_type: String,
    decimals: u8,
    every: Duration,
    shutdown: Shutdown,
) -> (Feed<TokenAmount>, JoinHandle<()>) {
    spawn_poller(
        "balance",
        every,
        move || {
            let ledger = ledger.clone();
            let owner = owner.clone();
            let coin_type = coin_type.clone();
            async move {
                let raw = ledger.get_balance(&owner, &coin_type).await?;
                TokenAmount::new(raw, decimals)
            }
            .boxed()
        },
        shutdown,
    )
}
