//! Cross-context cart synchronization.
//!
//! When several contexts share one cache file, a cart change committed by
//! one must show up in the others. The synchronizer listens on the cache's
//! broadcast channel for commits from other contexts and, as a backstop
//! for lagged or dropped events, polls the cart entry's fingerprint on a
//! fixed interval. Either signal triggers a reload of the in-memory cart
//! from the cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::cache::keys;
use crate::cart::CartStore;

/// Owns the background synchronization task; aborts it on drop.
pub struct SynchronizerHandle {
    task: JoinHandle<()>,
}

impl SynchronizerHandle {
    /// Whether the background task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SynchronizerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start synchronizing a cart store with its cache.
///
/// `poll_interval` bounds how stale the in-memory cart can get when a
/// change event is missed.
#[must_use]
pub fn spawn(cart: Arc<CartStore>, poll_interval: Duration) -> SynchronizerHandle {
    let task = tokio::spawn(run(cart, poll_interval));
    SynchronizerHandle { task }
}

async fn run(cart: Arc<CartStore>, poll_interval: Duration) {
    let cache = cart.cache_handle();
    let own_context = cache.context_id();
    let mut events = cache.subscribe();

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately; consume it so polling starts one
    // interval out.
    ticker.tick().await;

    // Adopt whatever the cache holds; a commit may have landed between the
    // store's construction and this task starting.
    if let Err(e) = cart.reload_from_cache().await {
        warn!(error = %e, "initial cart reload failed");
    }
    let mut last_fingerprint = cache.fingerprint(keys::CART);

    loop {
        let reload = tokio::select! {
            event = events.recv() => match event {
                Ok(event) => event.context != own_context && event.touches(keys::CART),
                // Missed events; the fingerprint check below decides.
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "cache event stream lagged");
                    cache.fingerprint(keys::CART) != last_fingerprint
                }
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick() => cache.fingerprint(keys::CART) != last_fingerprint,
        };

        if !reload {
            last_fingerprint = cache.fingerprint(keys::CART);
            continue;
        }

        if let Err(e) = cart.reload_from_cache().await {
            warn!(error = %e, "cart reload failed");
        } else {
            debug!("cart reloaded from cache");
        }
        last_fingerprint = cache.fingerprint(keys::CART);
    }
}
