use super::{AdLayout, AdPlacement, FeedSession, LoadOutcome};
use crate::AppState;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Loads another batch when the session is close to the end of its queue.
/// Returns `None` when no load was needed.
pub async fn top_up<S: AppState>(state: &S, session: &FeedSession) -> Option<LoadOutcome> {
    let layout = AdLayout::resolve(&state.config().ads, state.ads(), AdPlacement::Feed);
    let remaining = session.remaining(layout.frequency, layout.ads.len());
    if remaining > state.config().feed.low_water_mark {
        return None;
    }
    debug!(session_id = %session.id, remaining, "Feed below low-water mark");
    Some(state.feed().load_more(session).await)
}

/// Background worker for one feed session: periodic top-up, realtime merge and
/// idle eviction. Holds only a weak reference so a closed session ends it.
pub fn spawn_prefetcher<S: AppState>(state: S, session: &Arc<FeedSession>) -> JoinHandle<()> {
    let weak = Arc::downgrade(session);
    let session_id = session.id.clone();
    let mut shutdown = state.shutdown().subscribe();
    let mut new_posts = state.post_events().subscribe();

    tokio::spawn(async move {
        let feed_config = state.config().feed.clone();
        let idle_timeout = chrono::Duration::from_std(feed_config.session_idle_timeout)
            .unwrap_or(chrono::Duration::MAX);
        let mut ticker = tokio::time::interval(feed_config.prefetch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the session was just loaded.
        ticker.tick().await;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let Some(session) = weak.upgrade() else { break };
                    if state.clock().now() - session.last_activity() > idle_timeout {
                        state.sessions().remove(&session_id);
                        info!(session_id = %session_id, "Evicted idle feed session");
                        break;
                    }
                    top_up(&state, &session).await;
                }
                event = new_posts.recv() => match event {
                    Ok(post) => {
                        let Some(session) = weak.upgrade() else { break };
                        let post_id = post.id;
                        if session.merge_realtime(post) {
                            debug!(session_id = %session_id, post_id, "Merged realtime post");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(session_id = %session_id, skipped, "Realtime post events lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.changed() => break,
            }
        }

        debug!(session_id = %session_id, "Prefetcher stopped");
    })
}
