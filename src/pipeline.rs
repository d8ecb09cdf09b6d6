//! Concurrent fan-out across sources, fan-in over a shared event stream.
//!
//! One worker task runs per configured source, fully independently; all of
//! them push [`WorkerEvent`]s into a single unbounded mpsc channel. The
//! launcher holds the original sender only while spawning and drops it
//! immediately after, so the channel closes exactly when the last worker
//! finishes — the consumer's `recv()` returning `None` is the completion
//! signal, with no liveness polling. A monitor joins every worker so that a
//! panic in one is logged at the boundary and never reaches its siblings.
//!
//! Ordering guarantee: events from one source arrive in that source's
//! processing order; interleaving across sources is unspecified.

use crate::classify::SentimentClient;
use crate::config::Source;
use crate::fetch::Fetcher;
use crate::models::WorkerEvent;
use crate::sources::scrape_source;
use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info};

/// Small delay between worker launches to avoid a request burst.
const LAUNCH_STAGGER: Duration = Duration::from_millis(50);

/// Run-wide immutable state shared by every worker.
pub struct RunContext {
    pub fetcher: Fetcher,
    /// Present when an API key was configured; checked once at startup.
    pub classifier: Option<SentimentClient>,
    /// Search keyword, lowercased once.
    pub keyword: String,
    /// Fixed at run start; only candidates from this calendar date proceed.
    pub today: NaiveDate,
}

/// Launch one worker per source and return the merged event stream.
///
/// Returns immediately; drain the receiver until it yields `None` to
/// consume the whole run.
pub fn run(ctx: Arc<RunContext>, sources: Vec<Source>) -> UnboundedReceiver<WorkerEvent> {
    fan_out(sources, LAUNCH_STAGGER, move |source, events| {
        scrape_source(Arc::clone(&ctx), source, events)
    })
}

/// Generic fan-out/fan-in plumbing: spawn one task per item, staggered,
/// all feeding one unbounded channel.
pub(crate) fn fan_out<T, F, Fut>(
    items: Vec<T>,
    stagger: Duration,
    worker: F,
) -> UnboundedReceiver<WorkerEvent>
where
    T: Send + 'static,
    F: Fn(T, UnboundedSender<WorkerEvent>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut workers = JoinSet::new();
        let total = items.len();
        for item in items {
            workers.spawn(worker(item, tx.clone()));
            sleep(stagger).await;
        }
        // The workers' clones are now the only senders; the channel closes
        // when the last one drops.
        drop(tx);

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Source worker aborted");
            }
        }
        info!(workers = total, "All source workers finished");
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogEvent;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_all_events_received_exactly_once() {
        const SOURCES: usize = 8;
        const EVENTS: usize = 25;

        let items: Vec<usize> = (0..SOURCES).collect();
        let mut rx = fan_out(items, Duration::from_millis(1), |i, tx| async move {
            for j in 0..EVENTS {
                let event = WorkerEvent::Log(LogEvent::info(
                    &format!("source-{i}"),
                    format!("event-{j}"),
                ));
                tx.send(event).expect("consumer alive");
            }
        });

        let mut counts: HashMap<(String, String), usize> = HashMap::new();
        while let Some(event) = rx.recv().await {
            if let WorkerEvent::Log(log) = event {
                *counts.entry((log.source, log.message)).or_insert(0) += 1;
            }
        }

        assert_eq!(counts.len(), SOURCES * EVENTS);
        assert!(counts.values().all(|&c| c == 1));
    }

    #[tokio::test]
    async fn test_worker_panic_does_not_stall_siblings() {
        let mut rx = fan_out(vec![0usize, 1, 2], Duration::ZERO, |i, tx| async move {
            if i == 1 {
                panic!("worker blew up");
            }
            let event = WorkerEvent::Log(LogEvent::info("survivor", format!("event-{i}")));
            tx.send(event).expect("consumer alive");
        });

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[tokio::test]
    async fn test_stream_closes_with_no_sources() {
        let mut rx = fan_out(Vec::<usize>::new(), Duration::ZERO, |_, _tx| async {});
        assert!(rx.recv().await.is_none());
    }
}
