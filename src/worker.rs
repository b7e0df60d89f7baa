use crate::handler::{Outcome, PageHandler};
use crate::queues::{Delivery, Subscription};
use crate::stores::PageStore;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Counters reported when a subscription ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub persisted: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    persisted: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn summary(&self) -> RunSummary {
        RunSummary {
            persisted: self.persisted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Drains `subscription` through `handler` until the broker closes it
///
/// With `max_concurrency` of 1 deliveries are handled one after the other in
/// arrival order. Otherwise up to `max_concurrency` deliveries are handled on
/// separate tasks, with no ordering between them. In-flight deliveries are
/// finished before returning.
pub async fn run<Q, S>(
    subscription: Q,
    handler: Arc<PageHandler<S>>,
    max_concurrency: usize,
) -> RunSummary
where
    Q: Subscription,
    S: PageStore + 'static,
{
    run_until(subscription, handler, max_concurrency, std::future::pending()).await
}

/// Like [`run`], but stops taking deliveries once `shutdown` completes
///
/// Deliveries already handed out are still handled and settled, so nothing
/// is left unacknowledged with the broker.
pub async fn run_until<Q, S, F>(
    mut subscription: Q,
    handler: Arc<PageHandler<S>>,
    max_concurrency: usize,
    shutdown: F,
) -> RunSummary
where
    Q: Subscription,
    S: PageStore + 'static,
    F: Future<Output = ()>,
{
    let counters = Arc::new(Counters::default());
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        let next = tokio::select! {
            biased;
            _ = &mut shutdown => {
                ::log::info!("Shutdown requested, no longer taking deliveries");
                break;
            }
            next = subscription.next() => next,
        };
        let Some(next) = next else {
            break;
        };

        let delivery = match next {
            Ok(delivery) => delivery,
            Err(e) => {
                ::log::error!("{}", e);
                continue;
            }
        };

        if max_concurrency <= 1 {
            process(&handler, &counters, delivery).await;
            continue;
        }

        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                ::log::error!("Worker pool closed: {}", e);
                break;
            }
        };
        let handler = Arc::clone(&handler);
        let counters = Arc::clone(&counters);
        tasks.spawn(async move {
            process(&handler, &counters, delivery).await;
            drop(permit);
        });

        // Reap finished tasks so the set does not grow with the message count
        while let Some(result) = tasks.try_join_next() {
            log_join_error(result);
        }
    }

    ::log::info!("Subscription stopped, waiting for {} in-flight message(s)", tasks.len());
    while let Some(result) = tasks.join_next().await {
        log_join_error(result);
    }

    counters.summary()
}

/// Handle one delivery and settle it with the broker
async fn process<S: PageStore>(handler: &PageHandler<S>, counters: &Counters, delivery: Delivery) {
    let settled = match handler.handle(&delivery.payload).await {
        Outcome::Persisted => {
            counters.persisted.fetch_add(1, Ordering::Relaxed);
            delivery.ack().await
        }
        Outcome::Dropped(_) => {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            delivery.reject().await
        }
    };

    if let Err(e) = settled {
        ::log::error!("{}", e);
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        ::log::error!("Message task failed: {}", e);
    }
}
