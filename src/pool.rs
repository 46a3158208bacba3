//! Drains the queue with a pool of workers.
//!
//! One producer claims jobs and hands each directly to an idle consumer;
//! consumers run them in parallel. The producer only claims once a consumer is
//! waiting, so no job sits `InProgress` in a buffer while every worker is busy.
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::PoolError;
use crate::executor;
use crate::store::JobStore;
use crate::types::Job;

/// An idle consumer's request for work. The producer fills it with exactly one
/// claimed job, or drops it once the queue is drained.
type Slot = oneshot::Sender<Job>;

/// What a call to [`run_all`] got through.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Jobs claimed and handed to a worker.
    pub processed: usize,
    /// Every failure reported by the producer or a worker.
    pub errors: Vec<PoolError>,
}

/// Runs pending jobs with `concurrency` parallel workers until the queue is
/// empty or a claim fails. A failing worker keeps going; failures are
/// collected into the summary. A concurrency of 0 is treated as 1.
///
/// Jobs are claimed in id order, but may finish in any order.
pub async fn run_all(store: &JobStore, concurrency: usize) -> RunSummary {
    let concurrency = concurrency.max(1);

    // Each worker has at most one outstanding slot.
    let (demand_tx, demand_rx) = mpsc::channel::<Slot>(concurrency);
    let (errors_tx, mut errors_rx) = mpsc::unbounded_channel();

    let producer = tokio::spawn(
        produce(store.clone(), demand_rx, errors_tx.clone())
            .instrument(info_span!("producer")),
    );

    let mut workers = JoinSet::new();
    for worker in 0..concurrency {
        workers.spawn(
            consume(store.clone(), demand_tx.clone(), errors_tx.clone())
                .instrument(info_span!("worker", worker)),
        );
    }

    // Only the tasks hold these now, so the channels close when they finish.
    drop(demand_tx);
    drop(errors_tx);

    let mut summary = RunSummary::default();
    match producer.await {
        Ok(processed) => summary.processed = processed,
        Err(error) => summary.errors.push(error.into()),
    }
    while let Some(joined) = workers.join_next().await {
        if let Err(error) = joined {
            summary.errors.push(error.into());
        }
    }
    while let Ok(error) = errors_rx.try_recv() {
        summary.errors.push(error);
    }

    for error in &summary.errors {
        error!(%error, "job processing error");
    }
    info!(
        processed = summary.processed,
        errors = summary.errors.len(),
        "finished processing jobs"
    );

    summary
}

/// Claims and runs a single job. Returns the claimed job with its final
/// status, or `None` if nothing was pending.
pub async fn take_one(store: &JobStore) -> Result<Option<Job>, PoolError> {
    let Some(mut job) =
        store.claim_next_async().await.map_err(PoolError::Claim)?
    else {
        info!("no pending jobs");
        return Ok(None);
    };

    job.status = executor::execute(store, &job).await?;
    Ok(Some(job))
}

/// Answers worker slots with freshly claimed jobs until the queue is drained
/// or a claim fails. Returning drops `demand`, which releases every waiting
/// worker.
async fn produce(
    store: JobStore,
    mut demand: mpsc::Receiver<Slot>,
    errors: mpsc::UnboundedSender<PoolError>,
) -> usize {
    let mut handed_off = 0;

    while let Some(slot) = demand.recv().await {
        let job = match store.claim_next_async().await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!("queue drained");
                break;
            },
            Err(error) => {
                let _ = errors.send(PoolError::Claim(error));
                break;
            },
        };

        let job_id = job.id;
        if slot.send(job).is_err() {
            // Only possible if the worker died between asking and receiving.
            warn!(job_id, "claimed job has no worker to run it");
            let _ = errors.send(PoolError::Orphaned { job_id });
            continue;
        }
        handed_off += 1;
    }

    handed_off
}

/// Asks the producer for jobs and runs them one at a time until the producer
/// stops handing them out.
async fn consume(
    store: JobStore,
    demand: mpsc::Sender<Slot>,
    errors: mpsc::UnboundedSender<PoolError>,
) {
    loop {
        let (slot, incoming) = oneshot::channel();
        if demand.send(slot).await.is_err() {
            break;
        }
        let Ok(job) = incoming.await else {
            break;
        };

        if let Err(error) = executor::execute(&store, &job).await {
            let _ = errors.send(error.into());
        }
    }

    debug!("worker finished");
}
