//! Background writer for tracking side effects
//!
//! Visits and view-counter bumps are sent to a channel and applied by a single
//! task, so request handlers never wait on storage. Visits are flushed in
//! batches; counter increments are applied as they arrive.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Database, Visit};

/// Work queued by the tracking middleware and article routes
#[derive(Debug)]
pub enum TrackingJob {
    Visit(Visit),
    ArticleView(Uuid),
}

/// Sender handle for queueing tracking jobs
pub type WriteSender = mpsc::UnboundedSender<TrackingJob>;

const BATCH_SIZE: usize = 100;
const FLUSH_INTERVAL_MS: u64 = 250;

/// Start the write buffer background task.
///
/// The task exits after every sender has been dropped and the remaining
/// visits are flushed; await the handle to shut down cleanly.
pub fn start_write_buffer(db: Database) -> (WriteSender, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(write_buffer_task(db, rx));

    (tx, handle)
}

async fn write_buffer_task(db: Database, mut rx: mpsc::UnboundedReceiver<TrackingJob>) {
    let mut buffer: Vec<Visit> = Vec::with_capacity(BATCH_SIZE);
    let mut flush_interval = tokio::time::interval(
        tokio::time::Duration::from_millis(FLUSH_INTERVAL_MS)
    );

    info!("Write buffer started (batch_size={}, flush_interval={}ms)", BATCH_SIZE, FLUSH_INTERVAL_MS);

    loop {
        tokio::select! {
            job = rx.recv() => {
                match job {
                    Some(TrackingJob::Visit(visit)) => {
                        buffer.push(visit);
                        if buffer.len() >= BATCH_SIZE {
                            flush_batch(&db, &mut buffer).await;
                        }
                    }
                    Some(TrackingJob::ArticleView(id)) => {
                        apply_view(&db, id).await;
                    }
                    None => {
                        // Channel closed, flush remaining and exit
                        if !buffer.is_empty() {
                            flush_batch(&db, &mut buffer).await;
                        }
                        info!("Write buffer shutting down");
                        break;
                    }
                }
            }
            // Periodic flush for low-traffic periods
            _ = flush_interval.tick() => {
                if !buffer.is_empty() {
                    flush_batch(&db, &mut buffer).await;
                }
            }
        }
    }
}

/// Flush buffered visits to the database, batches in a single transaction
async fn flush_batch(db: &Database, buffer: &mut Vec<Visit>) {
    let count = buffer.len();
    debug!("Flushing {} visits to database", count);

    let result = match buffer.as_slice() {
        [visit] => db.insert_visit(visit).await.map(|_| ()),
        visits => db.batch_insert_visits(visits).await,
    };

    match result {
        Ok(()) => {
            debug!("Successfully flushed {} visits", count);
        }
        Err(e) => {
            // Dropped, not retried
            error!("Failed to flush {} visits: {}", count, e);
        }
    }

    buffer.clear();
}

async fn apply_view(db: &Database, id: Uuid) {
    match db.increment_article_views(id).await {
        Ok(true) => debug!("Counted view for article {}", id),
        Ok(false) => debug!("View for unknown article {} ignored", id),
        Err(e) => warn!("Failed to count view for article {}: {}", id, e),
    }
}
