use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, SendError, Sender};
use rand::Rng;

use super::autosave::SaveTicket;
use crate::storage::FileStore;

#[derive(Debug, Clone)]
pub struct SaveCompletion {
    pub ticket: SaveTicket,
    pub result: Result<(), String>,
}

enum Job {
    Save {
        ticket: SaveTicket,
        reply: Option<Sender<SaveCompletion>>,
    },
    Shutdown,
}

/// Background thread that writes outline content to the store, one ticket at
/// a time in submission order.
pub struct SaveWorker {
    jobs: Sender<Job>,
    completions: Receiver<SaveCompletion>,
    handle: Option<JoinHandle<()>>,
}

impl SaveWorker {
    pub fn spawn(store: Arc<dyn FileStore>, failure_rate: f64) -> Result<Self> {
        if failure_rate > 0.0 {
            tracing::warn!(failure_rate, "simulated save failures enabled");
        }
        let (jobs_tx, jobs_rx) = unbounded::<Job>();
        let (done_tx, done_rx) = unbounded::<SaveCompletion>();
        let handle = thread::Builder::new()
            .name("outline-save".into())
            .spawn(move || run(store, failure_rate, jobs_rx, done_tx))
            .context("spawning save worker thread")?;
        Ok(Self {
            jobs: jobs_tx,
            completions: done_rx,
            handle: Some(handle),
        })
    }

    /// Queues a save; its completion shows up in [`Self::drain`].
    pub fn submit(&self, ticket: SaveTicket) -> Result<()> {
        self.jobs
            .send(Job::Save {
                ticket,
                reply: None,
            })
            .map_err(|_| anyhow!("save worker has stopped"))
    }

    /// Queues a save behind anything already submitted and waits for it. If
    /// the wait times out the completion arrives later through [`Self::drain`].
    pub fn save_blocking(&self, ticket: SaveTicket, timeout: Duration) -> Result<SaveCompletion> {
        let (reply_tx, reply_rx) = bounded(1);
        self.jobs
            .send(Job::Save {
                ticket,
                reply: Some(reply_tx),
            })
            .map_err(|_| anyhow!("save worker has stopped"))?;
        reply_rx
            .recv_timeout(timeout)
            .context("waiting for synchronous save")
    }

    pub fn drain(&self) -> Vec<SaveCompletion> {
        self.completions.try_iter().collect()
    }

    /// Blocks until the next queued completion arrives.
    #[cfg(test)]
    pub fn wait(&self, timeout: Duration) -> Option<SaveCompletion> {
        self.completions.recv_timeout(timeout).ok()
    }
}

impl Drop for SaveWorker {
    fn drop(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("save worker panicked");
            }
        }
    }
}

fn run(
    store: Arc<dyn FileStore>,
    failure_rate: f64,
    jobs: Receiver<Job>,
    completions: Sender<SaveCompletion>,
) {
    let mut rng = rand::thread_rng();
    for job in jobs.iter() {
        let (ticket, reply) = match job {
            Job::Save { ticket, reply } => (ticket, reply),
            Job::Shutdown => break,
        };
        let result = if failure_rate > 0.0 && rng.gen_bool(failure_rate.min(1.0)) {
            Err("simulated save failure".to_string())
        } else {
            store
                .save_content(ticket.file_id(), ticket.content())
                .map_err(|err| err.to_string())
        };
        let mut completion = SaveCompletion { ticket, result };
        if let Some(reply) = reply {
            match reply.send(completion) {
                Ok(()) => continue,
                Err(SendError(late)) => {
                    tracing::debug!(
                        file_id = late.ticket.file_id(),
                        "synchronous save finished after its caller gave up"
                    );
                    completion = late;
                }
            }
        }
        if completions.send(completion).is_err() {
            break;
        }
    }
    tracing::debug!("save worker stopped");
}
