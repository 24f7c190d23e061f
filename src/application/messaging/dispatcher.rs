//! Message dispatcher - Routes inbound events to per-submitter workers
//!
//! Every submitter with queued events gets a worker task fed by its own
//! queue, so one submitter's events are handled strictly in arrival order
//! while different submitters proceed independently. A worker retires as
//! soon as its queue is empty, so the worker map only holds submitters with
//! work in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::router::StateRouter;
use crate::domain::entities::{Content, Message, UserId};
use crate::domain::traits::Bot;

type Workers = Arc<Mutex<HashMap<UserId, Worker>>>;

struct Worker {
    id: u64,
    queue: mpsc::UnboundedSender<Message>,
    handle: JoinHandle<()>,
}

pub struct MessageDispatcher {
    router: Arc<StateRouter>,
    bot: Arc<dyn Bot>,
    workers: Workers,
    next_id: AtomicU64,
}

impl MessageDispatcher {
    pub fn new(router: Arc<StateRouter>, bot: Arc<dyn Bot>) -> Self {
        Self {
            router,
            bot,
            workers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Queue an event behind earlier events from the same submitter
    pub fn dispatch(&self, message: Message) {
        let key = message.sender.as_ref().map_or(message.chat_id, |u| u.id);
        let mut workers = lock(&self.workers);

        let message = match workers.get(&key) {
            Some(worker) => match worker.queue.send(message) {
                Ok(()) => return,
                // worker is gone, start a fresh one below
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        let (queue, rx) = mpsc::unbounded_channel();
        if queue.send(message).is_err() {
            return;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(Self::worker(
            Arc::clone(&self.router),
            Arc::clone(&self.bot),
            Arc::clone(&self.workers),
            key,
            id,
            rx,
        ));
        workers.insert(key, Worker { id, queue, handle });
    }

    /// Close every queue and wait for already queued events to finish
    pub async fn shutdown(&self) {
        let workers: Vec<Worker> = lock(&self.workers).drain().map(|(_, worker)| worker).collect();
        let handles: Vec<JoinHandle<()>> = workers.into_iter()
            .map(|Worker { queue, handle, .. }| {
                drop(queue);
                handle
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Dispatcher worker failed: {}", e);
            }
        }
    }

    async fn worker(
        router: Arc<StateRouter>,
        bot: Arc<dyn Bot>,
        workers: Workers,
        key: UserId,
        id: u64,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(message) = rx.recv().await {
            process(&router, bot.as_ref(), &message).await;
            if Self::retire_if_idle(&workers, key, id, &rx) {
                tracing::debug!("Worker for {} retired", key);
                break;
            }
        }
    }

    /// Checked under the map lock, so `dispatch` either queues before the
    /// check or finds no worker and starts a new one.
    fn retire_if_idle(workers: &Workers, key: UserId, id: u64, rx: &mpsc::UnboundedReceiver<Message>) -> bool {
        let mut workers = lock(workers);
        if !rx.is_empty() {
            return false;
        }
        if workers.get(&key).is_some_and(|w| w.id == id) {
            workers.remove(&key);
        }
        true
    }
}

fn lock(workers: &Workers) -> MutexGuard<'_, HashMap<UserId, Worker>> {
    workers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle one event and deliver the reply, logging instead of failing
pub async fn process(router: &StateRouter, bot: &dyn Bot, message: &Message) {
    if let Content::CallbackData(_) = message.content {
        if let Err(e) = bot.answer_callback(&message.id, None).await {
            tracing::warn!("Failed to answer callback {}: {}", message.id, e);
        }
    }

    let Some(reply) = router.handle(message).await else {
        return;
    };

    tracing::info!(
        "Sending response to chat_id {}: {}",
        message.chat_id,
        reply.text.chars().take(100).collect::<String>()
    );
    if let Err(e) = bot.send_reply(message.chat_id, &reply).await {
        tracing::error!("Failed to send message: {}", e);
    }
}
