// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Multicast mailboxes connecting pipeline stages.
//!
//! Every subscriber owns a private FIFO; `put` appends the same `Arc`
//! to each of them, so a message lives until the slowest subscriber has
//! taken it. Messages from one producer reach each subscriber in the
//! order they were put.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::MailboxError;

/// Read cursor handle returned by [`Mailbox::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct Subscription<T> {
    posted: Mutex<VecDeque<Arc<T>>>,
    post_cond: Condvar,
}

impl<T> Subscription<T> {
    fn new() -> Self {
        Self {
            posted: Mutex::new(VecDeque::new()),
            post_cond: Condvar::new(),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Arc<T>>> {
        self.posted.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct Mailbox<T> {
    name: String,
    subscriptions: Mutex<HashMap<SubscriberId, Arc<Subscription<T>>>>,
    put_count: AtomicU64,
}

impl<T: Send + Sync + 'static> Mailbox<T> {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            subscriptions: Mutex::new(HashMap::new()),
            put_count: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn subscriptions(&self) -> MutexGuard<'_, HashMap<SubscriberId, Arc<Subscription<T>>>> {
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn subscription(&self, id: SubscriberId) -> Option<Arc<Subscription<T>>> {
        self.subscriptions().get(&id).cloned()
    }

    /// Open a new read cursor. Only messages put after this call are seen.
    pub fn subscribe(&self) -> SubscriberId {
        let id = SubscriberId::new();
        self.subscriptions().insert(id, Arc::new(Subscription::new()));
        debug!("mailbox {}: subscriber {:?} added", self.name, id);
        id
    }

    /// Drop a cursor along with anything still queued for it.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if let Some(sub) = self.subscriptions().remove(&id) {
            sub.queue().clear();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions().len()
    }

    pub fn put(&self, msg: T) {
        self.put_arc(Arc::new(msg));
    }

    /// Deliver `msg` to every current subscriber. Never blocks on readers.
    pub fn put_arc(&self, msg: Arc<T>) {
        let subs = self.subscriptions();
        self.put_count.fetch_add(1, Ordering::Relaxed);
        for sub in subs.values() {
            sub.queue().push_back(Arc::clone(&msg));
            sub.post_cond.notify_all();
        }
    }

    /// Total number of messages put since creation.
    pub fn put_count(&self) -> u64 {
        self.put_count.load(Ordering::Relaxed)
    }

    /// Next unseen message for `id`, or `None` when nothing is pending or
    /// `id` is not subscribed.
    pub fn get(&self, id: SubscriberId) -> Option<Arc<T>> {
        self.subscription(id)?.queue().pop_front()
    }

    /// Like [`Mailbox::get`] but waits up to `timeout` for a message.
    pub fn get_timeout(&self, id: SubscriberId, timeout: Duration) -> Option<Arc<T>> {
        let sub = self.subscription(id)?;
        let deadline = Instant::now() + timeout;
        let mut queue = sub.queue();
        loop {
            if let Some(msg) = queue.pop_front() {
                return Some(msg);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            queue = match sub.post_cond.wait_timeout(queue, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Longest backlog over all subscribers.
    pub fn in_flight_count(&self) -> usize {
        self.subscriptions()
            .values()
            .map(|sub| sub.queue().len())
            .max()
            .unwrap_or(0)
    }

    /// Backlog of a single subscriber.
    pub fn pending(&self, id: SubscriberId) -> usize {
        self.subscription(id).map_or(0, |sub| sub.queue().len())
    }

    /// Discard everything queued for `id`. Returns false for an unknown id.
    pub fn flush(&self, id: SubscriberId) -> bool {
        match self.subscription(id) {
            Some(sub) => {
                sub.queue().clear();
                true
            }
            None => false,
        }
    }
}

/// A mailbox together with one read cursor on it.
///
/// Stages hold one of these per input stream; dropping it unsubscribes.
pub struct Subscriber<T: Send + Sync + 'static> {
    mailbox: Arc<Mailbox<T>>,
    id: SubscriberId,
}

impl<T: Send + Sync + 'static> Subscriber<T> {
    pub fn attach(mailbox: &Arc<Mailbox<T>>) -> Self {
        Self {
            id: mailbox.subscribe(),
            mailbox: Arc::clone(mailbox),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.mailbox.get(self.id)
    }

    pub fn get_timeout(&self, timeout: Duration) -> Option<Arc<T>> {
        self.mailbox.get_timeout(self.id, timeout)
    }

    pub fn pending(&self) -> usize {
        self.mailbox.pending(self.id)
    }

    pub fn flush(&self) {
        self.mailbox.flush(self.id);
    }

    /// Post to the same mailbox this cursor reads from.
    pub fn put(&self, msg: T) {
        self.mailbox.put(msg);
    }

    pub fn mailbox(&self) -> &Arc<Mailbox<T>> {
        &self.mailbox
    }
}

impl<T: Send + Sync + 'static> Drop for Subscriber<T> {
    fn drop(&mut self) {
        self.mailbox.unsubscribe(self.id);
    }
}

/// Named mailboxes of mixed message types, created once while wiring the
/// pipeline and looked up by the stages that subscribe to them.
#[derive(Default)]
pub struct MailboxRegistry {
    boxes: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl MailboxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn boxes(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn Any + Send + Sync>>> {
        self.boxes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add<T: Send + Sync + 'static>(&self, mailbox: Arc<Mailbox<T>>) -> Result<(), MailboxError> {
        let mut boxes = self.boxes();
        let name = mailbox.name().to_string();
        if boxes.contains_key(&name) {
            return Err(MailboxError::Exists(name));
        }
        boxes.insert(name, mailbox);
        Ok(())
    }

    /// Create and register a fresh mailbox in one step.
    pub fn create<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<Mailbox<T>>, MailboxError> {
        let mailbox = Mailbox::new(name);
        self.add(Arc::clone(&mailbox))?;
        Ok(mailbox)
    }

    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<Mailbox<T>>, MailboxError> {
        let entry = self
            .boxes()
            .get(name)
            .cloned()
            .ok_or_else(|| MailboxError::Missing(name.to_string()))?;
        entry
            .downcast::<Mailbox<T>>()
            .map_err(|_| MailboxError::WrongType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.boxes().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.boxes().keys().cloned().collect();
        names.sort();
        names
    }
}
