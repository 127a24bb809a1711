// Per-process mailboxes
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use spin::Mutex;

use crate::process::pcb::ProcessId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Global, increasing across all mailboxes
    pub id: u64,
    pub sender: ProcessId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiveMode {
    /// Return `None` straight away when the mailbox is empty
    #[default]
    NonBlocking,
    /// Yield until a message arrives or the mailbox is removed
    Blocking,
}

/// One FIFO inbox per registered PID
pub struct MessageSystem {
    queues: Mutex<BTreeMap<ProcessId, VecDeque<Message>>>,
    next_message_id: AtomicU64,
}

impl Default for MessageSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSystem {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(BTreeMap::new()),
            next_message_id: AtomicU64::new(1),
        }
    }

    /// Open a mailbox for `pid`. Does nothing if it already has one.
    pub fn create_queue(&self, pid: ProcessId) {
        self.queues.lock().entry(pid).or_default();
    }

    /// Drop `pid`'s mailbox and anything still in it. Does nothing if there
    /// is none.
    pub fn remove_queue(&self, pid: ProcessId) {
        if let Some(pending) = self.queues.lock().remove(&pid) {
            debug!("removed mailbox of process {} ({} unread)", pid, pending.len());
        }
    }

    pub fn has_queue(&self, pid: ProcessId) -> bool {
        self.queues.lock().contains_key(&pid)
    }

    /// Deliver `content` from `sender` to `receiver`.
    ///
    /// Both processes need a mailbox, otherwise nothing is sent and no
    /// message ID is used up.
    pub fn send(&self, sender: ProcessId, receiver: ProcessId, content: impl Into<String>) -> bool {
        let mut queues = self.queues.lock();
        if !queues.contains_key(&sender) {
            return false;
        }
        let Some(inbox) = queues.get_mut(&receiver) else {
            return false;
        };

        let message = Message {
            id: self.next_message_id.fetch_add(1, Ordering::Relaxed),
            sender,
            content: content.into(),
            timestamp: Utc::now(),
        };
        debug!("message {} sent from {} to {}", message.id, sender, receiver);
        inbox.push_back(message);
        true
    }

    /// Take the oldest message for `pid`.
    ///
    /// Unknown PIDs get `None` in either mode.
    pub fn receive(&self, pid: ProcessId, mode: ReceiveMode) -> Option<Message> {
        loop {
            {
                let mut queues = self.queues.lock();
                let inbox = queues.get_mut(&pid)?;
                if let Some(message) = inbox.pop_front() {
                    return Some(message);
                }
            }
            if mode == ReceiveMode::NonBlocking {
                return None;
            }
            std::thread::yield_now();
        }
    }

    /// Look at the oldest message without removing it
    pub fn peek(&self, pid: ProcessId) -> Option<Message> {
        self.queues.lock().get(&pid)?.front().cloned()
    }

    /// Number of unread messages; 0 for unknown PIDs
    pub fn queue_size(&self, pid: ProcessId) -> usize {
        self.queues.lock().get(&pid).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_with(pids: &[ProcessId]) -> MessageSystem {
        let system = MessageSystem::new();
        for &pid in pids {
            system.create_queue(pid);
        }
        system
    }

    #[test]
    fn send_then_receive_once() {
        let system = system_with(&[1, 2]);
        assert!(system.send(1, 2, "hello"));
        let message = system.receive(2, ReceiveMode::NonBlocking).unwrap();
        assert_eq!(message.content, "hello");
        assert_eq!(message.sender, 1);
        assert_eq!(message.id, 1);
        assert_eq!(system.receive(2, ReceiveMode::NonBlocking), None);
    }

    #[test]
    fn send_requires_both_mailboxes() {
        let system = system_with(&[1]);
        assert!(!system.send(1, 2, "lost"));
        assert!(!system.send(3, 1, "lost"));
        assert_eq!(system.queue_size(1), 0);
        // failed sends do not use up ids
        system.create_queue(2);
        assert!(system.send(1, 2, "found"));
        assert_eq!(system.peek(2).unwrap().id, 1);
    }

    #[test]
    fn fifo_order_and_peek() {
        let system = system_with(&[1, 2, 3]);
        system.send(1, 3, "first");
        system.send(2, 3, "second");
        assert_eq!(system.queue_size(3), 2);
        assert_eq!(system.peek(3).unwrap().content, "first");
        assert_eq!(system.queue_size(3), 2);
        assert_eq!(system.receive(3, ReceiveMode::NonBlocking).unwrap().content, "first");
        let second = system.receive(3, ReceiveMode::NonBlocking).unwrap();
        assert_eq!((second.id, second.sender), (2, 2));
    }

    #[test]
    fn create_and_remove_are_idempotent() {
        let system = system_with(&[1, 2]);
        system.send(1, 2, "kept");
        system.create_queue(2);
        assert_eq!(system.queue_size(2), 1);
        system.remove_queue(2);
        system.remove_queue(2);
        assert!(!system.has_queue(2));
        assert_eq!(system.receive(2, ReceiveMode::Blocking), None);
        assert_eq!(system.peek(2), None);
    }

    #[test]
    fn blocking_receive_waits_for_sender() {
        use std::sync::Arc;
        use std::thread;

        let system = Arc::new(system_with(&[1, 2]));
        let receiver = {
            let system = Arc::clone(&system);
            thread::spawn(move || system.receive(2, ReceiveMode::Blocking))
        };
        assert!(system.send(1, 2, "wake up"));
        let message = receiver.join().unwrap().unwrap();
        assert_eq!(message.content, "wake up");
    }
}
