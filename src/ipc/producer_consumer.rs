// Bounded buffer guarded by three semaphores (mutex / empty / full)
use std::collections::VecDeque;
use std::fmt;

use log::debug;
use serde::Serialize;
use spin::Mutex;

use crate::ipc::semaphore::{Semaphore, SemaphoreEvent};
use crate::process::pcb::ProcessId;

/// Which side of the buffer a process is acting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Producer,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// Buffer-level events, kept apart from the semaphores' own logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BufferEvent {
    Registered { pid: ProcessId, role: Role },
    WrongRole { pid: ProcessId, role: Role },
    Full { pid: ProcessId },
    Empty { pid: ProcessId },
    MutexBusy { pid: ProcessId, role: Role },
    Produced { pid: ProcessId, item: String, len: usize, capacity: usize },
    Consumed { pid: ProcessId, item: String, len: usize, capacity: usize },
}

impl fmt::Display for BufferEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BufferEvent::Registered { pid, role } => {
                write!(f, "process {} registered as {}", pid, role)
            }
            BufferEvent::WrongRole { pid, role } => {
                write!(f, "process {} is not the registered {}", pid, role)
            }
            BufferEvent::Full { pid } => write!(f, "producer {} blocked: buffer full", pid),
            BufferEvent::Empty { pid } => write!(f, "consumer {} blocked: buffer empty", pid),
            BufferEvent::MutexBusy { pid, role } => {
                write!(f, "{} {} blocked: buffer is locked", role, pid)
            }
            BufferEvent::Produced { pid, item, len, capacity } => {
                write!(f, "producer {}: produced '{}' -> buffer {}/{}", pid, item, len, capacity)
            }
            BufferEvent::Consumed { pid, item, len, capacity } => {
                write!(f, "consumer {}: consumed '{}' -> buffer {}/{}", pid, item, len, capacity)
            }
        }
    }
}

/// One line of the combined producer/consumer log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BufferLogEntry {
    Buffer(BufferEvent),
    Semaphore(SemaphoreEvent),
}

impl fmt::Display for BufferLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BufferLogEntry::Buffer(e) => e.fmt(f),
            BufferLogEntry::Semaphore(e) => e.fmt(f),
        }
    }
}

/// Snapshot of the buffer and its semaphores
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferStatus {
    pub capacity: usize,
    pub items: Vec<String>,
    pub mutex_value: i64,
    pub empty_slots: i64,
    pub full_slots: i64,
    pub producer_pid: Option<ProcessId>,
    pub consumer_pid: Option<ProcessId>,
    pub mutex_waiting: Vec<ProcessId>,
    pub empty_waiting: Vec<ProcessId>,
    pub full_waiting: Vec<ProcessId>,
}

#[derive(Default)]
struct Roles {
    producer: Option<ProcessId>,
    consumer: Option<ProcessId>,
}

/// Classic producer/consumer buffer.
///
/// `empty` counts free slots, `full` counts filled slots and `mutex` guards
/// the item queue. Neither `produce` nor `consume` ever blocks; a `false` /
/// `None` result means "blocked, try again later" and leaves every permit as
/// it was.
pub struct ProducerConsumer {
    capacity: usize,
    buffer: Mutex<VecDeque<String>>,
    mutex: Semaphore,
    empty: Semaphore,
    full: Semaphore,
    roles: Mutex<Roles>,
    log: Mutex<Vec<BufferEvent>>,
}

impl ProducerConsumer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            mutex: Semaphore::new("mutex", 1),
            empty: Semaphore::new("empty", capacity as i64),
            full: Semaphore::new("full", 0),
            roles: Mutex::new(Roles::default()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Only `pid` may produce from now on
    pub fn set_producer(&self, pid: ProcessId) {
        self.roles.lock().producer = Some(pid);
        self.push_event(BufferEvent::Registered { pid, role: Role::Producer });
    }

    /// Only `pid` may consume from now on
    pub fn set_consumer(&self, pid: ProcessId) {
        self.roles.lock().consumer = Some(pid);
        self.push_event(BufferEvent::Registered { pid, role: Role::Consumer });
    }

    pub fn producer(&self) -> Option<ProcessId> {
        self.roles.lock().producer
    }

    pub fn consumer(&self) -> Option<ProcessId> {
        self.roles.lock().consumer
    }

    /// Append `item`. Returns false if `pid` is not the registered producer,
    /// the buffer is full, or the buffer is locked.
    pub fn produce(&self, pid: ProcessId, item: impl Into<String>) -> bool {
        if !self.allowed(pid, Role::Producer) {
            self.push_event(BufferEvent::WrongRole { pid, role: Role::Producer });
            return false;
        }

        if !self.empty.wait(pid) {
            self.push_event(BufferEvent::Full { pid });
            return false;
        }

        if !self.mutex.wait(pid) {
            // give the reserved slot back
            self.empty.signal(pid);
            self.push_event(BufferEvent::MutexBusy { pid, role: Role::Producer });
            return false;
        }

        let item = item.into();
        let len = {
            let mut buffer = self.buffer.lock();
            buffer.push_back(item.clone());
            buffer.len()
        };
        debug_assert!(len <= self.capacity, "buffer overflow");
        self.push_event(BufferEvent::Produced {
            pid,
            item,
            len,
            capacity: self.capacity,
        });

        self.mutex.signal(pid);
        self.full.signal(pid);
        true
    }

    /// Take the oldest item. Returns `None` if `pid` is not the registered
    /// consumer, the buffer is empty, or the buffer is locked.
    pub fn consume(&self, pid: ProcessId) -> Option<String> {
        if !self.allowed(pid, Role::Consumer) {
            self.push_event(BufferEvent::WrongRole { pid, role: Role::Consumer });
            return None;
        }

        if !self.full.wait(pid) {
            self.push_event(BufferEvent::Empty { pid });
            return None;
        }

        if !self.mutex.wait(pid) {
            self.full.signal(pid);
            self.push_event(BufferEvent::MutexBusy { pid, role: Role::Consumer });
            return None;
        }

        let (item, len) = {
            let mut buffer = self.buffer.lock();
            (buffer.pop_front(), buffer.len())
        };

        debug_assert!(item.is_some(), "full semaphore out of step with buffer");
        let Some(item) = item else {
            // full said there was an item; put the permits back as they were
            self.mutex.signal(pid);
            self.full.signal(pid);
            return None;
        };
        self.push_event(BufferEvent::Consumed {
            pid,
            item: item.clone(),
            len,
            capacity: self.capacity,
        });

        self.mutex.signal(pid);
        self.empty.signal(pid);
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn status(&self) -> BufferStatus {
        let items = self.buffer.lock().iter().cloned().collect();
        let roles = self.roles.lock();
        BufferStatus {
            capacity: self.capacity,
            items,
            mutex_value: self.mutex.value(),
            empty_slots: self.empty.value(),
            full_slots: self.full.value(),
            producer_pid: roles.producer,
            consumer_pid: roles.consumer,
            mutex_waiting: self.mutex.waiting(),
            empty_waiting: self.empty.waiting(),
            full_waiting: self.full.waiting(),
        }
    }

    /// Buffer events, then the mutex, empty and full semaphore logs
    pub fn logs(&self) -> Vec<BufferLogEntry> {
        let mut entries: Vec<BufferLogEntry> = self
            .log
            .lock()
            .iter()
            .cloned()
            .map(BufferLogEntry::Buffer)
            .collect();
        for sem in [&self.mutex, &self.empty, &self.full] {
            entries.extend(sem.log().into_iter().map(BufferLogEntry::Semaphore));
        }
        entries
    }

    pub fn mutex(&self) -> &Semaphore {
        &self.mutex
    }

    pub fn empty(&self) -> &Semaphore {
        &self.empty
    }

    pub fn full(&self) -> &Semaphore {
        &self.full
    }

    fn allowed(&self, pid: ProcessId, role: Role) -> bool {
        let roles = self.roles.lock();
        let registered = match role {
            Role::Producer => roles.producer,
            Role::Consumer => roles.consumer,
        };
        registered.map_or(true, |owner| owner == pid)
    }

    fn push_event(&self, event: BufferEvent) {
        debug!("{}", event);
        self.log.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_two_blocks_third_produce() {
        let pc = ProducerConsumer::new(2);
        assert!(pc.produce(1, "a"));
        assert!(pc.produce(1, "b"));
        assert!(!pc.produce(1, "c"));
        let status = pc.status();
        assert_eq!(status.empty_slots, 0);
        assert_eq!(status.full_slots, 2);
        assert_eq!(status.items, vec!["a", "b"]);
        assert_eq!(status.empty_waiting, vec![1]);
    }

    #[test]
    fn consume_is_fifo() {
        let pc = ProducerConsumer::new(3);
        for item in ["x", "y", "z"] {
            assert!(pc.produce(1, item));
        }
        assert_eq!(pc.consume(2).as_deref(), Some("x"));
        assert_eq!(pc.consume(2).as_deref(), Some("y"));
        assert_eq!(pc.consume(2).as_deref(), Some("z"));
        assert_eq!(pc.consume(2), None);
        assert_eq!(pc.status().empty_slots, 3);
    }

    #[test]
    fn consume_on_empty_buffer_is_rejected() {
        let pc = ProducerConsumer::new(1);
        assert_eq!(pc.consume(5), None);
        assert_eq!(pc.status().full_waiting, vec![5]);
        assert_eq!(pc.status().full_slots, 0);
    }

    #[test]
    fn roles_are_enforced_without_touching_semaphores() {
        let pc = ProducerConsumer::new(2);
        pc.set_producer(1);
        pc.set_consumer(2);
        assert!(!pc.produce(3, "nope"));
        assert!(pc.produce(1, "ok"));
        assert_eq!(pc.consume(1), None);
        assert_eq!(pc.consume(2).as_deref(), Some("ok"));

        let status = pc.status();
        assert_eq!(status.empty_slots, 2);
        assert_eq!(status.full_slots, 0);
        assert_eq!(status.mutex_value, 1);
        assert!(status.full_waiting.is_empty());
    }

    #[test]
    fn busy_mutex_returns_the_reserved_slot() {
        let pc = ProducerConsumer::new(2);
        // someone else is inside the critical section
        assert!(pc.mutex().wait(99));

        assert!(!pc.produce(1, "a"));
        assert_eq!(pc.empty().value(), 2);
        assert_eq!(pc.mutex().waiting(), vec![1]);
        assert!(pc.is_empty());

        pc.mutex().signal(99);
        assert!(pc.produce(1, "a"));
        assert!(pc.mutex().wait(99));
        assert_eq!(pc.consume(2), None);
        assert_eq!(pc.full().value(), 1);
    }

    #[test]
    fn length_plus_free_slots_equals_capacity() {
        let pc = ProducerConsumer::new(4);
        let ops: [bool; 8] = [true, true, false, true, true, true, false, false];
        for (i, produce) in ops.iter().enumerate() {
            if *produce {
                pc.produce(1, format!("item{}", i));
            } else {
                pc.consume(2);
            }
            assert_eq!(pc.len() as i64 + pc.empty().value(), pc.capacity() as i64);
            assert!(pc.len() <= pc.capacity());
        }
    }

    #[test]
    fn logs_list_buffer_events_before_semaphores() {
        let pc = ProducerConsumer::new(1);
        pc.set_producer(1);
        pc.produce(1, "a");
        let logs = pc.logs();
        assert_eq!(logs[0].to_string(), "process 1 registered as producer");
        assert_eq!(logs[1].to_string(), "producer 1: produced 'a' -> buffer 1/1");
        assert!(matches!(logs[2], BufferLogEntry::Semaphore(ref e) if e.semaphore == "mutex"));
        assert!(matches!(logs.last(), Some(BufferLogEntry::Semaphore(e)) if e.semaphore == "full"));
    }
}
