// Inter-process communication: mailboxes, semaphores, bounded buffer
//
// These primitives know nothing about the scheduler. Processes take part by
// PID only, and "blocked" is always a returned status, never a real pause.
pub mod mailbox;
pub mod producer_consumer;
pub mod semaphore;
