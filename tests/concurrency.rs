// Primitives shared across real threads
use std::sync::Arc;
use std::thread;

use schedsim::{MessageSystem, ProducerConsumer, ReceiveMode, Semaphore};

const ITEMS: usize = 50;

#[test]
fn threaded_producer_and_consumer_keep_order() {
    let buffer = Arc::new(ProducerConsumer::new(3));
    buffer.set_producer(1);
    buffer.set_consumer(2);

    let producer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || {
            for n in 0..ITEMS {
                while !buffer.produce(1, n.to_string()) {
                    thread::yield_now();
                }
            }
        })
    };
    let consumer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || {
            let mut seen = Vec::with_capacity(ITEMS);
            while seen.len() < ITEMS {
                match buffer.consume(2) {
                    Some(item) => seen.push(item),
                    None => thread::yield_now(),
                }
            }
            seen
        })
    };

    producer.join().unwrap();
    let seen = consumer.join().unwrap();

    let expected: Vec<String> = (0..ITEMS).map(|n| n.to_string()).collect();
    assert_eq!(seen, expected);

    let status = buffer.status();
    assert!(status.items.is_empty());
    assert_eq!(status.mutex_value, 1);
    assert_eq!(status.empty_slots, 3);
    assert_eq!(status.full_slots, 0);
}

#[test]
fn semaphore_permits_are_conserved_across_threads() {
    let sem = Arc::new(Semaphore::new("pool", 2));
    let workers: Vec<_> = (1..=4u64)
        .map(|pid| {
            let sem = Arc::clone(&sem);
            thread::spawn(move || {
                for _ in 0..25 {
                    while !sem.wait(pid) {
                        thread::yield_now();
                    }
                    assert!(sem.value() >= 0);
                    sem.signal(pid);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(sem.value(), 2);
}

#[test]
fn blocking_receive_sees_every_message() {
    let system = Arc::new(MessageSystem::new());
    system.create_queue(1);
    system.create_queue(2);

    let receiver = {
        let system = Arc::clone(&system);
        thread::spawn(move || {
            (0..10)
                .filter_map(|_| system.receive(2, ReceiveMode::Blocking))
                .map(|m| m.content)
                .collect::<Vec<_>>()
        })
    };
    for n in 0..10 {
        assert!(system.send(1, 2, format!("m{}", n)));
    }

    let received = receiver.join().unwrap();
    let expected: Vec<String> = (0..10).map(|n| format!("m{}", n)).collect();
    assert_eq!(received, expected);
}
