#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::collections::{BTreeSet, HashMap};
use vantage_realtime::pending::{Intent, PendingQueue};
use vantage_realtime::Channel;

#[derive(Debug, Arbitrary)]
enum Op {
    Subscribe(u8),
    Unsubscribe(u8),
    Flush,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut queue = PendingQueue::new();
    let mut counts: HashMap<u8, usize> = HashMap::new();
    let mut declared: BTreeSet<Channel> = BTreeSet::new();

    let channel = |c: u8| Channel::new(format!("ch{}", c % 8));

    for op in ops {
        match op {
            Op::Subscribe(c) => {
                let count = counts.entry(c % 8).or_insert(0);
                *count += 1;
                if *count == 1 {
                    queue.record(channel(c), Intent::Subscribe);
                }
            }
            Op::Unsubscribe(c) => {
                let count = counts.entry(c % 8).or_insert(0);
                if *count > 0 {
                    *count -= 1;
                    if *count == 0 {
                        queue.record(channel(c), Intent::Unsubscribe);
                    }
                }
            }
            Op::Flush => {
                let flush = queue.take();
                for c in flush.subscribe {
                    assert!(declared.insert(c));
                }
                for c in flush.unsubscribe {
                    assert!(declared.remove(&c));
                }
            }
        }
    }

    let flush = queue.take();
    declared.extend(flush.subscribe);
    for c in &flush.unsubscribe {
        declared.remove(c);
    }
    let active: BTreeSet<Channel> = counts
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(c, _)| channel(*c))
        .collect();
    assert_eq!(declared, active);
});
