#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::collections::VecDeque;

use perp_types::{Address, BondQueue};

#[derive(Arbitrary, Debug)]
enum Op {
    Enqueue(u8),
    Dequeue,
    At(u8),
}

fuzz_target!(|ops: Vec<Op>| {
    let mut queue = BondQueue::new();
    let mut model: VecDeque<Address> = VecDeque::new();

    for op in ops {
        match op {
            Op::Enqueue(b) => {
                let addr = Address::from_byte(b);
                let ok = queue.enqueue(addr).is_ok();
                assert_eq!(ok, !model.contains(&addr));
                if ok {
                    model.push_back(addr);
                }
            }
            Op::Dequeue => {
                assert_eq!(queue.dequeue().ok(), model.pop_front());
            }
            Op::At(i) => {
                assert_eq!(queue.at(i as usize).ok(), model.get(i as usize).copied());
            }
        }
        assert_eq!(queue.len(), model.len());
        assert_eq!(queue.head(), model.front().copied());
        assert_eq!(queue.tail(), model.back().copied());
    }
});
