//! Stress and property tests
//!
//! Long randomized operation sequences against the tree, the iterator and
//! the index, each checked against a brute-force model.

use std::collections::HashMap;

use quickcheck::{Arbitrary, Gen, QuickCheck};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::interval::{Interval, IntervalTree, NodeId, TopKIterator};
use crate::IntervalIndex;

/// Brute-force ranked overlap query
fn model_top(model: &HashMap<String, (i64, i64, u64)>, low: i64, high: i64) -> Vec<(String, u64)> {
    let mut hits: Vec<(String, u64)> = model
        .iter()
        .filter(|(_, (l, h, _))| *h >= low && high >= *l)
        .map(|(id, (_, _, rank))| (id.clone(), *rank))
        .collect();
    hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    hits
}

/// Sort equal-rank runs by id so ranked output can be compared exactly.
fn normalize(mut hits: Vec<(String, u64)>) -> Vec<(String, u64)> {
    hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    hits
}

#[test]
fn stress_index_against_model() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut index: IntervalIndex<i64> = IntervalIndex::new();
    let mut model: HashMap<String, (i64, i64, u64)> = HashMap::new();

    for step in 0..20_000 {
        let id = format!("g{}+{}", rng.gen_range(0..20), rng.gen_range(0..100));
        match rng.gen_range(0..10) {
            0..=5 => {
                let low = rng.gen_range(-1000..1000);
                let high = low + rng.gen_range(0..100);
                let rank = rng.gen_range(0..50);
                index.insert(id.clone(), low, high, rank).unwrap();
                model.insert(id, (low, high, rank));
            }
            6..=8 => {
                let existed = model.remove(&id).is_some();
                assert_eq!(index.delete(&id).unwrap(), existed);
            }
            _ => {
                let prefix = format!("g{}", rng.gen_range(0..20));
                let before = model.len();
                model.retain(|k, _| !k.starts_with(&format!("{}+", prefix)));
                assert_eq!(index.delete_prefix(&prefix).unwrap(), before - model.len());
            }
        }

        if step % 500 == 0 {
            index.tree().validate().unwrap();
            assert_eq!(index.len(), model.len());

            let low = rng.gen_range(-1000..1000);
            let high = low + rng.gen_range(0..300);
            let expected = model_top(&model, low, high);

            if !index.is_empty() {
                let streamed: Vec<(String, u64)> = index
                    .iter_top(low, high)
                    .unwrap()
                    .map(|i| (i.id.clone(), i.rank))
                    .collect();
                assert!(streamed.windows(2).all(|w| w[0].1 >= w[1].1));
                assert_eq!(normalize(streamed), expected);
            }

            let k = rng.gen_range(1..10);
            let scanned: Vec<u64> = index.top_k(&low, &high, k).iter().map(|i| i.rank).collect();
            let expected_ranks: Vec<u64> = expected.iter().take(k).map(|(_, r)| *r).collect();
            assert_eq!(scanned, expected_ranks);
        }
    }
    index.tree().validate().unwrap();
}

#[test]
fn stress_early_stop_visits_less() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut tree = IntervalTree::new();
    for i in 0..50_000u64 {
        let low: i64 = rng.gen_range(0..1_000_000);
        let high = low + rng.gen_range(0..1_000);
        tree.insert(Interval::new(format!("i{}", i), low, high, rng.gen_range(0..u64::MAX / 2)))
            .unwrap();
    }

    let mut it = TopKIterator::new(&tree);
    it.start(0, 1_000_000).unwrap();
    let top: Vec<u64> = it.by_ref().take(10).map(|i| i.rank).collect();
    assert_eq!(top.len(), 10);
    assert!(top.windows(2).all(|w| w[0] >= w[1]));
    assert!(it.visited() < 2_000, "visited {}", it.visited());
}

/// One step of a tree workload
#[derive(Debug, Clone)]
enum Op {
    Insert { low: i16, len: u8, rank: u16 },
    Remove(usize),
    Query { low: i16, len: u8 },
}

impl Arbitrary for Op {
    fn arbitrary(g: &mut Gen) -> Self {
        match u8::arbitrary(g) % 4 {
            0 | 1 => Op::Insert {
                low: i16::arbitrary(g),
                len: u8::arbitrary(g),
                rank: u16::arbitrary(g),
            },
            2 => Op::Remove(usize::arbitrary(g)),
            _ => Op::Query {
                low: i16::arbitrary(g),
                len: u8::arbitrary(g),
            },
        }
    }
}

fn tree_matches_model(ops: Vec<Op>) -> bool {
    let mut tree: IntervalTree<i32> = IntervalTree::new();
    let mut live: Vec<(NodeId, Interval<i32>)> = Vec::new();

    for (step, op) in ops.into_iter().enumerate() {
        match op {
            Op::Insert { low, len, rank } => {
                let low = i32::from(low);
                let interval = Interval::new(format!("n{}", step), low, low + i32::from(len), u64::from(rank));
                let Ok(node) = tree.insert(interval.clone()) else { return false };
                live.push((node, interval));
            }
            Op::Remove(pick) => {
                if live.is_empty() {
                    continue;
                }
                let (node, interval) = live.swap_remove(pick % live.len());
                match tree.remove(node) {
                    Ok(removed) if removed.id == interval.id => {}
                    _ => return false,
                }
            }
            Op::Query { low, len } => {
                if live.is_empty() {
                    continue;
                }
                let low = i32::from(low);
                let high = low + i32::from(len);
                let mut it = TopKIterator::new(&tree);
                if it.start(low, high).is_err() {
                    return false;
                }
                let mut got: Vec<(String, u64)> = it.by_ref().map(|i| (i.id.clone(), i.rank)).collect();
                if !got.windows(2).all(|w| w[0].1 >= w[1].1) {
                    return false;
                }
                let mut expected: Vec<(String, u64)> = live
                    .iter()
                    .map(|(_, i)| i)
                    .filter(|i| i.overlaps_range(&low, &high))
                    .map(|i| (i.id.clone(), i.rank))
                    .collect();
                got.sort();
                expected.sort();
                if got != expected {
                    return false;
                }
            }
        }
        if tree.validate().is_err() {
            return false;
        }
    }
    tree.len() == live.len()
}

#[test]
fn quickcheck_tree_operations() {
    QuickCheck::new()
        .tests(300)
        .quickcheck(tree_matches_model as fn(Vec<Op>) -> bool);
}

fn ordered_by_low(entries: Vec<(i8, u8)>) -> bool {
    let mut tree: IntervalTree<i8> = IntervalTree::new();
    for (i, (low, rank)) in entries.iter().enumerate() {
        if tree.insert(Interval::new(i.to_string(), *low, *low, u64::from(*rank))).is_err() {
            return false;
        }
    }
    let lows: Vec<i8> = tree.iter().map(|(_, i)| i.low).collect();
    let mut sorted: Vec<i8> = entries.iter().map(|(low, _)| *low).collect();
    sorted.sort();
    lows == sorted
}

#[test]
fn quickcheck_in_order_walk_is_sorted() {
    QuickCheck::new()
        .tests(500)
        .quickcheck(ordered_by_low as fn(Vec<(i8, u8)>) -> bool);
}
