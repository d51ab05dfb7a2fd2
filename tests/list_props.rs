//! Random insert/remove sequences against a plain Vec model: the sorted
//! list stays sorted and FIFO on ties, lengths match, links stay whole.

use proptest::prelude::*;

use pulp_coro::kernel::list::{ItemId, ListArena, ListId};
use pulp_coro::{MAX_DELAY, TickType};

const ITEMS: usize = 8;
const SORTED: ListId = ListId::new(0);
const ROUND_ROBIN: ListId = ListId::new(1);

type Arena = ListArena<usize, ITEMS, 2>;

#[derive(Debug, Clone)]
enum Op {
    Insert { item: usize, value: TickType },
    InsertEnd { item: usize },
    Remove { item: usize },
    Rotate,
}

fn op() -> impl Strategy<Value = Op> {
    let value = prop_oneof![4 => 0 as TickType..6, 1 => Just(MAX_DELAY)];
    prop_oneof![
        (0..ITEMS, value).prop_map(|(item, value)| Op::Insert { item, value }),
        (0..ITEMS).prop_map(|item| Op::InsertEnd { item }),
        (0..ITEMS).prop_map(|item| Op::Remove { item }),
        Just(Op::Rotate),
    ]
}

fn fresh() -> Arena {
    let mut arena = Arena::new();
    arena.initialise(SORTED);
    arena.initialise(ROUND_ROBIN);
    for i in 0..ITEMS {
        arena.initialise_item(ItemId::new(i));
        arena.set_owner(ItemId::new(i), i);
    }
    arena
}

proptest! {
    #[test]
    fn lists_hold_their_invariants(ops in prop::collection::vec(op(), 0..80)) {
        let mut arena = fresh();
        // (value, item) in expected walk order
        let mut sorted: Vec<(TickType, usize)> = Vec::new();
        let mut rr_members: Vec<usize> = Vec::new();

        for op in ops {
            match op {
                Op::Insert { item, value } => {
                    let id = ItemId::new(item);
                    if arena.container(id).is_none() {
                        arena.set_value(id, value);
                        arena.insert(SORTED, id);
                        let at = sorted.partition_point(|&(v, _)| v <= value);
                        sorted.insert(at, (value, item));
                    }
                }
                Op::InsertEnd { item } => {
                    let id = ItemId::new(item);
                    if arena.container(id).is_none() {
                        arena.insert_end(ROUND_ROBIN, id);
                        rr_members.push(item);
                    }
                }
                Op::Remove { item } => {
                    let id = ItemId::new(item);
                    match arena.container(id) {
                        Some(list) if list == SORTED => {
                            let left = arena.remove(id);
                            sorted.retain(|&(_, i)| i != item);
                            prop_assert_eq!(left, sorted.len());
                        }
                        Some(_) => {
                            let left = arena.remove(id);
                            rr_members.retain(|&i| i != item);
                            prop_assert_eq!(left, rr_members.len());
                        }
                        None => {}
                    }
                    prop_assert_eq!(arena.container(id), None);
                }
                Op::Rotate => {
                    let owner = arena.next_owner(ROUND_ROBIN);
                    prop_assert_eq!(owner.is_some(), !rr_members.is_empty());
                }
            }

            prop_assert_eq!(arena.check_integrity(SORTED), Ok(()));
            prop_assert_eq!(arena.check_integrity(ROUND_ROBIN), Ok(()));
            prop_assert!(arena.is_sorted(SORTED));

            let walk: Vec<usize> = arena
                .iter(SORTED)
                .map(|id| arena.owner(id).unwrap())
                .collect();
            let expected: Vec<usize> = sorted.iter().map(|&(_, i)| i).collect();
            prop_assert_eq!(walk, expected);
            prop_assert_eq!(arena.len(ROUND_ROBIN), rr_members.len());
        }

        // one full rotation visits every member exactly once
        let n = rr_members.len();
        let mut seen: Vec<usize> = (0..n)
            .map(|_| arena.next_owner(ROUND_ROBIN).unwrap())
            .collect();
        seen.sort_unstable();
        let mut members = rr_members.clone();
        members.sort_unstable();
        prop_assert_eq!(seen, members);
    }

    #[test]
    fn rotation_follows_arrival_order(n in 1usize..=ITEMS, laps in 1usize..4) {
        let mut arena = fresh();
        for i in 0..n {
            arena.insert_end(ROUND_ROBIN, ItemId::new(i));
        }
        for lap in 0..laps {
            for i in 0..n {
                prop_assert_eq!(arena.next_owner(ROUND_ROBIN), Some(i), "lap {}", lap);
            }
        }
    }
}
