// Event (wait) lists and the pending-ready hand-off
//
// This is the only co-routine state an interrupt can reach. It holds
// every co-routine's event item, the wait lists those items sit on and
// the pending-ready list. An ISR unblocking a waiter moves its event
// item onto pending-ready; the scheduler drains that list into the real
// ready lists on its next run, outside interrupt context.
//
// Every access takes the critical section for one list operation.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;

use super::list::{ItemId, ListArena, ListId};
use super::scheduler::CoRoutineHandle;
use crate::config::{EVENT_ARENA_LISTS, MAX_CO_ROUTINES, MAX_EVENT_LISTS, MAX_PRIORITIES, TickType};

const PENDING_READY: ListId = ListId::new(MAX_EVENT_LISTS);

/// A wait list handed out by [`EventLists::create_list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventListId(ListId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventError {
    /// all MAX_EVENT_LISTS wait lists are in use
    NoFreeList,
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::NoFreeList => write!(f, "no free event list"),
        }
    }
}

struct Shared {
    arena: ListArena<CoRoutineHandle, MAX_CO_ROUTINES, EVENT_ARENA_LISTS>,
    allocated: usize,
    running_priority: usize,
}

pub struct EventLists {
    shared: Mutex<RefCell<Shared>>,
}

impl EventLists {
    pub const fn new() -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared {
                arena: ListArena::new(),
                allocated: 0,
                running_priority: 0,
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        critical_section::with(|cs| f(&mut self.shared.borrow_ref_mut(cs)))
    }

    pub fn create_list(&self) -> Result<EventListId, EventError> {
        self.with(|s| {
            if s.allocated >= MAX_EVENT_LISTS {
                return Err(EventError::NoFreeList);
            }
            let id = ListId::new(s.allocated);
            s.arena.initialise(id);
            s.allocated += 1;
            Ok(EventListId(id))
        })
    }

    pub fn is_empty(&self, list: EventListId) -> bool {
        self.with(|s| s.arena.is_empty(list.0))
    }

    pub fn len(&self, list: EventListId) -> usize {
        self.with(|s| s.arena.len(list.0))
    }

    /// Co-routine at the head of `list`, i.e. the highest-priority waiter.
    pub fn head(&self, list: EventListId) -> Option<CoRoutineHandle> {
        self.with(|s| s.arena.head_owner(list.0))
    }

    pub fn is_waiting_on(&self, list: EventListId, handle: CoRoutineHandle) -> bool {
        self.with(|s| s.arena.is_contained_within(list.0, event_item(handle)))
    }

    pub fn is_pending_ready(&self, handle: CoRoutineHandle) -> bool {
        self.with(|s| s.arena.is_contained_within(PENDING_READY, event_item(handle)))
    }

    pub fn pending_ready_len(&self) -> usize {
        self.with(|s| s.arena.len(PENDING_READY))
    }

    /// Unblock the highest-priority waiter on `list`. Safe to call from
    /// an interrupt; `list` must not be empty.
    ///
    /// Only the event item moves (onto pending-ready); the ready and
    /// delay lists belong to the scheduler and are never touched here.
    /// Returns true when the woken co-routine's priority is at or above
    /// the running one's, i.e. a reschedule is worthwhile.
    pub fn remove_from_event_list(&self, list: EventListId) -> bool {
        self.with(|s| {
            let head = s.arena.head(list.0);
            debug_assert!(head.is_some(), "event: unblocking from an empty list");
            let Some(item) = head else {
                return false;
            };

            s.arena.remove(item);
            s.arena.insert_end(PENDING_READY, item);

            priority_of_key(s.arena.value(item)) >= s.running_priority
        })
    }

    pub(crate) fn initialise_pending(&self) {
        self.with(|s| s.arena.initialise(PENDING_READY));
    }

    pub(crate) fn prepare(&self, handle: CoRoutineHandle, priority: usize) {
        let item = event_item(handle);
        self.with(|s| {
            s.arena.initialise_item(item);
            s.arena.set_owner(item, handle);
            s.arena.set_value(item, key_of_priority(priority));
        });
    }

    pub(crate) fn set_running_priority(&self, priority: usize) {
        self.with(|s| s.running_priority = priority);
    }

    pub(crate) fn wait_on(&self, list: EventListId, handle: CoRoutineHandle) {
        self.with(|s| s.arena.insert(list.0, event_item(handle)));
    }

    pub(crate) fn pop_pending(&self) -> Option<CoRoutineHandle> {
        self.with(|s| {
            let item = s.arena.head(PENDING_READY)?;
            s.arena.remove(item);
            s.arena.owner(item)
        })
    }

    /// Drop `handle` from whatever event or pending list holds it.
    pub(crate) fn unlink(&self, handle: CoRoutineHandle) {
        let item = event_item(handle);
        self.with(|s| {
            if s.arena.container(item).is_some() {
                s.arena.remove(item);
            }
        });
    }
}

impl Default for EventLists {
    fn default() -> Self {
        Self::new()
    }
}

fn event_item(handle: CoRoutineHandle) -> ItemId {
    ItemId::new(handle.index())
}

// higher priority -> smaller key -> nearer the head
fn key_of_priority(priority: usize) -> TickType {
    (MAX_PRIORITIES - priority) as TickType
}

fn priority_of_key(key: TickType) -> usize {
    MAX_PRIORITIES - key as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_pool_is_bounded() {
        let events = EventLists::new();
        for _ in 0..MAX_EVENT_LISTS {
            assert!(events.create_list().is_ok());
        }
        assert_eq!(events.create_list(), Err(EventError::NoFreeList));
    }

    #[test]
    fn waiters_sort_by_priority() {
        let events = EventLists::new();
        let list = events.create_list().unwrap();
        let (low, high, mid) = (
            CoRoutineHandle::new(0),
            CoRoutineHandle::new(1),
            CoRoutineHandle::new(2),
        );
        events.prepare(low, 0);
        events.prepare(high, 3);
        events.prepare(mid, 1);

        events.wait_on(list, low);
        events.wait_on(list, high);
        events.wait_on(list, mid);

        assert_eq!(events.len(list), 3);
        assert_eq!(events.head(list), Some(high));
    }

    #[test]
    fn unblock_moves_head_to_pending() {
        let events = EventLists::new();
        let list = events.create_list().unwrap();
        let a = CoRoutineHandle::new(0);
        let b = CoRoutineHandle::new(1);
        events.prepare(a, 1);
        events.prepare(b, 2);
        events.wait_on(list, a);
        events.wait_on(list, b);
        events.set_running_priority(2);

        assert!(events.remove_from_event_list(list));
        assert!(events.is_pending_ready(b));
        assert!(!events.is_waiting_on(list, b));

        assert!(!events.remove_from_event_list(list));
        assert!(events.is_empty(list));
        assert_eq!(events.pending_ready_len(), 2);

        assert_eq!(events.pop_pending(), Some(b));
        assert_eq!(events.pop_pending(), Some(a));
        assert_eq!(events.pop_pending(), None);
    }

    #[test]
    fn unlink_is_a_noop_for_unlinked_items() {
        let events = EventLists::new();
        let a = CoRoutineHandle::new(0);
        events.prepare(a, 0);
        events.unlink(a);
        assert!(!events.is_pending_ready(a));
    }
}
