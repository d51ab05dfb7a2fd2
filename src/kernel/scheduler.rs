// Priority-based cooperative co-routine scheduler
//
// Single core, no preemption. Each run_next() call drains co-routines
// readied from interrupts, sweeps the delay lists for expired timers,
// then runs one step of the next co-routine in the highest non-empty
// ready list. Same-priority co-routines take turns (round-robin).
//
// Delays are keyed by wake tick in one of two lists: wake ticks that
// wrapped past TickType::MAX go to the overflow list, and the lists
// swap roles when the scheduler's own tick counter wraps to zero. Key
// comparisons therefore never cross a counter epoch.
//
// A co-routine's generic item lives here (ready/delay lists), its
// event item lives in EventLists (wait/pending lists), both at the
// co-routine's own index.

use core::fmt;

use log::{debug, trace, warn};

use super::event::{EventListId, EventLists};
use super::list::{ItemId, ListArena, ListId};
use super::wake::TickSource;
use crate::config::{MAX_CO_ROUTINES, MAX_PRIORITIES, SCHED_LISTS, TickType};

/// One cooperative step. Runs until it returns; state that must survive
/// to the next step goes in the control block (see [`Scheduler::set_state`]).
pub type CoRoutineFn = fn(&mut Scheduler<'_>, CoRoutineHandle, usize);

const DELAYED_1: ListId = ListId::new(MAX_PRIORITIES);
const DELAYED_2: ListId = ListId::new(MAX_PRIORITIES + 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoRoutineHandle(u8);

impl CoRoutineHandle {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index as u8)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    fn item(self) -> ItemId {
        ItemId::new(self.index())
    }
}

impl fmt::Display for CoRoutineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "co#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    /// control-block pool exhausted
    OutOfMemory,
}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateError::OutOfMemory => write!(f, "no free co-routine control block"),
        }
    }
}

/// Where a co-routine currently sits, derived from list membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Running,
    Ready,
    Delayed,
    /// delayed with a wake tick past the current counter epoch
    Overflowed,
    PendingReady,
}

#[derive(Clone, Copy)]
struct ControlBlock {
    entry: Option<CoRoutineFn>,
    priority: usize,
    index: usize,
    state: u16,
}

impl ControlBlock {
    const fn vacant() -> Self {
        Self {
            entry: None,
            priority: 0,
            index: 0,
            state: 0,
        }
    }
}

pub struct Scheduler<'a> {
    events: &'a EventLists,
    ticks: &'a dyn TickSource,

    blocks: [ControlBlock; MAX_CO_ROUTINES],
    created: usize,

    // ready lists by priority, then the two delay lists
    lists: ListArena<CoRoutineHandle, MAX_CO_ROUTINES, SCHED_LISTS>,
    // false: DELAYED_1 is current, DELAYED_2 overflow
    swapped: bool,

    // priority reference for ISR wake-ups; set by the first create
    current: Option<CoRoutineHandle>,
    // last co-routine run_next actually stepped
    dispatched: Option<CoRoutineHandle>,
    top_ready_priority: usize,

    tick_count: TickType,
    last_tick_count: TickType,
    passed_ticks: TickType,
}

impl<'a> Scheduler<'a> {
    /// The scheduler's tick starts at the source's current value.
    pub fn new(events: &'a EventLists, ticks: &'a dyn TickSource) -> Self {
        let now = ticks.tick_count();
        Self {
            events,
            ticks,
            blocks: [ControlBlock::vacant(); MAX_CO_ROUTINES],
            created: 0,
            lists: ListArena::new(),
            swapped: false,
            current: None,
            dispatched: None,
            top_ready_priority: 0,
            tick_count: now,
            last_tick_count: now,
            passed_ticks: 0,
        }
    }

    /// Register a co-routine. Priorities past the top level are clamped
    /// to `MAX_PRIORITIES - 1`. The new co-routine starts ready, at the
    /// tail of its priority's ready list.
    pub fn create(
        &mut self,
        entry: CoRoutineFn,
        priority: usize,
        index: usize,
    ) -> Result<CoRoutineHandle, CreateError> {
        if self.created >= MAX_CO_ROUTINES {
            warn!("coro: pool exhausted ({} control blocks)", MAX_CO_ROUTINES);
            return Err(CreateError::OutOfMemory);
        }

        let handle = CoRoutineHandle::new(self.created);
        self.created += 1;

        // first co-routine: bring up the lists and treat it as current
        // so ISR priority comparisons have something to compare against
        if self.current.is_none() {
            self.current = Some(handle);
            self.initialise_lists();
        }

        let priority = priority.min(MAX_PRIORITIES - 1);
        self.blocks[handle.index()] = ControlBlock {
            entry: Some(entry),
            priority,
            index,
            state: 0,
        };

        let item = handle.item();
        self.lists.initialise_item(item);
        self.lists.set_owner(item, handle);
        self.events.prepare(handle, priority);
        if self.current == Some(handle) {
            self.events.set_running_priority(priority);
        }

        self.add_to_ready_queue(handle);
        debug!("coro: created {} priority {} index {}", handle, priority, index);
        Ok(handle)
    }

    /// Put the running co-routine to sleep for `ticks`, optionally also
    /// waiting on `wait_list`. Only the running co-routine may call this,
    /// and it should return from its step right after.
    pub fn delay_current(&mut self, ticks: TickType, wait_list: Option<EventListId>) {
        debug_assert!(self.current.is_some(), "coro: delay with nothing running");
        let Some(current) = self.current else {
            return;
        };

        // wrapping is expected; the overflow list absorbs it
        let wake = self.tick_count.wrapping_add(ticks);
        let item = current.item();

        // same item serves ready and delay lists
        self.lists.remove(item);
        self.lists.set_value(item, wake);

        if wake < self.tick_count {
            self.lists.insert(self.overflow_list(), item);
        } else {
            self.lists.insert(self.delayed_list(), item);
        }

        if let Some(list) = wait_list {
            self.events.wait_on(list, current);
        }

        trace!("coro: {} sleeps until tick {}", current, wake);
    }

    /// Move co-routines readied by interrupts into the ready lists.
    pub fn promote_pending_ready(&mut self) {
        // only the pop itself runs with interrupts masked
        while let Some(handle) = self.events.pop_pending() {
            let item = handle.item();
            if self.lists.container(item).is_some() {
                self.lists.remove(item);
            }
            self.add_to_ready_queue(handle);
            trace!("coro: {} readied by event", handle);
        }
    }

    /// Catch the scheduler tick up with the tick source, readying every
    /// co-routine whose wake tick is reached on the way.
    ///
    /// More than one full counter wrap between sweeps is not detected.
    pub fn sweep_delayed(&mut self) {
        self.passed_ticks = self.ticks.tick_count().wrapping_sub(self.last_tick_count);

        while self.passed_ticks > 0 {
            self.tick_count = self.tick_count.wrapping_add(1);
            self.passed_ticks -= 1;

            if self.tick_count == 0 {
                // a delay placed at tick MAX keys MAX and is due by now
                let leftover = self.delayed_list();
                while let Some(handle) = self.lists.head_owner(leftover) {
                    self.wake_delayed(handle);
                }
                self.swapped = !self.swapped;
                debug!("coro: tick wrapped, delay lists swapped");
            }

            let delayed = self.delayed_list();
            while let Some(handle) = self.lists.head_owner(delayed) {
                if self.tick_count < self.lists.value(handle.item()) {
                    break;
                }
                self.wake_delayed(handle);
            }
        }

        self.last_tick_count = self.tick_count;
    }

    /// Run one step of the next ready co-routine. Returns the co-routine
    /// that ran, or `None` when nothing was ready.
    pub fn run_next(&mut self) -> Option<CoRoutineHandle> {
        self.promote_pending_ready();
        self.sweep_delayed();

        while self.lists.is_empty(ready_list(self.top_ready_priority)) {
            if self.top_ready_priority == 0 {
                return None;
            }
            self.top_ready_priority -= 1;
        }

        // same-priority co-routines share the processor in turn
        let handle = self.lists.next_owner(ready_list(self.top_ready_priority))?;
        let block = self.blocks[handle.index()];

        self.current = Some(handle);
        self.dispatched = Some(handle);
        self.events.set_running_priority(block.priority);

        if let Some(entry) = block.entry {
            entry(self, handle, block.index);
        }
        Some(handle)
    }

    pub fn events(&self) -> &'a EventLists {
        self.events
    }

    pub fn current(&self) -> Option<CoRoutineHandle> {
        self.current
    }

    pub fn priority(&self, handle: CoRoutineHandle) -> usize {
        self.blocks[handle.index()].priority
    }

    pub fn index(&self, handle: CoRoutineHandle) -> usize {
        self.blocks[handle.index()].index
    }

    /// Resume point saved by the co-routine between steps. Starts at 0.
    pub fn state(&self, handle: CoRoutineHandle) -> u16 {
        self.blocks[handle.index()].state
    }

    pub fn set_state(&mut self, handle: CoRoutineHandle, state: u16) {
        self.blocks[handle.index()].state = state;
    }

    pub fn tick_count(&self) -> TickType {
        self.tick_count
    }

    pub fn top_ready_priority(&self) -> usize {
        self.top_ready_priority
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn ready_len(&self, priority: usize) -> usize {
        self.lists.len(ready_list(priority.min(MAX_PRIORITIES - 1)))
    }

    /// Co-routines in both delay lists.
    pub fn delayed_len(&self) -> usize {
        self.lists.len(DELAYED_1) + self.lists.len(DELAYED_2)
    }

    pub fn placement(&self, handle: CoRoutineHandle) -> Option<Placement> {
        if handle.index() >= self.created {
            return None;
        }
        if self.events.is_pending_ready(handle) {
            return Some(Placement::PendingReady);
        }

        let container = self.lists.container(handle.item())?;
        let placement = if container == self.delayed_list() {
            Placement::Delayed
        } else if container == self.overflow_list() {
            Placement::Overflowed
        } else if self.dispatched == Some(handle) {
            Placement::Running
        } else {
            Placement::Ready
        };
        Some(placement)
    }

    fn initialise_lists(&mut self) {
        for priority in 0..MAX_PRIORITIES {
            self.lists.initialise(ready_list(priority));
        }
        self.lists.initialise(DELAYED_1);
        self.lists.initialise(DELAYED_2);
        self.swapped = false;
        self.events.initialise_pending();
    }

    fn wake_delayed(&mut self, handle: CoRoutineHandle) {
        self.lists.remove(handle.item());
        // timed out while waiting: leave the wait list too
        self.events.unlink(handle);
        self.add_to_ready_queue(handle);
        trace!("coro: {} woke at tick {}", handle, self.tick_count);
    }

    fn add_to_ready_queue(&mut self, handle: CoRoutineHandle) {
        let priority = self.blocks[handle.index()].priority;
        if priority > self.top_ready_priority {
            self.top_ready_priority = priority;
        }
        self.lists.insert_end(ready_list(priority), handle.item());
    }

    fn delayed_list(&self) -> ListId {
        if self.swapped { DELAYED_2 } else { DELAYED_1 }
    }

    fn overflow_list(&self) -> ListId {
        if self.swapped { DELAYED_1 } else { DELAYED_2 }
    }
}

fn ready_list(priority: usize) -> ListId {
    ListId::new(priority)
}
