// Fixed-size queues co-routines can block on
//
// Items go through a ring buffer guarded by the critical section, so
// interrupts can send and receive too. A co-routine that finds the
// queue full (or empty) can sleep on the queue's send (or receive) wait
// list; the other side wakes the highest-priority waiter when it makes
// room (or data) available. A woken co-routine retries on its next step.
//
// NOTE: No dynamic allocation, capacity is a const generic.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;

use super::event::{EventError, EventListId, EventLists};
use super::scheduler::Scheduler;
use crate::config::TickType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError<T> {
    /// Queue full and no wait requested, contains the rejected item
    Full(T),
    /// Queue full; the caller now sleeps on the send list and should
    /// return from its step, retrying with the item later
    Blocked(T),
}

impl<T> SendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            SendError::Full(item) | SendError::Blocked(item) => item,
        }
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Full(_) => write!(f, "queue full"),
            SendError::Blocked(_) => write!(f, "queue full, sender blocked"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveError {
    Empty,
    /// queue empty; the caller now sleeps on the receive list
    Blocked,
}

impl fmt::Display for ReceiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiveError::Empty => write!(f, "queue empty"),
            ReceiveError::Blocked => write!(f, "queue empty, receiver blocked"),
        }
    }
}

// ring buffer for queued items
pub struct Ring<T, const N: usize> {
    buf: [Option<T>; N],
    head: usize, // next to read
    tail: usize, // next to write
    len: usize,
}

impl<T, const N: usize> Ring<T, N> {
    pub const fn new() -> Self {
        Self {
            buf: [const { None }; N],
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.len >= N {
            return Err(item);
        }
        self.buf[self.tail] = Some(item);
        self.tail = (self.tail + 1) % N;
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.buf[self.head].take();
        self.head = (self.head + 1) % N;
        self.len -= 1;
        item
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Default for Ring<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CoQueue<T, const N: usize> {
    ring: Mutex<RefCell<Ring<T, N>>>,
    waiting_to_send: EventListId,
    waiting_to_receive: EventListId,
}

impl<T, const N: usize> CoQueue<T, N> {
    /// Takes two wait lists from `events`.
    pub fn new(events: &EventLists) -> Result<Self, EventError> {
        Ok(Self {
            ring: Mutex::new(RefCell::new(Ring::new())),
            waiting_to_send: events.create_list()?,
            waiting_to_receive: events.create_list()?,
        })
    }

    /// Send from a co-routine step. `Ok(true)` means a receiver of equal
    /// or higher priority was woken and the caller should yield soon.
    pub fn send(
        &self,
        sched: &mut Scheduler<'_>,
        item: T,
        ticks_to_wait: TickType,
    ) -> Result<bool, SendError<T>> {
        // check-and-block must not race an ISR receive
        critical_section::with(|cs| {
            let mut ring = self.ring.borrow_ref_mut(cs);
            if ring.is_full() {
                if ticks_to_wait > 0 {
                    sched.delay_current(ticks_to_wait, Some(self.waiting_to_send));
                    return Err(SendError::Blocked(item));
                }
                return Err(SendError::Full(item));
            }
            ring.push(item).map_err(SendError::Full)
        })?;

        Ok(wake_one(sched.events(), self.waiting_to_receive))
    }

    /// Receive from a co-routine step. The flag is `true` when a sender
    /// of equal or higher priority was woken.
    pub fn receive(
        &self,
        sched: &mut Scheduler<'_>,
        ticks_to_wait: TickType,
    ) -> Result<(T, bool), ReceiveError> {
        let item = critical_section::with(|cs| {
            let mut ring = self.ring.borrow_ref_mut(cs);
            match ring.pop() {
                Some(item) => Ok(item),
                None if ticks_to_wait > 0 => {
                    sched.delay_current(ticks_to_wait, Some(self.waiting_to_receive));
                    Err(ReceiveError::Blocked)
                }
                None => Err(ReceiveError::Empty),
            }
        })?;

        Ok((item, wake_one(sched.events(), self.waiting_to_send)))
    }

    /// Send from an interrupt. At most one receiver is woken per
    /// interrupt: pass the previous call's result as `woken`.
    pub fn send_from_isr(
        &self,
        events: &EventLists,
        item: T,
        woken: bool,
    ) -> Result<bool, SendError<T>> {
        critical_section::with(|cs| self.ring.borrow_ref_mut(cs).push(item))
            .map_err(SendError::Full)?;

        if !woken && wake_one(events, self.waiting_to_receive) {
            return Ok(true);
        }
        Ok(woken)
    }

    /// Receive from an interrupt; same `woken` convention as
    /// [`CoQueue::send_from_isr`].
    pub fn receive_from_isr(
        &self,
        events: &EventLists,
        woken: bool,
    ) -> Result<(T, bool), ReceiveError> {
        let item = critical_section::with(|cs| self.ring.borrow_ref_mut(cs).pop())
            .ok_or(ReceiveError::Empty)?;

        if !woken && wake_one(events, self.waiting_to_send) {
            return Ok((item, true));
        }
        Ok((item, woken))
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.ring.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn send_waiters(&self) -> EventListId {
        self.waiting_to_send
    }

    pub fn receive_waiters(&self) -> EventListId {
        self.waiting_to_receive
    }
}

fn wake_one(events: &EventLists, list: EventListId) -> bool {
    // the emptiness check and the unblock share one masked section
    critical_section::with(|_| !events.is_empty(list) && events.remove_from_event_list(list))
}
