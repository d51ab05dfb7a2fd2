// Compile-time sizing for the co-routine kernel
//
// Everything is statically sized: the control-block pool, the event
// list pool and the number of priority levels. Tick width is picked
// with exactly one of the `tick-16bit` / `tick-32bit` features (32 bit
// by default; 16 bit needs `default-features = false`).

#[cfg(all(feature = "tick-16bit", feature = "tick-32bit"))]
compile_error!("features `tick-16bit` and `tick-32bit` are mutually exclusive");

#[cfg(not(any(feature = "tick-16bit", feature = "tick-32bit")))]
compile_error!("enable one of the `tick-16bit` or `tick-32bit` features");

/// Tick counter width. Delay keys and the sentinel share this width.
#[cfg(feature = "tick-16bit")]
pub type TickType = u16;

#[cfg(feature = "tick-32bit")]
pub type TickType = u32;

/// Largest representable tick; also the key of every list's end marker.
pub const MAX_DELAY: TickType = TickType::MAX;

/// Number of co-routine priority levels. 0 is the lowest.
pub const MAX_PRIORITIES: usize = 4;

/// Size of the control-block pool.
pub const MAX_CO_ROUTINES: usize = 8;

/// Size of the event (wait) list pool, not counting pending-ready.
pub const MAX_EVENT_LISTS: usize = 8;

/// Event lists consumed by each co-routine queue (senders + receivers).
pub const QUEUE_EVENT_LISTS: usize = 2;

// ready lists + current delay + overflow delay
pub(crate) const SCHED_LISTS: usize = MAX_PRIORITIES + 2;

// event lists + pending-ready
pub(crate) const EVENT_ARENA_LISTS: usize = MAX_EVENT_LISTS + 1;
