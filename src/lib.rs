// Cooperative priority co-routine kernel for single-core boards

#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod config;
pub mod kernel;

pub use config::{MAX_CO_ROUTINES, MAX_DELAY, MAX_EVENT_LISTS, MAX_PRIORITIES, TickType};
pub use kernel::{CoRoutineHandle, EventLists, Scheduler};
