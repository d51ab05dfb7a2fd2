// Cooperative co-routine kernel
// Single core, no preemption. WFI idles the CPU when nothing is ready.
//
// list: sorted intrusive lists shared by every queue below
// scheduler: ready/delay lists and the run_next() driver
// event: wait lists + pending-ready, the only part ISRs may touch
// queue: fixed-size queues co-routines and ISRs exchange items over

pub mod event;
pub mod list;
pub mod queue;
pub mod scheduler;
pub mod wake;

pub use event::{EventError, EventListId, EventLists};
pub use queue::{CoQueue, ReceiveError, SendError};
pub use scheduler::{CoRoutineFn, CoRoutineHandle, CreateError, Placement, Scheduler};
pub use wake::{ManualTick, SystemTick, TickSource, wait_for_interrupt};
