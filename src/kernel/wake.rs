// Tick source for the co-routine scheduler
//
// The timer ISR calls signal_tick(); the scheduler only ever reads the
// counter through the TickSource trait. Ticks are weighted so a timer
// slowed down during idle still advances the clock at the base rate.
// Critical section guards riscv32imc (no atomic RMW).

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;

use crate::config::TickType;

// base ticks per timer interrupt
static TICK_WEIGHT: AtomicU32 = AtomicU32::new(1);

// cs: riscv32imc has no atomic add
static SYSTEM_TICKS: Mutex<Cell<TickType>> = Mutex::new(Cell::new(0));

/// Read-only monotonic counter advanced once per timer period.
pub trait TickSource {
    fn tick_count(&self) -> TickType;
}

/// The process-wide counter fed by `signal_tick`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTick;

impl TickSource for SystemTick {
    fn tick_count(&self) -> TickType {
        uptime_ticks()
    }
}

/// Call from the timer interrupt.
#[inline]
pub fn signal_tick() {
    let weight = TICK_WEIGHT.load(Ordering::Relaxed) as TickType;
    critical_section::with(|cs| {
        let ticks = SYSTEM_TICKS.borrow(cs);
        ticks.set(ticks.get().wrapping_add(weight));
    });
}

pub fn set_tick_weight(weight: u32) {
    TICK_WEIGHT.store(weight.max(1), Ordering::Release);
}

pub fn uptime_ticks() -> TickType {
    critical_section::with(|cs| SYSTEM_TICKS.borrow(cs).get())
}

/// Hand-driven counter for host runs and tests.
#[derive(Debug, Default)]
pub struct ManualTick {
    ticks: Cell<TickType>,
}

impl ManualTick {
    pub const fn new(start: TickType) -> Self {
        Self {
            ticks: Cell::new(start),
        }
    }

    pub fn advance(&self, ticks: TickType) {
        self.ticks.set(self.ticks.get().wrapping_add(ticks));
    }

    pub fn set(&self, ticks: TickType) {
        self.ticks.set(ticks);
    }
}

impl TickSource for ManualTick {
    fn tick_count(&self) -> TickType {
        self.ticks.get()
    }
}

/// Idle until the next interrupt when nothing is ready.
#[inline]
pub fn wait_for_interrupt() {
    #[cfg(target_arch = "riscv32")]
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack));
    }

    #[cfg(all(not(target_arch = "riscv32"), any(test, feature = "std")))]
    {
        std::thread::yield_now();
    }

    #[cfg(all(not(target_arch = "riscv32"), not(any(test, feature = "std"))))]
    {
        core::hint::spin_loop();
    }
}
