//! Blocking primitives
//!
//! Every blocking call in the driver is a loop of "check under the lock, then
//! suspend until something changes or the deadline passes". The [`Waiter`]
//! trait supplies the clock and the suspension; an epoch counter closes the
//! window between the check and the suspend so a wake-up raised in between
//! is never lost.

use crate::error::{Result, SlaveError};
use core::time::Duration;

/// Timeout meaning "wait until it happens"
pub const FOREVER: Duration = Duration::MAX;

/// Monotonic clock plus an event-count based suspension point
pub trait Waiter: Send + Sync {
    /// Monotonic time since an arbitrary origin
    fn now(&self) -> Duration;

    /// Current wake-up epoch
    fn epoch(&self) -> u64;

    /// Suspend while the epoch still equals `epoch` and the deadline has not
    /// passed. May return early; callers re-check their condition.
    fn wait(&self, epoch: u64, deadline: Deadline);

    /// Advance the epoch and release every suspended caller
    fn wake_all(&self);
}

/// Absolute point in [`Waiter::now`] time, or never
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Duration>);

impl Deadline {
    /// A deadline that never passes
    pub const NEVER: Self = Self(None);

    /// `timeout` from `now`; overflowing (e.g. [`FOREVER`]) means never
    pub fn after(now: Duration, timeout: Duration) -> Self {
        Self(now.checked_add(timeout))
    }

    /// Has the deadline passed at `now`
    pub fn expired(&self, now: Duration) -> bool {
        matches!(self.0, Some(at) if now >= at)
    }

    /// Time left at `now`, `None` for a deadline that never passes
    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        self.0.map(|at| at.saturating_sub(now))
    }
}

/// Poll `poll` until it yields a value or `timeout` elapses
///
/// `poll` runs at least once, so a zero timeout is a non-blocking attempt.
pub fn block_on<W, T>(waiter: &W, timeout: Duration, mut poll: impl FnMut() -> Option<T>) -> Result<T>
where
    W: Waiter + ?Sized,
{
    let deadline = Deadline::after(waiter.now(), timeout);
    loop {
        let epoch = waiter.epoch();
        if let Some(value) = poll() {
            return Ok(value);
        }
        if deadline.expired(waiter.now()) {
            return Err(SlaveError::Timeout);
        }
        waiter.wait(epoch, deadline);
    }
}

#[cfg(feature = "std")]
pub use self::std_waiter::StdWaiter;

#[cfg(feature = "std")]
mod std_waiter {
    extern crate std;

    use super::{Deadline, Waiter};
    use core::time::Duration;
    use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
    use std::time::Instant;

    /// Waiter for hosted targets (condition variable + `Instant`)
    pub struct StdWaiter {
        epoch: Mutex<u64>,
        changed: Condvar,
        origin: Instant,
    }

    impl StdWaiter {
        /// Create a waiter whose clock starts now
        pub fn new() -> Self {
            Self {
                epoch: Mutex::new(0),
                changed: Condvar::new(),
                origin: Instant::now(),
            }
        }

        fn guard(&self) -> MutexGuard<'_, u64> {
            self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Default for StdWaiter {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Waiter for StdWaiter {
        fn now(&self) -> Duration {
            self.origin.elapsed()
        }

        fn epoch(&self) -> u64 {
            *self.guard()
        }

        fn wait(&self, epoch: u64, deadline: Deadline) {
            let guard = self.guard();
            if *guard != epoch {
                return;
            }
            match deadline.remaining(self.now()) {
                None => {
                    let _guard = self
                        .changed
                        .wait_while(guard, |current| *current == epoch)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(left) if left.is_zero() => {}
                Some(left) => {
                    let _guard = self
                        .changed
                        .wait_timeout_while(guard, left, |current| *current == epoch)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }

        fn wake_all(&self) {
            let mut guard = self.guard();
            *guard = guard.wrapping_add(1);
            drop(guard);
            self.changed.notify_all();
        }
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use self::wfi_waiter::WfiWaiter;

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod wfi_waiter {
    use super::{Deadline, Waiter};
    use core::sync::atomic::{AtomicU32, Ordering};
    use core::time::Duration;
    use cortex_m::peripheral::DWT;

    /// Bare-metal waiter: DWT cycle counter clock, `WFI` suspension
    ///
    /// The DWT cycle counter must be enabled. The 32-bit counter is widened in
    /// software, so [`Waiter::now`] has to run at least once per wrap period;
    /// keep a periodic interrupt (SysTick) alive while anything waits.
    pub struct WfiWaiter {
        cpu_hz: u32,
        epoch: AtomicU32,
        wraps: AtomicU32,
        last: AtomicU32,
    }

    impl WfiWaiter {
        /// Create a waiter for a core running at `cpu_hz`
        pub const fn new(cpu_hz: u32) -> Self {
            Self {
                cpu_hz,
                epoch: AtomicU32::new(0),
                wraps: AtomicU32::new(0),
                last: AtomicU32::new(0),
            }
        }

        fn cycles(&self) -> u64 {
            cortex_m::interrupt::free(|_| {
                let now = DWT::cycle_count();
                if now < self.last.load(Ordering::Relaxed) {
                    self.wraps.fetch_add(1, Ordering::Relaxed);
                }
                self.last.store(now, Ordering::Relaxed);
                (u64::from(self.wraps.load(Ordering::Relaxed)) << 32) | u64::from(now)
            })
        }
    }

    impl Waiter for WfiWaiter {
        fn now(&self) -> Duration {
            let nanos = u128::from(self.cycles()) * 1_000_000_000 / u128::from(self.cpu_hz.max(1));
            Duration::from_nanos(nanos as u64)
        }

        fn epoch(&self) -> u64 {
            u64::from(self.epoch.load(Ordering::Acquire))
        }

        fn wait(&self, epoch: u64, deadline: Deadline) {
            // A pending interrupt still ends WFI with PRIMASK set; it is
            // serviced as soon as the critical section closes.
            cortex_m::interrupt::free(|_| {
                if self.epoch() == epoch && !deadline.expired(self.now()) {
                    cortex_m::asm::wfi();
                }
            });
        }

        fn wake_all(&self) {
            self.epoch.fetch_add(1, Ordering::AcqRel);
            cortex_m::asm::sev();
        }
    }
}
