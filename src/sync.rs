//! Interrupt-safe locking

use spin::Mutex;

/// Spin mutex whose critical section also masks interrupts on Cortex-M
///
/// Shared between thread context and [`handle_interrupt`](crate::SdioSlave::handle_interrupt).
/// Closures must be short and must never wait.
pub struct IrqMutex<T> {
    inner: Mutex<T>,
}

impl<T> IrqMutex<T> {
    /// Wrap a value
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Run `f` with exclusive access
    #[inline]
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        {
            cortex_m::interrupt::free(|_| {
                let result = f(&mut self.inner.lock());
                cortex_m::asm::dmb();
                result
            })
        }
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        {
            f(&mut self.inner.lock())
        }
    }

    /// Consume the lock and return the value
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}
