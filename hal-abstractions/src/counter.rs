//! Free-running hardware tick counter
//!
//! One tick is treated as one microsecond. The counter is monotonically
//! non-decreasing while powered, and keeps advancing across a soft reset only
//! once its retention control bit has been set.

/// A free-running counter that may survive soft reset.
///
/// Methods take `&self` because implementations are memory-mapped hardware:
/// several owners hold a handle to the same counter and none of them owns
/// the registers exclusively.
pub trait TickCounter {
    /// Current raw tick count.
    fn read(&self) -> u64;

    /// Set the sticky retention bit so the counter keeps running through a
    /// soft reset.
    ///
    /// Idempotent. Must not reset or perturb the current count. The bit must
    /// be observably set when this returns, since a reset issued before that
    /// point restarts the counter from zero.
    fn enable_retention(&self);

    /// Read back the retention bit. No side effects.
    fn retention_active(&self) -> bool;
}

impl<T: TickCounter + ?Sized> TickCounter for &T {
    fn read(&self) -> u64 {
        (**self).read()
    }

    fn enable_retention(&self) {
        (**self).enable_retention()
    }

    fn retention_active(&self) -> bool {
        (**self).retention_active()
    }
}
