//! Pacing between commands.
//!
//! The PSU silently drops commands which follow the previous one too closely, so a pause is taken
//! before every write. How to pause depends on the platform, hence the [`Pacer`] trait.

use fugit::MillisDurationU32;

/// Something which can block for a while.
pub trait Pacer {
    fn pause(&mut self, delay: MillisDurationU32);
}

/// Never pauses. Useful when the transport already paces writes, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn pause(&mut self, _delay: MillisDurationU32) {}
}

/// Pauses the current thread.
#[cfg(not(feature = "no_std"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

#[cfg(not(feature = "no_std"))]
impl Pacer for ThreadPacer {
    fn pause(&mut self, delay: MillisDurationU32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(delay.to_millis())));
    }
}

impl<P: Pacer + ?Sized> Pacer for &mut P {
    fn pause(&mut self, delay: MillisDurationU32) {
        (**self).pause(delay)
    }
}
