#[cfg(feature = "loom")]
pub use loom::sync::atomic::{AtomicBool, AtomicPtr, Ordering, fence};
#[cfg(not(feature = "loom"))]
pub use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering, fence};

#[cfg(feature = "loom")]
pub use loom::sync::Arc;
#[cfg(not(feature = "loom"))]
pub use std::sync::Arc;

/// Busy-wait hint used by the announcement retry loop and the retirement wait.
///
/// Under loom a spin must yield, otherwise the model never schedules the thread
/// that would make progress.
#[cfg(feature = "loom")]
#[inline]
pub fn spin_loop() {
    loom::thread::yield_now();
}

#[cfg(not(feature = "loom"))]
#[inline]
pub fn spin_loop() {
    std::hint::spin_loop();
}
