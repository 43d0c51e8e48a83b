use crate::state::SharedState;
use crate::sync::{Arc, Ordering, fence, spin_loop};
use std::boxed::Box;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;

/// A record that has been retired (removed from the store) but not yet freed.
///
/// Returned by `HazardDomain::swap()`. The writer that performed the exchange is
/// the only owner: `Retired` is neither `Clone` nor `Copy`, and nothing else in the
/// domain keeps the evicted pointer.
///
/// Readers that announced the record before it was replaced may still be
/// reading it, so freeing waits until no hazard slot holds its address:
/// - `reclaim()` waits and hands the record back as a `Box`.
/// - Dropping a `Retired` waits and then frees the record.
///
/// The wait spins without bound and without backoff for as long as a reader
/// keeps its announcement.
///
/// 一个已被退休（从存储中移除）但尚未释放的记录。
/// 由 `HazardDomain::swap()` 返回。执行交换的写入者是唯一的所有者：
/// `Retired` 既不是 `Clone` 也不是 `Copy`，域中也没有其他地方保留被驱逐的指针。
/// 在记录被替换之前声明了它的读者可能仍在读取，因此释放操作会等到
/// 没有任何危险槽持有它的地址：
/// - `reclaim()` 等待后以 `Box` 的形式交还记录。
/// - drop 一个 `Retired` 会等待，然后释放记录。
/// 只要读者保持声明，等待就会无限自旋且不退避。
#[must_use = "dropping a Retired blocks until no reader announces it"]
pub struct Retired<T> {
    shared: Arc<SharedState<T>>,
    ptr: NonNull<T>,
}

// SAFETY: `Retired` owns a `T` and hands out `&T` like `Box<T>`; the bounds also
// cover the domain reference it carries.
unsafe impl<T: Send + Sync> Send for Retired<T> {}
unsafe impl<T: Send + Sync> Sync for Retired<T> {}

impl<T> Retired<T> {
    #[inline]
    pub(crate) fn new(shared: Arc<SharedState<T>>, ptr: NonNull<T>) -> Self {
        // Pairs with the fence in the readers' announcement: either the reader's
        // re-check sees the exchange, or this thread's scans see the announcement.
        // 与读者声明中的屏障配对：要么读者的复查看到交换，要么本线程的扫描看到声明。
        if shared.ordering.is_fenced() {
            fence(Ordering::SeqCst);
        }
        Retired { shared, ptr }
    }

    /// Whether any reader currently announces this record.
    ///
    /// A later call may return `true` again: a reader that loaded the pointer before
    /// the exchange can still write it into its slot after a scan. Once `false` has
    /// been observed, though, no reader can validate a new announcement of this
    /// record, because it is no longer published, so reclaiming it is safe.
    ///
    /// 当前是否有读者声明了此记录。
    /// 之后的调用仍可能返回 `true`：在交换之前加载了该指针的读者，
    /// 可能在扫描之后才把它写入自己的槽。但一旦观察到 `false`，
    /// 就不会有读者能验证对此记录的新声明，因为它已不再被发布，所以回收是安全的。
    #[inline]
    pub fn is_protected(&self) -> bool {
        self.shared.is_announced(self.ptr.as_ptr().cast())
    }

    /// Spin until no hazard slot announces this record.
    /// 自旋直到没有危险槽声明此记录。
    #[inline]
    fn wait_until_unprotected(&self) {
        while self.is_protected() {
            spin_loop();
        }
    }

    /// Wait until the record is unprotected, then take ownership of it.
    ///
    /// The returned `Box` is exclusively owned: it may be mutated (for example to
    /// poison it for diagnostics) or dropped.
    ///
    /// 等待记录不再受保护，然后取得它的所有权。
    /// 返回的 `Box` 是独占的：可以修改它（例如出于诊断目的写入毒值）或 drop 它。
    pub fn reclaim(self) -> Box<T> {
        self.wait_until_unprotected();
        let this = ManuallyDrop::new(self);
        // SAFETY: `ptr` came from `Box::into_raw` in the store, was evicted by the
        // exchange that created this handle, and no slot announces it any more.
        // `ManuallyDrop` keeps `Drop` from freeing it a second time.
        let boxed = unsafe { Box::from_raw(this.ptr.as_ptr()) };
        // SAFETY: `this` is never used again; release its domain reference.
        drop(unsafe { std::ptr::read(&this.shared) });
        boxed
    }
}

impl<T> Deref for Retired<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the record is only freed by this handle, after it is consumed.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> Drop for Retired<T> {
    fn drop(&mut self) {
        self.wait_until_unprotected();
        // SAFETY: see `reclaim`.
        unsafe {
            drop(Box::from_raw(self.ptr.as_ptr()));
        }
    }
}

impl<T> std::fmt::Debug for Retired<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Retired").field(&self.ptr).finish()
    }
}
