use crate::state::{HazardSlot, SharedState};
use crate::sync::{Arc, Ordering, fence, spin_loop};
use std::ops::Deref;
use std::ptr::NonNull;

/// A reader bound to one hazard slot of a `HazardDomain`.
///
/// Each reader thread should register exactly one `HazardReader` via
/// `HazardDomain::register_reader()`. It announces at most one record at a time:
/// `protect()` takes `&mut self`, so a second guard cannot be created while the
/// first is alive.
///
/// Dropping the reader clears its announcement and releases the slot for the
/// next registration.
///
/// 绑定到 `HazardDomain` 某个危险槽上的读者。
/// 每个读者线程应该通过 `HazardDomain::register_reader()` 注册恰好一个 `HazardReader`。
/// 它同一时刻最多声明一个记录：`protect()` 接收 `&mut self`，
/// 因此在第一个守卫存活时无法创建第二个守卫。
/// drop 读者会清除其声明，并释放槽以供下一次注册使用。
pub struct HazardReader<T> {
    shared: Arc<SharedState<T>>,
    index: usize,
}

impl<T> HazardReader<T> {
    pub(crate) fn new(shared: Arc<SharedState<T>>, index: usize) -> Self {
        HazardReader { shared, index }
    }

    /// Index of the hazard slot this reader owns.
    /// 此读者拥有的危险槽的索引。
    #[inline]
    pub fn slot_index(&self) -> usize {
        self.index
    }

    #[inline]
    fn slot(&self) -> &HazardSlot {
        &self.shared.slots[self.index]
    }

    /// One round of the announcement protocol.
    ///
    /// Returns the validated pointer with the announcement left in place, or
    /// `None` with the slot cleared.
    fn announce(&self) -> Option<NonNull<T>> {
        let shared = &*self.shared;
        let slot = self.slot();
        let ordering = shared.ordering;

        // Step 1: snapshot the live pointer.
        // 步骤 1: 获取存活指针的快照。
        let ptr = shared.current.load();

        // Step 2: announce it.
        // 步骤 2: 声明它。
        slot.hazard.store(ptr.cast(), ordering.announce());

        // Step 3: the announcement must be visible before the re-check. Pairs with
        // the fence writers issue between their exchange and their slot scan.
        // 步骤 3: 声明必须在复查之前可见。与写入者在交换和扫描槽之间的屏障配对。
        if ordering.is_fenced() {
            fence(Ordering::SeqCst);
        }

        // Step 4: still live means no writer can have finished retiring it.
        // 步骤 4: 仍然存活意味着没有写入者能够完成对它的退休。
        if shared.current.load() == ptr {
            return NonNull::new(ptr);
        }

        // Step 5: replaced in between, withdraw.
        // 步骤 5: 期间已被替换，撤回声明。
        slot.clear();
        None
    }

    #[inline]
    fn guard(&self, ptr: NonNull<T>) -> ReadGuard<'_, T> {
        ReadGuard {
            shared: &self.shared,
            slot: self.slot(),
            ptr,
        }
    }

    /// Make one attempt to protect the live record.
    ///
    /// Announces the currently published pointer, then re-reads the store. If the
    /// record was replaced in between, the announcement is withdrawn and `None` is
    /// returned: the announced value may already be reclaimed.
    ///
    /// 尝试一次保护当前存活的记录。
    /// 先声明当前发布的指针，然后重新读取存储。如果记录在此期间被替换，
    /// 撤回声明并返回 `None`：被声明的值可能已经被回收。
    #[inline]
    pub fn try_protect(&mut self) -> Option<ReadGuard<'_, T>> {
        let ptr = self.announce()?;
        Some(self.guard(ptr))
    }

    /// Protect the live record, retrying until an announcement validates.
    ///
    /// Spins without bound while writers keep replacing the record between the
    /// announcement and the re-check.
    ///
    /// 保护存活记录，重试直到某次声明通过验证。
    /// 当写入者持续在声明和复查之间替换记录时，会无限自旋。
    #[inline]
    pub fn protect(&mut self) -> ReadGuard<'_, T> {
        loop {
            if let Some(ptr) = self.announce() {
                return self.guard(ptr);
            }
            spin_loop();
        }
    }
}

impl<T> Drop for HazardReader<T> {
    fn drop(&mut self) {
        let slot = self.slot();
        slot.clear();
        slot.claimed.store(false, Ordering::Release);
    }
}

/// A validated announcement of the live record.
///
/// Dereferences to the protected record. While it exists no writer frees the
/// record, even after it has been replaced. Dropping the guard clears the
/// announcement, unblocking any writer waiting on exactly this record.
///
/// 对存活记录的一次已验证的声明。
/// 可解引用为受保护的记录。只要它存在，就没有写入者会释放该记录，
/// 即使它已经被替换。drop 守卫会清除声明，解除等待该记录的写入者的阻塞。
#[must_use]
pub struct ReadGuard<'a, T> {
    shared: &'a SharedState<T>,
    slot: &'a HazardSlot,
    ptr: NonNull<T>,
}

impl<'a, T> ReadGuard<'a, T> {
    /// Whether the protected record is still the published one.
    ///
    /// A `false` result does not invalidate the guard; the record stays readable
    /// until the guard is dropped.
    ///
    /// 受保护的记录是否仍然是已发布的记录。
    /// 返回 `false` 并不会使守卫失效；在守卫被 drop 之前记录始终可读。
    #[inline]
    pub fn is_current(&self) -> bool {
        self.shared.current.load() == self.ptr.as_ptr()
    }
}

impl<'a, T> Deref for ReadGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the slot announces `ptr` and the announcement was validated
        // against the store, so no writer frees it before this guard drops.
        unsafe { self.ptr.as_ref() }
    }
}

impl<'a, T> Drop for ReadGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.slot.clear();
    }
}
