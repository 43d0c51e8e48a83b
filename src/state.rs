use crate::ptr::HazardPtr;
use crate::sync::{AtomicBool, AtomicPtr, Ordering};
use std::boxed::Box;
use std::ptr;

/// Default number of hazard slots (one per reader thread).
/// 默认的危险指针槽数量（每个读者线程一个）。
pub(crate) const DEFAULT_READER_SLOTS: usize = 1;

/// Value of a hazard slot that holds no announcement.
///
/// Never a valid payload address, since published pointers come from `Box`.
///
/// 不持有任何声明的危险槽的值。
/// 它永远不是有效的负载地址，因为发布的指针都来自 `Box`。
#[inline(always)]
pub(crate) fn no_announcement() -> *mut () {
    ptr::null_mut()
}

/// Memory ordering used by the announce / re-check pair and the writer's slot scan.
///
/// `Fenced` is the only correct choice. `Relaxed` removes the store-load barrier and
/// exists so that tests can show the barrier is load-bearing.
///
/// 声明 / 复查以及写入者扫描槽时使用的内存序。
/// `Fenced` 是唯一正确的选择。`Relaxed` 去掉了 store-load 屏障，
/// 仅用于测试证明该屏障是必需的。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnounceOrdering {
    /// Release announcement, `SeqCst` fence, acquire re-check.
    #[default]
    Fenced,
    /// Relaxed announcement and relaxed slot scan, no fences. Unsound.
    Relaxed,
}

impl AnnounceOrdering {
    #[inline]
    pub(crate) fn announce(self) -> Ordering {
        match self {
            AnnounceOrdering::Fenced => Ordering::Release,
            AnnounceOrdering::Relaxed => Ordering::Relaxed,
        }
    }

    #[inline]
    pub(crate) fn scan(self) -> Ordering {
        match self {
            AnnounceOrdering::Fenced => Ordering::Acquire,
            AnnounceOrdering::Relaxed => Ordering::Relaxed,
        }
    }

    #[inline]
    pub(crate) fn is_fenced(self) -> bool {
        self == AnnounceOrdering::Fenced
    }
}

/// A hazard slot owned by at most one reader at a time.
///
/// Cache-aligned to prevent false sharing between readers.
///
/// 同一时刻最多被一个读者持有的危险槽。
/// 缓存对齐以防止读者之间的伪共享。
#[repr(align(64))]
pub(crate) struct HazardSlot {
    /// The announced pointer, or `no_announcement()`.
    /// 已声明的指针，或 `no_announcement()`。
    pub(crate) hazard: AtomicPtr<()>,
    /// Set while a `HazardReader` holds this slot.
    /// 当某个 `HazardReader` 持有此槽时置位。
    pub(crate) claimed: AtomicBool,
}

impl HazardSlot {
    pub(crate) fn new() -> Self {
        Self {
            hazard: AtomicPtr::new(no_announcement()),
            claimed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn clear(&self) {
        self.hazard.store(no_announcement(), Ordering::Release);
    }
}

/// State shared by every clone of a `HazardDomain`.
///
/// Owns the published record and the fixed slot table.
///
/// `HazardDomain` 所有克隆共享的状态。
/// 拥有已发布的记录和固定大小的槽表。
pub(crate) struct SharedState<T> {
    /// The protected object store.
    /// 受保护的对象存储。
    pub(crate) current: HazardPtr<T>,
    /// One slot per reader, sized at construction.
    /// 每个读者一个槽，在构造时确定大小。
    pub(crate) slots: Box<[HazardSlot]>,
    pub(crate) ordering: AnnounceOrdering,
}

impl<T> SharedState<T> {
    /// Returns `true` if any slot currently announces `target`.
    ///
    /// Callers must have issued the `SeqCst` fence that pairs with the readers'
    /// fence before the first scan.
    ///
    /// 如果任一槽当前声明了 `target`，返回 `true`。
    #[inline]
    pub(crate) fn is_announced(&self, target: *mut ()) -> bool {
        let order = self.ordering.scan();
        self.slots
            .iter()
            .any(|slot| slot.hazard.load(order) == target)
    }
}
