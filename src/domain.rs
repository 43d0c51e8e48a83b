use crate::error::{HazardError, Result};
use crate::ptr::HazardPtr;
use crate::reader::HazardReader;
use crate::retired::Retired;
use crate::state::{AnnounceOrdering, DEFAULT_READER_SLOTS, HazardSlot, SharedState};
use crate::sync::{Arc, Ordering};
use log::debug;
use std::boxed::Box;

/// Builder for configuring a `HazardDomain`.
///
/// - `reader_slots`: number of hazard slots, i.e. how many readers may be registered at once
/// - `announce_ordering`: memory ordering of the announcement protocol
///
/// # Example
/// ```
/// use hazard_swap::HazardDomain;
///
/// let domain = HazardDomain::builder()
///     .reader_slots(4)
///     .build(0u64)
///     .unwrap();
/// assert_eq!(domain.reader_slots(), 4);
/// ```
///
/// 用于配置 `HazardDomain` 的构建器。
pub struct HazardDomainBuilder {
    reader_slots: usize,
    ordering: AnnounceOrdering,
}

impl HazardDomainBuilder {
    /// Create a new builder with default settings.
    /// 创建一个带有默认设置的新构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            reader_slots: DEFAULT_READER_SLOTS,
            ordering: AnnounceOrdering::Fenced,
        }
    }

    /// Set the number of hazard slots.
    ///
    /// Writers scan every slot before reclaiming, so this is also the cost of one
    /// retirement check.
    ///
    /// Default: `1`
    ///
    /// 设置危险槽的数量。
    /// 写入者在回收前会扫描所有槽，所以这也是一次退休检查的开销。
    #[inline]
    pub fn reader_slots(mut self, slots: usize) -> Self {
        self.reader_slots = slots;
        self
    }

    /// Set the memory ordering of the announcement protocol.
    ///
    /// Anything other than `AnnounceOrdering::Fenced` breaks reclamation safety and
    /// is meant for regression tests only.
    ///
    /// Default: `AnnounceOrdering::Fenced`
    ///
    /// 设置声明协议的内存序。
    /// 除 `AnnounceOrdering::Fenced` 以外的取值都会破坏回收安全性，仅用于回归测试。
    #[inline]
    pub fn announce_ordering(mut self, ordering: AnnounceOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Build the domain and publish `initial` as its first live record.
    ///
    /// Fails with `HazardError::InvalidConfig` if no reader slot was requested.
    ///
    /// 构建域，并将 `initial` 发布为第一个存活记录。
    #[inline]
    pub fn build<T>(self, initial: T) -> Result<HazardDomain<T>> {
        self.build_boxed(Box::new(initial))
    }

    /// Like `build`, for a record that is already on the heap.
    /// 与 `build` 相同，用于已在堆上的记录。
    pub fn build_boxed<T>(self, initial: Box<T>) -> Result<HazardDomain<T>> {
        if self.reader_slots == 0 {
            return Err(HazardError::InvalidConfig("reader_slots must be at least 1"));
        }

        let slots = (0..self.reader_slots).map(|_| HazardSlot::new()).collect();
        let shared = Arc::new(SharedState {
            current: HazardPtr::new(initial),
            slots,
            ordering: self.ordering,
        });

        debug!(
            "hazard domain built: {} reader slot(s), {:?} announcements",
            self.reader_slots, self.ordering
        );

        Ok(HazardDomain { shared })
    }
}

impl Default for HazardDomainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A hazard-pointer reclamation domain around one published record.
///
/// `HazardDomain` owns:
/// - The protected object store holding the live record.
/// - A fixed table of hazard slots, one per registered reader.
///
/// It is `Clone` and is shared by handing a clone to every thread. Readers
/// register through `register_reader()`; writers call `swap()` and get back a
/// `Retired` handle for the record they evicted. The last live record is freed
/// when the final clone (and every reader and retired handle) is dropped.
///
/// **Typical Usage**:
/// ```
/// use hazard_swap::HazardDomain;
///
/// let domain = HazardDomain::new(1u32);
///
/// // Reader thread: register and protect
/// let mut reader = domain.register_reader().unwrap();
/// assert_eq!(*reader.protect(), 1);
///
/// // Writer thread: publish and reclaim
/// let old = domain.swap(2);
/// assert_eq!(*old.reclaim(), 1);
/// ```
///
/// 围绕一个已发布记录的危险指针回收域。
/// `HazardDomain` 拥有：
/// - 持有存活记录的受保护对象存储。
/// - 一个固定大小的危险槽表，每个已注册的读者一个槽。
/// 它是 `Clone` 的，通过向每个线程分发一个克隆来共享。
/// 读者通过 `register_reader()` 注册；写入者调用 `swap()`，
/// 并获得其驱逐记录的 `Retired` 句柄。
/// 当最后一个克隆（以及所有读者和退休句柄）被 drop 时，最后一个存活记录被释放。
pub struct HazardDomain<T> {
    pub(crate) shared: Arc<SharedState<T>>,
}

impl<T> Clone for HazardDomain<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl HazardDomain<()> {
    /// Create a builder for configuring the domain.
    ///
    /// Lives on `HazardDomain<()>` so that `HazardDomain::builder()` needs no type
    /// annotation; the record type is fixed later by `build`.
    ///
    /// 创建一个用于配置域的构建器。
    #[inline]
    pub fn builder() -> HazardDomainBuilder {
        HazardDomainBuilder::new()
    }
}

impl<T> HazardDomain<T> {
    /// Create a domain with a single reader slot, publishing `initial`.
    /// 创建一个只有单个读者槽的域，并发布 `initial`。
    #[inline]
    pub fn new(initial: T) -> Self {
        let shared = Arc::new(SharedState {
            current: HazardPtr::new(Box::new(initial)),
            slots: Box::new([HazardSlot::new()]),
            ordering: AnnounceOrdering::Fenced,
        });
        HazardDomain { shared }
    }

    /// Number of hazard slots in this domain.
    /// 此域中危险槽的数量。
    #[inline]
    pub fn reader_slots(&self) -> usize {
        self.shared.slots.len()
    }

    /// The announcement ordering this domain was built with.
    #[inline]
    pub fn announce_ordering(&self) -> AnnounceOrdering {
        self.shared.ordering
    }

    /// Claim a free hazard slot and return a reader bound to it.
    ///
    /// The slot is released when the returned `HazardReader` is dropped.
    /// Fails with `HazardError::SlotsExhausted` if every slot is claimed.
    ///
    /// 占用一个空闲的危险槽，并返回绑定到该槽的读者。
    /// 当返回的 `HazardReader` 被 drop 时，该槽被释放。
    /// 如果所有槽都已被占用，返回 `HazardError::SlotsExhausted`。
    pub fn register_reader(&self) -> Result<HazardReader<T>> {
        for (index, slot) in self.shared.slots.iter().enumerate() {
            if slot
                .claimed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                debug!("reader registered on hazard slot {index}");
                return Ok(HazardReader::new(self.shared.clone(), index));
            }
        }

        Err(HazardError::SlotsExhausted {
            capacity: self.shared.slots.len(),
        })
    }

    /// Publish `data` and take ownership of the record it replaced.
    ///
    /// The returned `Retired` frees the evicted record only after no hazard slot
    /// announces it, whether it is dropped or explicitly `reclaim`ed.
    ///
    /// 发布 `data`，并取得被其替换的记录的所有权。
    /// 返回的 `Retired` 只有在没有危险槽声明该记录之后才会释放它，
    /// 无论它是被 drop 还是被显式地 `reclaim`。
    #[inline]
    pub fn swap(&self, data: T) -> Retired<T> {
        self.swap_box(Box::new(data))
    }

    /// Like `swap`, for a record that is already on the heap.
    ///
    /// `data` must be fully initialized: it becomes visible to readers as soon as
    /// this call publishes it.
    ///
    /// 与 `swap` 相同，用于已在堆上的记录。
    pub fn swap_box(&self, data: Box<T>) -> Retired<T> {
        let old = self.shared.current.exchange(data);
        Retired::new(self.shared.clone(), old)
    }

    /// Publish `data` and reclaim the previous record before returning.
    ///
    /// Spins while any reader still announces the previous record.
    ///
    /// 发布 `data`，并在返回之前回收之前的记录。
    #[inline]
    pub fn store(&self, data: T) {
        drop(self.swap(data));
    }
}

impl<T> std::fmt::Debug for HazardDomain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HazardDomain")
            .field("current", &self.shared.current)
            .field("reader_slots", &self.shared.slots.len())
            .field("ordering", &self.shared.ordering)
            .finish()
    }
}
