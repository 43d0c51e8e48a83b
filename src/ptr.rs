use crate::sync::{AtomicPtr, Ordering};
use std::boxed::Box;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// The protected object store: a single atomically published pointer.
///
/// It always holds a valid pointer obtained from `Box::into_raw`. Readers load it
/// with acquire ordering and writers exchange it with acquire-release ordering, so
/// every write made while initializing a record is visible to whoever loads it.
///
/// The store itself never frees a replaced value: `exchange` hands the previous
/// pointer back to the caller, who becomes its sole owner.
///
/// 受保护的对象存储：一个原子发布的指针。
/// 它始终持有一个由 `Box::into_raw` 得到的有效指针。读者以 acquire 语义加载，
/// 写入者以 acquire-release 语义交换，因此初始化记录时的所有写入
/// 对加载到它的线程都可见。
/// 存储本身从不释放被替换的值：`exchange` 将旧指针交还给调用者，
/// 调用者成为它唯一的所有者。
pub(crate) struct HazardPtr<T> {
    ptr: AtomicPtr<T>,
    // Owns a `T`: the domain is `Send`/`Sync` only when `T` is.
    _owns: PhantomData<Box<T>>,
}

impl<T> HazardPtr<T> {
    /// Publish the initial record.
    /// 发布初始记录。
    #[inline]
    pub(crate) fn new(data: Box<T>) -> Self {
        Self {
            ptr: AtomicPtr::new(Box::into_raw(data)),
            _owns: PhantomData,
        }
    }

    /// Acquire-load the currently published pointer.
    /// 以 acquire 语义加载当前发布的指针。
    #[inline]
    pub(crate) fn load(&self) -> *mut T {
        self.ptr.load(Ordering::Acquire)
    }

    /// Publish `data` and return the previously published pointer.
    ///
    /// The caller owns the returned pointer and must not free it before every
    /// hazard slot is clear of it.
    ///
    /// 发布 `data` 并返回之前发布的指针。
    /// 调用者拥有返回的指针，在所有危险槽都不再指向它之前不得释放。
    #[inline]
    pub(crate) fn exchange(&self, data: Box<T>) -> NonNull<T> {
        let new_ptr = Box::into_raw(data);
        let old_ptr = self.ptr.swap(new_ptr, Ordering::AcqRel);
        // SAFETY: the store is only ever written with `Box::into_raw` results.
        unsafe { NonNull::new_unchecked(old_ptr) }
    }
}

impl<T> std::fmt::Debug for HazardPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ptr = self.ptr.load(Ordering::Relaxed);
        f.debug_tuple("HazardPtr").field(&ptr).finish()
    }
}

impl<T> Drop for HazardPtr<T> {
    /// Free the last live record.
    ///
    /// Only reachable once every domain clone, reader and retired handle is gone,
    /// so no thread can still be announcing it.
    ///
    /// 释放最后一个存活的记录。
    /// 只有在所有域克隆、读者和退休句柄都已销毁后才会执行，
    /// 因此不会有线程仍在声明它。
    #[inline]
    fn drop(&mut self) {
        let ptr = self.ptr.load(Ordering::Relaxed);
        if !ptr.is_null() {
            unsafe {
                drop(Box::from_raw(ptr));
            }
        }
    }
}
