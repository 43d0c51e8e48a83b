/// 边界情况测试模块
/// 测试多个槽的声明、槽的复用、无读者时的替换以及弱内存序配置
use super::DropCounter;
use crate::{AnnounceOrdering, HazardDomain};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 测试1: 被替换后守卫仍然可以读取旧记录
#[test]
fn test_guard_reads_replaced_record() {
    let domain = HazardDomain::new([1u32, 2, 3]);
    let mut reader = domain.register_reader().unwrap();

    let guard = reader.protect();
    assert!(guard.is_current());

    let old = domain.swap([4, 5, 6]);
    assert!(!guard.is_current());
    assert_eq!(*guard, [1, 2, 3]);
    assert_eq!(*old, [1, 2, 3]);

    drop(guard);
    drop(old);
}

/// 测试2: 两个读者声明同一条记录，直到两者都清除后才可回收
#[test]
fn test_record_protected_by_two_readers() {
    let domain = HazardDomain::builder().reader_slots(2).build(0i32).unwrap();
    let mut reader1 = domain.register_reader().unwrap();
    let mut reader2 = domain.register_reader().unwrap();

    let guard1 = reader1.protect();
    let guard2 = reader2.protect();
    let old = domain.swap(1);

    assert!(old.is_protected());
    drop(guard1);
    assert!(old.is_protected());
    drop(guard2);
    assert!(!old.is_protected());
}

/// 测试3: 两个读者分别声明不同的记录
#[test]
fn test_readers_protect_different_records() {
    let domain = HazardDomain::builder().reader_slots(2).build(0i32).unwrap();
    let mut reader1 = domain.register_reader().unwrap();
    let mut reader2 = domain.register_reader().unwrap();

    let guard1 = reader1.protect();
    let first = domain.swap(1);
    let guard2 = reader2.protect();
    let second = domain.swap(2);

    assert_eq!(*guard1, 0);
    assert_eq!(*guard2, 1);
    assert!(first.is_protected());
    assert!(second.is_protected());

    // 只清除第二个读者，第一条记录仍受保护
    drop(guard2);
    assert!(first.is_protected());
    assert!(!second.is_protected());
    assert_eq!(*second.reclaim(), 1);

    drop(guard1);
    assert_eq!(*first.reclaim(), 0);
}

/// 测试4: 槽释放后被复用
#[test]
fn test_slot_reuse_after_release() {
    let domain = HazardDomain::builder().reader_slots(3).build(0i32).unwrap();
    let r0 = domain.register_reader().unwrap();
    let r1 = domain.register_reader().unwrap();
    let r2 = domain.register_reader().unwrap();
    assert_eq!((r0.slot_index(), r1.slot_index(), r2.slot_index()), (0, 1, 2));

    drop(r1);
    let again = domain.register_reader().unwrap();
    assert_eq!(again.slot_index(), 1);
    assert!(domain.register_reader().is_err());
}

/// 测试5: 没有读者时大量替换不会阻塞，也不会泄漏
#[test]
fn test_many_swaps_without_readers() {
    let drops = Arc::new(AtomicUsize::new(0));
    let domain = HazardDomain::builder()
        .reader_slots(4)
        .build(DropCounter::new(0, &drops))
        .unwrap();

    for i in 1..=1000 {
        domain.store(DropCounter::new(i, &drops));
    }
    assert_eq!(drops.load(Ordering::SeqCst), 1000);

    drop(domain);
    assert_eq!(drops.load(Ordering::SeqCst), 1001);
}

/// 测试6: 已注册但空闲的读者不会阻塞回收
#[test]
fn test_idle_reader_does_not_block_reclaim() {
    let domain = HazardDomain::new(0i32);
    let mut reader = domain.register_reader().unwrap();

    {
        let _guard = reader.protect();
    }
    let old = domain.swap(1);
    assert!(!old.is_protected());
    assert_eq!(*old.reclaim(), 0);
}

/// 测试7: 弱内存序配置在单线程下行为一致
#[test]
fn test_relaxed_ordering_single_thread() {
    let domain = HazardDomain::builder()
        .announce_ordering(AnnounceOrdering::Relaxed)
        .build(0i32)
        .unwrap();
    let mut reader = domain.register_reader().unwrap();

    let guard = reader.protect();
    let old = domain.swap(1);
    assert!(old.is_protected());
    drop(guard);
    assert_eq!(*old.reclaim(), 0);
    assert_eq!(*reader.protect(), 1);
}

/// 测试8: 守卫只阻塞它声明的那条记录
#[test]
fn test_guard_only_blocks_its_own_record() {
    let domain = HazardDomain::new(0i32);
    let mut reader = domain.register_reader().unwrap();

    let first = domain.swap(1);
    let guard = reader.protect();
    assert_eq!(*guard, 1);

    // first 在读者声明之前就已被驱逐
    assert!(!first.is_protected());
    assert_eq!(*first.reclaim(), 0);

    let second = domain.swap(2);
    assert!(second.is_protected());
    drop(guard);
    drop(second);
}

/// 测试9: 大负载类型
#[test]
fn test_large_payload() {
    let domain = HazardDomain::new(vec![0u8; 1 << 16]);
    let mut reader = domain.register_reader().unwrap();

    let old = domain.swap(vec![1u8; 1 << 16]);
    assert_eq!(old.len(), 1 << 16);
    drop(old);

    let guard = reader.protect();
    assert!(guard.iter().all(|&b| b == 1));
}

/// 测试10: 交换之前加载了指针的读者可以在扫描之后写入旧地址，
/// 但它的复查失败，所以回收仍然安全
#[test]
fn test_stale_announcement_after_scan_fails_validation() {
    let domain = HazardDomain::new(1i32);
    let reader = domain.register_reader().unwrap();
    let slot = &domain.shared.slots[reader.slot_index()];

    // 读者在交换之前加载的指针
    let stale = domain.shared.current.load();
    let old = domain.swap(2);
    assert!(!old.is_protected());

    // 读者在扫描之后才写入声明
    slot.hazard.store(stale.cast(), Ordering::SeqCst);
    assert!(old.is_protected());

    // 复查看到新记录，读者撤回声明
    assert_ne!(domain.shared.current.load(), stale);
    slot.clear();
    assert!(!old.is_protected());
    assert_eq!(*old.reclaim(), 1);
}
