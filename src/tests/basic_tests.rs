/// 基础功能测试模块
/// 测试域的创建、读者注册、保护读取和替换回收
use super::DropCounter;
use crate::{AnnounceOrdering, HazardDomain, HazardError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 测试1: 读者能读到初始值
#[test]
fn test_protect_reads_initial_value() {
    let domain = HazardDomain::new(42i32);
    let mut reader = domain.register_reader().unwrap();

    let guard = reader.protect();
    assert_eq!(*guard, 42);
}

/// 测试2: swap 返回被替换的旧值
#[test]
fn test_swap_returns_previous_value() {
    let domain = HazardDomain::new(String::from("first"));

    let old = domain.swap(String::from("second"));
    assert_eq!(old.as_str(), "first");

    let old = old.reclaim();
    assert_eq!(*old, "first");

    let mut reader = domain.register_reader().unwrap();
    assert_eq!(reader.protect().as_str(), "second");
}

/// 测试3: store 立即释放旧值
#[test]
fn test_store_frees_previous_value() {
    let drops = Arc::new(AtomicUsize::new(0));
    let domain = HazardDomain::new(DropCounter::new(0, &drops));

    domain.store(DropCounter::new(1, &drops));
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    domain.store(DropCounter::new(2, &drops));
    assert_eq!(drops.load(Ordering::SeqCst), 2);

    let mut reader = domain.register_reader().unwrap();
    assert_eq!(reader.protect().value, 2);
}

/// 测试4: 顺序的替换操作
#[test]
fn test_sequential_swaps() {
    let domain = HazardDomain::new(0u64);
    let mut reader = domain.register_reader().unwrap();

    for i in 1..=100u64 {
        let old = domain.swap(i);
        assert_eq!(*old, i - 1);
        drop(old);
        assert_eq!(*reader.protect(), i);
    }
}

/// 测试5: 使用构建器配置读者槽数量
#[test]
fn test_builder_reader_slots() {
    let domain = HazardDomain::builder().reader_slots(3).build(0i32).unwrap();
    assert_eq!(domain.reader_slots(), 3);

    let readers: Vec<_> = (0..3).map(|_| domain.register_reader().unwrap()).collect();
    let mut indices: Vec<_> = readers.iter().map(|r| r.slot_index()).collect();
    indices.sort();
    assert_eq!(indices, vec![0, 1, 2]);
}

/// 测试6: 槽耗尽时注册失败
#[test]
fn test_register_reader_slots_exhausted() {
    let domain = HazardDomain::new(0i32);
    let _reader = domain.register_reader().unwrap();

    match domain.register_reader() {
        Err(e) => assert_eq!(e, HazardError::SlotsExhausted { capacity: 1 }),
        Ok(_) => panic!("second reader registered on a single-slot domain"),
    }
}

/// 测试7: 零个读者槽是无效配置
#[test]
fn test_builder_rejects_zero_slots() {
    let result = HazardDomain::builder().reader_slots(0).build(0i32);
    assert!(matches!(result, Err(HazardError::InvalidConfig(_))));
}

/// 测试8: 默认的声明内存序
#[test]
fn test_default_announce_ordering() {
    let domain = HazardDomain::new(0i32);
    assert_eq!(domain.announce_ordering(), AnnounceOrdering::Fenced);

    let domain = HazardDomain::builder()
        .announce_ordering(AnnounceOrdering::Relaxed)
        .build(0i32)
        .unwrap();
    assert_eq!(domain.announce_ordering(), AnnounceOrdering::Relaxed);
}

/// 测试9: 静止状态下 try_protect 一次成功
#[test]
fn test_try_protect_succeeds_without_writers() {
    let domain = HazardDomain::new(7u8);
    let mut reader = domain.register_reader().unwrap();

    let guard = reader.try_protect().expect("no writer can interfere");
    assert_eq!(*guard, 7);
    assert!(guard.is_current());
}

/// 测试10: swap_box 发布已在堆上的值
#[test]
fn test_swap_box() {
    let domain = HazardDomain::new(vec![1, 2, 3]);

    let old = domain.swap_box(Box::new(vec![4, 5]));
    assert_eq!(*old.reclaim(), vec![1, 2, 3]);

    let mut reader = domain.register_reader().unwrap();
    assert_eq!(*reader.protect(), vec![4, 5]);
}

/// 测试11: Debug 输出
#[test]
fn test_debug_format() {
    let domain = HazardDomain::builder().reader_slots(2).build(1i32).unwrap();
    let output = format!("{:?}", domain);
    assert!(output.contains("HazardDomain"));
    assert!(output.contains("reader_slots: 2"));

    let old = domain.swap(2);
    assert!(format!("{:?}", old).starts_with("Retired"));
}

/// 测试12: builder() 无需类型标注，记录类型由 build 决定
#[test]
fn test_builder_infers_record_type_from_build() {
    let strings = HazardDomain::builder()
        .reader_slots(2)
        .build(String::from("first"))
        .unwrap();
    let mut reader = strings.register_reader().unwrap();
    assert_eq!(reader.protect().as_str(), "first");

    let boxed = HazardDomain::builder()
        .build_boxed(Box::new(vec![1u8, 2, 3]))
        .unwrap();
    assert_eq!(boxed.reader_slots(), 1);
    assert_eq!(*boxed.swap(vec![4]).reclaim(), vec![1, 2, 3]);
}
