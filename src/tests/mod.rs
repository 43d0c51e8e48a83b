mod basic_tests;
mod edge_case_tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 在 drop 时计数的测试负载
#[derive(Debug)]
pub(crate) struct DropCounter {
    pub(crate) value: usize,
    drops: Arc<AtomicUsize>,
}

impl DropCounter {
    pub(crate) fn new(value: usize, drops: &Arc<AtomicUsize>) -> Self {
        DropCounter {
            value,
            drops: drops.clone(),
        }
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}
