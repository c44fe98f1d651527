//! 近期消息去重：记住最近 N 个消息标识，超出容量按 FIFO 淘汰最旧者。

use std::collections::{HashSet, VecDeque};

/// 默认历史容量。
pub const DEFAULT_CAPACITY: usize = 10;

/// 有界近期过滤器。
#[derive(Debug, Clone)]
pub struct RecencyFilter {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl Default for RecencyFilter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecencyFilter {
    /// 创建容量为 `capacity` 的过滤器（0 视为 1）。
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// 已见过返回 true 且不修改历史；否则记入历史并返回 false。
    pub fn seen_before(&mut self, id: &str) -> bool {
        if self.members.contains(id) {
            return true;
        }
        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        self.order.push_back(id.to_string());
        self.members.insert(id.to_string());
        false
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 按插入顺序（旧 → 新）遍历历史。
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}
