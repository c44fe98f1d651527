use lora_dedup::{DEFAULT_CAPACITY, RecencyFilter};
use std::collections::VecDeque;

#[test]
fn evicts_oldest_after_capacity_plus_one() {
    let n = 5;
    let mut filter = RecencyFilter::new(n);
    for i in 0..=n {
        assert!(!filter.seen_before(&format!("id-{i}")));
    }
    assert_eq!(filter.len(), n);
    // 2..=N+1 仍在历史中
    for i in 1..=n {
        assert!(filter.seen_before(&format!("id-{i}")));
    }
    // 第 1 个已被淘汰
    assert!(!filter.seen_before("id-0"));
}

#[test]
fn default_capacity_is_ten() {
    let filter = RecencyFilter::default();
    assert_eq!(filter.capacity(), DEFAULT_CAPACITY);
    assert_eq!(DEFAULT_CAPACITY, 10);
    assert!(filter.is_empty());
}

#[test]
fn matches_fifo_model_over_mixed_sequence() {
    let capacity = 4;
    let mut filter = RecencyFilter::new(capacity);
    let mut model: VecDeque<String> = VecDeque::new();

    // 确定性伪随机序列：小字母表保证大量重复与淘汰。
    let mut state: u32 = 0x2545_f491;
    for _ in 0..500 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let id = format!("m{}", state % 9);

        let expected = model.contains(&id);
        if !expected {
            if model.len() == capacity {
                model.pop_front();
            }
            model.push_back(id.clone());
        }
        assert_eq!(filter.seen_before(&id), expected, "id {id}");
        assert!(filter.len() <= capacity);
        assert_eq!(
            filter.iter().collect::<Vec<_>>(),
            model.iter().map(String::as_str).collect::<Vec<_>>()
        );
    }
}
