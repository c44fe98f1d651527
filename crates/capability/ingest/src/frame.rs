//! 帧内 JSON 提取。
//!
//! 只截取第一个 `{` 到其后第一个 `}` 之间的内容，不处理嵌套对象：
//! `{"a":{"b":1}}` 会被截成 `{"a":{"b":1}`，随后解析失败。

/// 返回第一个 `{` 至其后第一个 `}`（含两端）的切片；任一定界符缺失时返回 `None`。
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = start + text[start..].find('}')?;
    Some(&text[start..=end])
}
