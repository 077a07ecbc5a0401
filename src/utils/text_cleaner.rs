//! 文本清理：去除控制字符与 Unicode 行/段分隔符

/// 去除 ASCII 控制字符（U+0000 ~ U+001F）
pub fn clear_control_characters(text: &str) -> String {
    text.chars().filter(|c| !('\u{0000}'..='\u{001f}').contains(c)).collect()
}

/// 去除 Unicode 分隔符（U+2028 LINE SEPARATOR、U+2029 PARAGRAPH SEPARATOR）
pub fn clear_unicode_separator_characters(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\u{2028}' | '\u{2029}')).collect()
}
