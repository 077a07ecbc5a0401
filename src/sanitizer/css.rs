//! style 属性过滤：只保留白名单内的 CSS 属性声明

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::AllowlistConfig;

static CSS_COMMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)/\*.*?\*/").unwrap()
});

/// 值中出现即丢弃整条声明
const UNSAFE_VALUE_MARKERS: &[&str] = &[
    "expression(", "javascript:", "vbscript:", "behavior", "-moz-binding", "url(", "\\", "<",
];

/// 过滤声明列表；没有剩余声明时返回 None
pub fn filter_style(style: &str, config: &AllowlistConfig) -> Option<String> {
    let style = CSS_COMMENT_RE.replace_all(style, "");

    let declarations: Vec<String> = style
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();

            if value.is_empty() || !config.allows_css_property(&property) || !is_safe_value(value) {
                return None;
            }
            Some(format!("{}: {}", property, value))
        })
        .collect();

    if declarations.is_empty() {
        None
    } else {
        Some(declarations.join("; "))
    }
}

fn is_safe_value(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    !UNSAFE_VALUE_MARKERS.iter().any(|marker| lower.contains(marker))
}
