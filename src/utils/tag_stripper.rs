//! 标签剥离：基于片段清洗器的两个预设
//! 1. 全部剥离：输出纯文本（仍按标记转义）
//! 2. 保留换行：块级结构统一替换为 `<br />`

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::AllowlistConfig;
use crate::error::SanResult;
use crate::sanitizer::Sanitizer;

/// 统一的换行标记
pub const LINE_BREAK: &str = "<br />";

/// 保留换行时允许的标签
const BREAK_ELEMENTS: &[&str] = &["p", "ul", "li", "br", "blockquote"];

/// 数字实体 &#0; ~ &#13;、&nbsp;、不间断空格以及所有空白
static ENTITY_AND_SPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&#([0-9]|10|11|12|13);|&nbsp;|\u{a0}|\s").unwrap()
});

static BLOCK_OPEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(p|li|blockquote)[^>]*>").unwrap()
});

static BREAK_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(br\s*/?|ul[^>]*|/[^>]*)>").unwrap()
});

static BREAK_SPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<br />(\s|\u{a0}|&nbsp;)+").unwrap()
});

static STRIP_ALL: Lazy<Sanitizer> = Lazy::new(|| {
    Sanitizer::with_transformers(AllowlistConfig::attribute_free_only(&[], true), Vec::new())
});

static KEEP_BREAKS: Lazy<Sanitizer> = Lazy::new(|| {
    Sanitizer::with_transformers(AllowlistConfig::attribute_free_only(BREAK_ELEMENTS, false), Vec::new())
});

/// 清除所有标签、实体空白和空白字符
///
/// # 示例
/// `"<a>ссылка с&nbsp;пробелом</a><p>параграф&#9;с\tтабуляцией</p>"`
/// => `"ссылкаспробелом параграфстабуляцией "`
pub fn strip_all_tags(text: &str) -> SanResult<String> {
    let compact = ENTITY_AND_SPACE_RE.replace_all(text, "");
    STRIP_ALL.sanitize(&compact)
}

/// 清除标签但保留换行
///
/// # 示例
/// `"<a></a><ul><li>элемент списка</li></ul><p>параграф</p>просто перенос<br>"`
/// => `"<br />элемент списка<br /><br />параграф<br />просто перенос<br />"`
pub fn strip_tags_keep_breaks(text: &str) -> SanResult<String> {
    // 第一遍：结构清洗，之后只剩下无属性的 p/ul/li/br/blockquote
    let sanitized = KEEP_BREAKS.sanitize(text)?;

    // 第二遍：文本层面统一换行
    let without_open = BLOCK_OPEN_RE.replace_all(&sanitized, "");
    let with_breaks = BREAK_TAG_RE.replace_all(&without_open, LINE_BREAK);
    let collapsed = BREAK_SPACE_RE.replace_all(&with_breaks, LINE_BREAK);

    Ok(collapsed.into_owned())
}
