//! 输入长度守卫：解析前按字符数截断超长输入
//! 只防止拖垮解析器，不做结构修复（残缺标签交给解析器补全）
use tracing::debug;

use crate::config::DEFAULT_MAX_INPUT_CHARS;

pub struct SizeGuard;

impl SizeGuard {
    /// 默认字符上限
    pub const DEFAULT_LIMIT: usize = DEFAULT_MAX_INPUT_CHARS;

    /// 最多保留 limit 个字符（按字符而不是字节，不会截断多字节字符）
    #[inline]
    pub fn truncate(input: &str, limit: usize) -> &str {
        match input.char_indices().nth(limit) {
            Some((cut, _)) => {
                debug!("输入超过{}个字符，截断到{}字节", limit, cut);
                &input[..cut]
            }
            None => input,
        }
    }
}
