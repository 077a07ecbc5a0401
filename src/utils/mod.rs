//! 工具模块：标签剥离、URI处理、文本清理
pub mod tag_stripper;
pub mod uri;
pub mod text_cleaner;

// 导出核心接口
pub use self::tag_stripper::{strip_all_tags, strip_tags_keep_breaks, LINE_BREAK};
pub use self::uri::{add_params_to_url, normalize_uri, uri_scheme};
pub use self::text_cleaner::{clear_control_characters, clear_unicode_separator_characters};
