//! markup-sanitizer - 基于白名单的 HTML 片段清洗库

// 导出全局错误类型
pub use self::error::{SanitizeError, SanResult};

// 导出配置模块
pub use self::config::{AllowlistConfig, AllowlistConfigBuilder, AllowlistOverrides};

// 导出解析模块核心接口
pub use self::parser::{Element, Fragment, Node, parse_fragment, serialize_fragment};

// 导出清洗模块核心接口
pub use self::sanitizer::{
    FragmentSanitizer, Sanitizer, SizeGuard, sanitize, sanitize_with, sanitize_with_overrides,
};

// 导出转换器接口
pub use self::transformer::{
    IframeNormalizer, LinkNormalizer, TransformOutcome, Transformer,
};

// 导出工具模块核心接口
pub use self::utils::{
    add_params_to_url, clear_control_characters, clear_unicode_separator_characters,
    normalize_uri, strip_all_tags, strip_tags_keep_breaks,
};

// 声明所有子模块
pub mod config;
pub mod error;
pub mod parser;
pub mod sanitizer;
pub mod transformer;
pub mod utils;
