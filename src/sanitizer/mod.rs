//! 清洗模块：输入截断、结构过滤、CSS过滤
pub mod size_guard;
pub mod css;
pub mod fragment;

// 导出核心接口
pub use self::size_guard::SizeGuard;
pub use self::css::filter_style;
pub use self::fragment::{
    FragmentSanitizer, Sanitizer, sanitize, sanitize_with, sanitize_with_overrides,
};
