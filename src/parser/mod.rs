//! 解析模块：片段节点模型、构建与序列化
pub mod node;
pub mod fragment_builder;
pub mod serializer;

// 导出核心接口
pub use self::node::{Element, Fragment, Node};
pub use self::fragment_builder::{FragmentBuilder, parse_fragment, is_void_element};
pub use self::serializer::serialize_fragment;
