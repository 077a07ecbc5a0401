//! 节点转换器：结构过滤之后，对每个保留下来的元素依次调用
pub mod link;
pub mod iframe;

use std::fmt::Debug;

use crate::parser::Element;

// 导出核心接口
pub use self::link::LinkNormalizer;
pub use self::iframe::IframeNormalizer;

/// 转换结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOutcome {
    /// 未处理
    Unchanged,
    /// 已原地修改
    Mutated,
    /// 去掉元素本身，子节点原位保留
    UnwrappedToChildren,
    /// 连同子节点整体删除
    Removed,
}

impl TransformOutcome {
    /// 是否终止后续转换器
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::UnwrappedToChildren | Self::Removed)
    }
}

/// 转换器接口
/// 只会收到已通过白名单过滤、子树已清洗完毕的元素
pub trait Transformer: Debug + Send + Sync {
    /// 名称（用于日志）
    fn name(&self) -> &'static str;

    fn transform(&self, element: &mut Element) -> TransformOutcome;
}

/// 依次执行转换器，遇到展开/删除立即返回
pub fn run_pipeline(transformers: &[Box<dyn Transformer>], element: &mut Element) -> TransformOutcome {
    let mut outcome = TransformOutcome::Unchanged;
    for transformer in transformers {
        match transformer.transform(element) {
            TransformOutcome::Unchanged => {}
            TransformOutcome::Mutated => outcome = TransformOutcome::Mutated,
            terminal => return terminal,
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Fixed(TransformOutcome, &'static AtomicUsize);

    impl Transformer for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn transform(&self, _element: &mut Element) -> TransformOutcome {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0
        }
    }

    #[test]
    fn test_pipeline_short_circuits() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let pipeline: Vec<Box<dyn Transformer>> = vec![
            Box::new(Fixed(TransformOutcome::Mutated, &CALLS)),
            Box::new(Fixed(TransformOutcome::Removed, &CALLS)),
            Box::new(Fixed(TransformOutcome::Mutated, &CALLS)),
        ];
        let mut element = Element::new("a");

        assert_eq!(run_pipeline(&pipeline, &mut element), TransformOutcome::Removed);
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_pipeline_reports_mutation() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let pipeline: Vec<Box<dyn Transformer>> = vec![
            Box::new(Fixed(TransformOutcome::Unchanged, &CALLS)),
            Box::new(Fixed(TransformOutcome::Mutated, &CALLS)),
            Box::new(Fixed(TransformOutcome::Unchanged, &CALLS)),
        ];
        let mut element = Element::new("a");

        assert_eq!(run_pipeline(&pipeline, &mut element), TransformOutcome::Mutated);
        assert_eq!(CALLS.load(Ordering::SeqCst), 3);
    }
}
