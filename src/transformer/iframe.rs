//! iframe 域名限制：只保留受信视频站点的嵌入

use std::collections::HashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{TransformOutcome, Transformer};
use crate::parser::Element;

/// 受信嵌入地址（协议可省略冒号，可带 www 前缀）
static TRUSTED_EMBED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(http|https):?//(www\.)?youtube?\.com/").unwrap()
});

/// iframe 规范化器，绑定调用方为 iframe 开放的属性集合
#[derive(Debug, Clone)]
pub struct IframeNormalizer {
    attributes: HashSet<String>,
}

impl IframeNormalizer {
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn attributes(&self) -> &HashSet<String> {
        &self.attributes
    }

    fn is_trusted(src: &str) -> bool {
        TRUSTED_EMBED_RE.is_match(src)
    }
}

impl Transformer for IframeNormalizer {
    fn name(&self) -> &'static str {
        "iframe_normalizer"
    }

    fn transform(&self, element: &mut Element) -> TransformOutcome {
        if element.name != "iframe" {
            return TransformOutcome::Unchanged;
        }

        // 嵌入本身就是风险，子节点也没有回退价值：整体删除
        if !element.attr("src").is_some_and(Self::is_trusted) {
            debug!("删除非受信 iframe：{:?}", element.attr("src"));
            return TransformOutcome::Removed;
        }

        // 只按 iframe 自身的属性集合再过滤一遍
        element.retain_attrs(|name, _| self.attributes.contains(name));
        TransformOutcome::Mutated
    }
}
