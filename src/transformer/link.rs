//! 链接规范化：a[href] / img[src]
//! http://www.фермаежей.рф => http://www.xn--80ajbaetq5a8a.xn--p1ai/

use std::collections::HashSet;
use tracing::debug;

use super::{TransformOutcome, Transformer};
use crate::config::DEFAULT_URL_SCHEMES;
use crate::parser::Element;
use crate::utils::uri::{normalize_uri, uri_scheme};

/// 规范化后再次校验协议，规范化结果不在白名单内时删除该属性
#[derive(Debug, Clone)]
pub struct LinkNormalizer {
    schemes: HashSet<String>,
}

impl Default for LinkNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_URL_SCHEMES.iter().copied())
    }
}

impl LinkNormalizer {
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schemes: schemes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn schemes(&self) -> &HashSet<String> {
        &self.schemes
    }

    /// 元素对应的链接属性
    fn link_attribute(name: &str) -> Option<&'static str> {
        match name {
            "a" => Some("href"),
            "img" => Some("src"),
            _ => None,
        }
    }
}

impl Transformer for LinkNormalizer {
    fn name(&self) -> &'static str {
        "link_normalizer"
    }

    fn transform(&self, element: &mut Element) -> TransformOutcome {
        let Some(attr_name) = Self::link_attribute(&element.name) else {
            return TransformOutcome::Unchanged;
        };
        let Some(value) = element.attr(attr_name) else {
            return TransformOutcome::Unchanged;
        };

        match normalize_uri(value) {
            Ok(normalized) => {
                match uri_scheme(&normalized) {
                    Some(scheme) if !self.schemes.contains(&scheme) => {
                        debug!("规范化后的链接协议不在白名单内，删除 {}[{}]：{}", element.name, attr_name, scheme);
                        element.remove_attr(attr_name);
                    }
                    _ => element.set_attr(attr_name, normalized),
                }
                TransformOutcome::Mutated
            }
            // 坏链接不是安全问题：去掉标签，保留内容
            Err(e) => {
                debug!("链接无法解析，展开 <{}>：{}", element.name, e);
                TransformOutcome::UnwrappedToChildren
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Node;

    fn anchor(href: &str) -> Element {
        let mut a = Element::new("a");
        a.set_attr("href", href);
        a.children.push(Node::text("x"));
        a
    }

    #[test]
    fn test_rewrites_idn_href() {
        let mut a = anchor("http://www.фермаежей.рф");

        assert_eq!(LinkNormalizer::default().transform(&mut a), TransformOutcome::Mutated);
        assert_eq!(a.attr("href"), Some("http://www.xn--80ajbaetq5a8a.xn--p1ai/"));
        assert_eq!(a.text_content(), "x");
    }

    #[test]
    fn test_rewrites_img_src() {
        let mut img = Element::new("img");
        img.set_attr("src", "/pics/кот.png");

        assert_eq!(LinkNormalizer::default().transform(&mut img), TransformOutcome::Mutated);
        assert_eq!(img.attr("src"), Some("/pics/%D0%BA%D0%BE%D1%82.png"));
    }

    #[test]
    fn test_invalid_href_unwraps() {
        let mut a = anchor("http://example.com:99999/");
        assert_eq!(LinkNormalizer::default().transform(&mut a), TransformOutcome::UnwrappedToChildren);
    }

    #[test]
    fn test_drops_link_outside_scheme_set() {
        let mut a = anchor("ftp://files.example.com/a");
        let normalizer = LinkNormalizer::new(["http", "https"]);

        assert_eq!(normalizer.transform(&mut a), TransformOutcome::Mutated);
        assert_eq!(a.attr("href"), None);
        assert_eq!(a.text_content(), "x");
    }

    #[test]
    fn test_unicode_space_prefix_stays_relative() {
        let mut img = Element::new("img");
        img.set_attr("src", "\u{3000}javascript:alert(1)");

        assert_eq!(LinkNormalizer::default().transform(&mut img), TransformOutcome::Mutated);
        assert_eq!(img.attr("src"), Some("%E3%80%80javascript:alert(1)"));
    }

    #[test]
    fn test_ignores_other_elements_and_missing_attribute() {
        let mut a = Element::new("a");
        assert_eq!(LinkNormalizer::default().transform(&mut a), TransformOutcome::Unchanged);

        let mut div = Element::new("div");
        div.set_attr("href", "http://[::1");
        assert_eq!(LinkNormalizer::default().transform(&mut div), TransformOutcome::Unchanged);
    }
}
