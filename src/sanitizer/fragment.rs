//! 片段清洗：解析 -> 白名单结构过滤 -> 转换器 -> 序列化

use once_cell::sync::Lazy;

use super::css::filter_style;
use super::size_guard::SizeGuard;
use crate::config::{AllowlistConfig, AllowlistOverrides};
use crate::error::SanResult;
use crate::parser::{Element, Fragment, Node, parse_fragment, serialize_fragment};
use crate::transformer::{
    IframeNormalizer, LinkNormalizer, TransformOutcome, Transformer, run_pipeline,
};
use crate::utils::uri::uri_scheme;

/// 默认配置的全局清洗器（只读）
static DEFAULT_SANITIZER: Lazy<Sanitizer> = Lazy::new(|| Sanitizer::new(AllowlistConfig::default()));

/// 单次清洗过程：借用配置和转换器列表
pub struct FragmentSanitizer<'a> {
    config: &'a AllowlistConfig,
    transformers: &'a [Box<dyn Transformer>],
}

impl<'a> FragmentSanitizer<'a> {
    pub fn new(config: &'a AllowlistConfig, transformers: &'a [Box<dyn Transformer>]) -> Self {
        Self { config, transformers }
    }

    /// 清洗标记文本
    pub fn sanitize(&self, input: &str) -> SanResult<String> {
        // 1. 解析前截断
        let input = SizeGuard::truncate(input, self.config.max_input_chars());

        // 2. 构建节点树（嵌套超限即失败）
        let fragment = parse_fragment(input, self.config.max_depth())?;

        // 3. 过滤 + 转换
        let cleaned = self.clean_fragment(fragment);

        // 4. 序列化
        Ok(serialize_fragment(&cleaned))
    }

    /// 清洗已解析的片段
    pub fn clean_fragment(&self, fragment: Fragment) -> Fragment {
        let mut out = Vec::with_capacity(fragment.len());
        self.clean_nodes(fragment, &mut out);
        out
    }

    fn clean_nodes(&self, nodes: Vec<Node>, out: &mut Vec<Node>) {
        for node in nodes {
            match node {
                Node::Comment(_) => {}
                Node::Text(text) => out.push(Node::Text(text)),
                Node::Element(element) => self.clean_element(element, out),
            }
        }
    }

    fn clean_element(&self, mut element: Element, out: &mut Vec<Node>) {
        // 非白名单元素：内容丢弃标签整体删除，其余展开
        if !self.config.allows_element(&element.name) {
            if self.config.is_no_content_tag(&element.name) {
                return;
            }
            self.unwrap_into(element, out);
            return;
        }

        // 1. 属性过滤
        self.filter_attributes(&mut element);

        // 2. 先处理子树，转换器只看到清洗完毕的子节点
        let children = std::mem::take(&mut element.children);
        self.clean_nodes(children, &mut element.children);

        // 3. 按注册顺序执行转换器
        match run_pipeline(self.transformers, &mut element) {
            TransformOutcome::Unchanged | TransformOutcome::Mutated => out.push(Node::Element(element)),
            TransformOutcome::UnwrappedToChildren => out.append(&mut element.children),
            TransformOutcome::Removed => {}
        }
    }

    /// 去掉元素本身，子节点原位保留；块级元素补空白避免文字粘连
    fn unwrap_into(&self, element: Element, out: &mut Vec<Node>) {
        let whitespace = self.config.whitespace_for(&element.name);

        if let Some((before, _)) = whitespace.filter(|(before, _)| !before.is_empty()) {
            out.push(Node::text(before));
        }
        self.clean_nodes(element.children, out);
        if let Some((_, after)) = whitespace.filter(|(_, after)| !after.is_empty()) {
            out.push(Node::text(after));
        }
    }

    fn filter_attributes(&self, element: &mut Element) {
        let config = self.config;
        let Element { name, attributes, .. } = element;
        let name = name.as_str();

        attributes.retain(|(attr, value)| {
            if !config.allows_attribute(name, attr) {
                return false;
            }
            // 带协议的链接必须在协议白名单内
            if matches!(attr.as_str(), "href" | "src") {
                if let Some(scheme) = uri_scheme(value) {
                    return config.allows_url_scheme(&scheme);
                }
            }
            true
        });

        if let Some(style) = element.attr("style") {
            match filter_style(style, config) {
                Some(filtered) => element.set_attr("style", filtered),
                None => {
                    element.remove_attr("style");
                }
            }
        }
    }
}

/// 可复用的清洗器：持有只读配置和转换器列表
#[derive(Debug)]
pub struct Sanitizer {
    config: AllowlistConfig,
    transformers: Vec<Box<dyn Transformer>>,
}

impl Sanitizer {
    /// 按配置推导转换器
    pub fn new(config: AllowlistConfig) -> Self {
        let transformers = default_transformers(&config);
        Self { config, transformers }
    }

    /// 自定义转换器列表（按给定顺序执行）
    pub fn with_transformers(config: AllowlistConfig, transformers: Vec<Box<dyn Transformer>>) -> Self {
        Self { config, transformers }
    }

    pub fn config(&self) -> &AllowlistConfig {
        &self.config
    }

    pub fn transformers(&self) -> &[Box<dyn Transformer>] {
        &self.transformers
    }

    pub fn sanitize(&self, text: &str) -> SanResult<String> {
        FragmentSanitizer::new(&self.config, &self.transformers).sanitize(text)
    }
}

/// 按默认白名单清洗
pub fn sanitize(text: &str) -> SanResult<String> {
    DEFAULT_SANITIZER.sanitize(text)
}

/// 默认白名单 + 覆盖项
pub fn sanitize_with_overrides(text: &str, overrides: AllowlistOverrides) -> SanResult<String> {
    if overrides.is_empty() {
        return sanitize(text);
    }
    Sanitizer::new(AllowlistConfig::build(overrides)?).sanitize(text)
}

/// 按指定配置清洗
///
/// 每次调用都会重新推导转换器；同一配置反复使用时应持有一个 [`Sanitizer`]
pub fn sanitize_with(text: &str, config: &AllowlistConfig) -> SanResult<String> {
    let transformers = default_transformers(config);
    FragmentSanitizer::new(config, &transformers).sanitize(text)
}

/// 链接规范化（协议集合取自配置）；开放了 iframe 时追加 iframe 规范化
fn default_transformers(config: &AllowlistConfig) -> Vec<Box<dyn Transformer>> {
    let mut transformers: Vec<Box<dyn Transformer>> =
        vec![Box::new(LinkNormalizer::new(config.url_schemes().iter().cloned()))];
    if let Some(attrs) = config.allowed_attributes("iframe") {
        transformers.push(Box::new(IframeNormalizer::new(attrs.iter().cloned())));
    }
    transformers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SanitizeError;

    fn iframe_overrides() -> AllowlistOverrides {
        let mut overrides = AllowlistOverrides::new();
        overrides.insert("iframe", ["src", "width", "height"]);
        overrides
    }

    #[test]
    fn test_no_content_tags_removed() {
        assert_eq!(sanitize("<script>alert(1)</script>safe").unwrap(), "safe");
        assert_eq!(
            sanitize("<style>p { color: red }</style><div>x<script><b>inner</b></script></div>").unwrap(),
            "<div>x</div>"
        );
    }

    #[test]
    fn test_unknown_tag_unwrapped() {
        assert_eq!(sanitize("<unknown>hello</unknown>").unwrap(), "hello");
        assert_eq!(sanitize("<font color=red><b>bold</b></font>").unwrap(), "<b>bold</b>");
    }

    #[test]
    fn test_block_elements_unwrap_with_spacing() {
        assert_eq!(sanitize("<h1>Title</h1>text").unwrap(), " Title text");
    }

    #[test]
    fn test_comments_removed() {
        assert_eq!(sanitize("a<!-- secret -->b<p><!--x-->c</p>").unwrap(), "ab<p>c</p>");
    }

    #[test]
    fn test_disallowed_attributes_dropped() {
        assert_eq!(
            sanitize(r#"<p align="center" onclick="evil()" class="x">t</p><b style="color:red">b</b>"#).unwrap(),
            r#"<p align="center">t</p><b>b</b>"#
        );
    }

    #[test]
    fn test_style_filtered() {
        assert_eq!(
            sanitize(r#"<span style="color: red; behavior: url(x); width: expression(1)">s</span>"#).unwrap(),
            r#"<span style="color: red">s</span>"#
        );
        assert_eq!(
            sanitize(r#"<div style="behavior: url(x)">d</div>"#).unwrap(),
            "<div>d</div>"
        );
    }

    #[test]
    fn test_link_normalized() {
        assert_eq!(
            sanitize(r#"<a href="http://www.фермаежей.рф" target="_blank">x</a>"#).unwrap(),
            r#"<a href="http://www.xn--80ajbaetq5a8a.xn--p1ai/" target="_blank">x</a>"#
        );
    }

    #[test]
    fn test_malformed_link_unwrapped() {
        assert_eq!(
            sanitize(r#"before <a href="http://example.com:99999/">link <b>text</b></a> after"#).unwrap(),
            "before link <b>text</b> after"
        );
    }

    #[test]
    fn test_script_scheme_dropped() {
        assert_eq!(
            sanitize(r#"<a href="java&#x09;script:alert(1)">x</a><img src="data:text/html,1">"#).unwrap(),
            "<a>x</a><img>"
        );
    }

    #[test]
    fn test_unicode_space_before_script_scheme_stays_inert() {
        let anchor = sanitize("<a href=\"&nbsp;javascript:alert(1)\">x</a>").unwrap();
        assert_eq!(anchor, r#"<a href="%C2%A0javascript:alert(1)">x</a>"#);
        assert_eq!(sanitize(&anchor).unwrap(), anchor);

        let img = sanitize("<img src=\"\u{3000}javascript:alert(1)\">").unwrap();
        assert_eq!(img, r#"<img src="%E3%80%80javascript:alert(1)">"#);
        assert_eq!(sanitize(&img).unwrap(), img);
    }

    #[test]
    fn test_sanitize_with_uses_config_schemes() {
        let config = AllowlistConfig::builder().url_schemes(["https"]).build().unwrap();
        assert_eq!(
            sanitize_with(r#"<a href="http://example.com/">a</a><a href="https://example.com/">b</a>"#, &config).unwrap(),
            r#"<a>a</a><a href="https://example.com/">b</a>"#
        );
    }

    #[test]
    fn test_iframe_not_allowed_by_default() {
        assert_eq!(
            sanitize(r#"<iframe src="https://www.youtube.com/embed/x">fb</iframe>"#).unwrap(),
            "fb"
        );
    }

    #[test]
    fn test_iframe_allow_and_deny() {
        let kept = sanitize_with_overrides(
            r#"<iframe src="https://www.youtube.com/embed/x" width="560" frameborder="0"></iframe>"#,
            iframe_overrides(),
        )
        .unwrap();
        assert_eq!(kept, r#"<iframe src="https://www.youtube.com/embed/x" width="560"></iframe>"#);

        let removed = sanitize_with_overrides(
            r#"a<iframe src="https://evil.example/x"><b>child</b></iframe>b"#,
            iframe_overrides(),
        )
        .unwrap();
        assert_eq!(removed, "ab");
    }

    #[test]
    fn test_iframe_uppercase_override_from_json() {
        let overrides = AllowlistOverrides::from_json(r#"{"IFRAME": ["SRC"]}"#).unwrap();
        assert_eq!(
            sanitize_with_overrides(r#"<iframe src="https://www.youtube.com/embed/x"></iframe>"#, overrides).unwrap(),
            r#"<iframe src="https://www.youtube.com/embed/x"></iframe>"#
        );
    }

    #[test]
    fn test_order_preserved() {
        assert_eq!(
            sanitize("<ul><li>one</li><x-item>two</x-item><li>three</li></ul>").unwrap(),
            "<ul><li>one</li>two<li>three</li></ul>"
        );
    }

    #[test]
    fn test_text_escaped() {
        assert_eq!(
            sanitize("1 &lt; 2 &amp; <b>&quot;q&quot;</b>").unwrap(),
            "1 &lt; 2 &amp; <b>\"q\"</b>"
        );
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<script>alert(1)</script>safe",
            "<p>one<p>two<ul><li>a<li>b</ul>",
            r#"<a href="http://www.фермаежей.рф">x</a><img src="кот.png" onerror="x">"#,
            "<h2>head</h2><div style=\"color:red;float:left\">a&nbsp;b &amp; c</div>",
            "<table><tr><td colspan=2>cell<td>next</table>",
            "<a href=\"http://[::1\">broken</a><!-- c --><em>e</em>",
        ];
        for input in inputs {
            let once = sanitize(input).unwrap();
            assert_eq!(sanitize(&once).unwrap(), once, "input: {}", input);
        }
    }

    #[test]
    fn test_allowlist_closure() {
        let config = AllowlistConfig::default();
        let input = r#"<div id="x" align="left"><svg><a xlink:href="x" href="/ok" rel="n">l</a></svg><img src="/i.png" alt="a"></div>"#;
        let output = sanitize(input).unwrap();
        let fragment = parse_fragment(&output, config.max_depth()).unwrap();

        fn check(nodes: &[Node], config: &AllowlistConfig) {
            for node in nodes {
                match node {
                    Node::Element(element) => {
                        assert!(config.allows_element(&element.name), "{}", element.name);
                        for (attr, _) in &element.attributes {
                            assert!(config.allows_attribute(&element.name, attr), "{}[{}]", element.name, attr);
                        }
                        check(&element.children, config);
                    }
                    Node::Comment(_) => panic!("comment survived"),
                    Node::Text(_) => {}
                }
            }
        }
        check(&fragment, &config);
        assert_eq!(output, r#"<div align="left"><a href="/ok">l</a><img src="/i.png"></div>"#);
    }

    #[test]
    fn test_size_bound() {
        let config = AllowlistConfig::builder().max_input_chars(5).build().unwrap();
        assert_eq!(sanitize_with("<b>абвгд</b>", &config).unwrap(), "<b>аб</b>");
        assert_eq!(sanitize_with("абвгдеж", &config).unwrap(), "абвгд");
    }

    #[test]
    fn test_depth_ceiling() {
        let config = AllowlistConfig::builder().max_depth(8).build().unwrap();
        let deep = "<b>".repeat(9);
        assert!(matches!(sanitize_with(&deep, &config), Err(SanitizeError::MalformedInput(_))));
        assert!(sanitize_with(&"<b>".repeat(8), &config).is_ok());
    }

    #[test]
    fn test_custom_transformer_pipeline() {
        #[derive(Debug)]
        struct DropEmphasis;

        impl Transformer for DropEmphasis {
            fn name(&self) -> &'static str {
                "drop_emphasis"
            }

            fn transform(&self, element: &mut Element) -> TransformOutcome {
                if element.name == "em" {
                    TransformOutcome::UnwrappedToChildren
                } else {
                    TransformOutcome::Unchanged
                }
            }
        }

        let sanitizer = Sanitizer::with_transformers(AllowlistConfig::default(), vec![Box::new(DropEmphasis)]);
        assert_eq!(sanitizer.sanitize("<p><em>soft</em> <b>hard</b></p>").unwrap(), "<p>soft <b>hard</b></p>");
    }
}
