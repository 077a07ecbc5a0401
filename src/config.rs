//! 白名单配置：默认标签/属性表与调用方覆盖项合并，构建后只读

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SanResult, SanitizeError};

/// 输入字符上限（2^19 个字符）
/// 按俄文字符 2 字节估算约 1MB，仅用于保护解析器
pub const DEFAULT_MAX_INPUT_CHARS: usize = 1 << 19;

/// 默认嵌套深度上限
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// 内容整体丢弃的标签
pub const NO_CONTENT_TAGS: &[&str] = &["script", "style"];

/// 默认带属性的标签
const TAGS_WITH_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("p", &["align", "style"]),
    ("div", &["align", "style"]),
    ("span", &["align", "style"]),
    ("td", &["align", "width", "valign", "colspan", "rowspan", "style"]),
    ("th", &["align", "width", "valign", "colspan", "rowspan", "style"]),
    ("a", &["href", "target", "name", "style"]),
    ("table", &["cellpadding", "cellspacing", "width", "border", "align", "style"]),
    ("img", &["src", "width", "height", "style"]),
];

/// 默认不带属性的标签
const TAGS_WITHOUT_ATTRIBUTES: &[&str] = &[
    "b", "strong", "i", "em", "sup", "sub", "ul", "ol", "li", "blockquote",
    "br", "tr", "u", "caption", "thead", "s",
];

/// 允许出现在 style 中的 CSS 属性
const RELAXED_CSS_PROPERTIES: &[&str] = &[
    "align-content", "align-items", "align-self",
    "background-color",
    "border", "border-bottom", "border-bottom-color", "border-bottom-left-radius",
    "border-bottom-right-radius", "border-bottom-style", "border-bottom-width",
    "border-collapse", "border-color", "border-left", "border-left-color",
    "border-left-style", "border-left-width", "border-radius", "border-right",
    "border-right-color", "border-right-style", "border-right-width",
    "border-spacing", "border-style", "border-top", "border-top-color",
    "border-top-left-radius", "border-top-right-radius", "border-top-style",
    "border-top-width", "border-width",
    "bottom", "box-sizing", "caption-side", "clear", "color", "column-count",
    "column-gap", "column-width", "direction", "display", "empty-cells",
    "flex", "flex-basis", "flex-direction", "flex-flow", "flex-grow",
    "flex-shrink", "flex-wrap", "float",
    "font", "font-family", "font-size", "font-stretch", "font-style",
    "font-variant", "font-weight",
    "height", "justify-content", "left", "letter-spacing", "line-height",
    "list-style", "list-style-position", "list-style-type",
    "margin", "margin-bottom", "margin-left", "margin-right", "margin-top",
    "max-height", "max-width", "min-height", "min-width", "opacity", "order",
    "outline", "outline-color", "outline-offset", "outline-style", "outline-width",
    "overflow", "overflow-wrap", "overflow-x", "overflow-y",
    "padding", "padding-bottom", "padding-left", "padding-right", "padding-top",
    "position", "right", "table-layout",
    "text-align", "text-decoration", "text-decoration-color", "text-decoration-line",
    "text-decoration-style", "text-indent", "text-overflow", "text-shadow",
    "text-transform", "top", "vertical-align", "visibility", "white-space",
    "width", "word-break", "word-spacing", "word-wrap", "z-index",
];

/// 允许的链接协议
pub const DEFAULT_URL_SCHEMES: &[&str] = &["http", "https", "mailto", "ftp", "tel"];

/// 展开时需要补空白的块级元素（前缀, 后缀）
const WHITESPACE_ELEMENTS: &[(&str, &str, &str)] = &[
    ("address", " ", " "), ("article", " ", " "), ("aside", " ", " "),
    ("blockquote", " ", " "), ("br", " ", ""), ("dd", " ", " "),
    ("div", " ", " "), ("dl", " ", " "), ("dt", " ", " "),
    ("footer", " ", " "), ("h1", " ", " "), ("h2", " ", " "),
    ("h3", " ", " "), ("h4", " ", " "), ("h5", " ", " "),
    ("h6", " ", " "), ("header", " ", " "), ("hgroup", " ", " "),
    ("hr", " ", " "), ("li", " ", " "), ("nav", " ", " "),
    ("ol", " ", " "), ("p", " ", " "), ("pre", " ", " "),
    ("section", " ", " "), ("ul", " ", " "),
];

fn to_set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_tag_attributes() -> HashMap<String, HashSet<String>> {
    TAGS_WITH_ATTRIBUTES
        .iter()
        .map(|(tag, attrs)| (tag.to_string(), to_set(attrs)))
        .collect()
}

fn default_whitespace_elements() -> HashMap<String, (String, String)> {
    WHITESPACE_ELEMENTS
        .iter()
        .map(|(tag, before, after)| (tag.to_string(), (before.to_string(), after.to_string())))
        .collect()
}

/// 调用方覆盖项：标签 -> 允许的属性集合
/// JSON 形式：`{"iframe": ["src", "width", "height"]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowlistOverrides(pub BTreeMap<String, BTreeSet<String>>);

impl AllowlistOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 字符串加载（标签名与属性名统一转小写）
    pub fn from_json(json: &str) -> SanResult<Self> {
        let raw: Self = serde_json::from_str(json)?;
        Ok(raw.lowercased())
    }

    /// 添加（或整体替换）一个标签的属性集合
    pub fn insert<I, S>(&mut self, tag: &str, attrs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.insert(
            tag.to_ascii_lowercase(),
            attrs.into_iter().map(|attr| attr.into().to_ascii_lowercase()).collect(),
        );
    }

    /// 解析器产出的标签名和属性名都是小写，覆盖项必须与之一致
    /// 大小写不同的同名标签合并属性集合
    fn lowercased(self) -> Self {
        let mut out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (tag, attrs) in self.0 {
            out.entry(tag.to_ascii_lowercase())
                .or_default()
                .extend(attrs.into_iter().map(|attr| attr.to_ascii_lowercase()));
        }
        Self(out)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 生效的白名单配置（构建后只读，可跨线程共享）
#[derive(Debug, Clone)]
pub struct AllowlistConfig {
    attributes: HashMap<String, HashSet<String>>,
    attribute_free_tags: HashSet<String>,
    elements: HashSet<String>,
    css_properties: HashSet<String>,
    url_schemes: HashSet<String>,
    whitespace_elements: HashMap<String, (String, String)>,
    max_input_chars: usize,
    max_depth: usize,
}

impl Default for AllowlistConfig {
    fn default() -> Self {
        let attributes = default_tag_attributes();
        let attribute_free_tags = to_set(TAGS_WITHOUT_ATTRIBUTES);
        let elements = attributes.keys().cloned().chain(attribute_free_tags.iter().cloned()).collect();

        Self {
            attributes,
            attribute_free_tags,
            elements,
            css_properties: to_set(RELAXED_CSS_PROPERTIES),
            url_schemes: to_set(DEFAULT_URL_SCHEMES),
            whitespace_elements: default_whitespace_elements(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl AllowlistConfig {
    /// 默认表 + 覆盖项
    pub fn build(overrides: AllowlistOverrides) -> SanResult<Self> {
        AllowlistConfigBuilder::new().overrides(overrides).build()
    }

    /// 自定义配置
    pub fn builder() -> AllowlistConfigBuilder {
        AllowlistConfigBuilder::new()
    }

    /// 只允许若干无属性标签的预设（标签剥离器使用）
    pub(crate) fn attribute_free_only(tags: &[&str], whitespace_elements: bool) -> Self {
        let attribute_free_tags = to_set(tags);
        Self {
            attributes: HashMap::new(),
            elements: attribute_free_tags.clone(),
            attribute_free_tags,
            whitespace_elements: if whitespace_elements {
                default_whitespace_elements()
            } else {
                HashMap::new()
            },
            ..Self::default()
        }
    }

    /// 生效的元素集合 = 带属性标签 ∪ 无属性标签
    pub fn element_set(&self) -> &HashSet<String> {
        &self.elements
    }

    pub fn allows_element(&self, tag: &str) -> bool {
        self.elements.contains(tag)
    }

    /// 标签允许的属性；无属性标签返回 None
    pub fn allowed_attributes(&self, tag: &str) -> Option<&HashSet<String>> {
        self.attributes.get(tag)
    }

    pub fn allows_attribute(&self, tag: &str, attr: &str) -> bool {
        self.attributes.get(tag).is_some_and(|attrs| attrs.contains(attr))
    }

    pub fn attribute_free_tags(&self) -> &HashSet<String> {
        &self.attribute_free_tags
    }

    pub fn allows_css_property(&self, property: &str) -> bool {
        self.css_properties.contains(property)
    }

    pub fn url_schemes(&self) -> &HashSet<String> {
        &self.url_schemes
    }

    pub fn allows_url_scheme(&self, scheme: &str) -> bool {
        self.url_schemes.contains(scheme)
    }

    pub fn is_no_content_tag(&self, tag: &str) -> bool {
        NO_CONTENT_TAGS.contains(&tag)
    }

    /// 展开该标签时补充的（前缀, 后缀）
    pub fn whitespace_for(&self, tag: &str) -> Option<(&str, &str)> {
        self.whitespace_elements
            .get(tag)
            .map(|(before, after)| (before.as_str(), after.as_str()))
    }

    pub fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone)]
pub struct AllowlistConfigBuilder {
    base_attributes: HashMap<String, HashSet<String>>,
    attribute_free_tags: HashSet<String>,
    overrides: AllowlistOverrides,
    css_properties: HashSet<String>,
    url_schemes: HashSet<String>,
    whitespace_elements: HashMap<String, (String, String)>,
    max_input_chars: usize,
    max_depth: usize,
}

impl Default for AllowlistConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AllowlistConfigBuilder {
    pub fn new() -> Self {
        Self {
            base_attributes: default_tag_attributes(),
            attribute_free_tags: to_set(TAGS_WITHOUT_ATTRIBUTES),
            overrides: AllowlistOverrides::default(),
            css_properties: to_set(RELAXED_CSS_PROPERTIES),
            url_schemes: to_set(DEFAULT_URL_SCHEMES),
            whitespace_elements: default_whitespace_elements(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// 清空默认标签表（标签剥离器使用）
    pub fn without_default_tags(mut self) -> Self {
        self.base_attributes.clear();
        self.attribute_free_tags.clear();
        self
    }

    /// 覆盖单个标签的属性集合
    pub fn tag_attributes<I, S>(mut self, tag: &str, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.overrides.insert(tag, attrs);
        self
    }

    /// 合并一组覆盖项（同名标签以后者为准）
    pub fn overrides(mut self, overrides: AllowlistOverrides) -> Self {
        self.overrides.0.extend(overrides.lowercased().0);
        self
    }

    pub fn attribute_free_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_free_tags
            .extend(tags.into_iter().map(|tag| tag.into().to_ascii_lowercase()));
        self
    }

    pub fn css_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.css_properties = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn url_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_schemes = schemes.into_iter().map(Into::into).collect();
        self
    }

    /// 展开块级元素时是否补空白
    pub fn whitespace_elements(mut self, enabled: bool) -> Self {
        self.whitespace_elements = if enabled {
            default_whitespace_elements()
        } else {
            HashMap::new()
        };
        self
    }

    pub fn max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn build(self) -> SanResult<AllowlistConfig> {
        // 1. 校验覆盖项与无属性标签（直接构造的覆盖项也统一转小写）
        let overrides = self.overrides.lowercased();
        for (tag, attrs) in &overrides.0 {
            Self::validate_tag(tag)?;
            if let Some(attr) = attrs.iter().find(|attr| attr.starts_with("on")) {
                return Err(SanitizeError::ConfigError(format!(
                    "标签 {} 不允许开放事件属性 {}",
                    tag, attr
                )));
            }
        }
        for tag in &self.attribute_free_tags {
            Self::validate_tag(tag)?;
        }

        // 2. 右侧优先合并：覆盖项整体替换默认属性集合
        let mut attributes = self.base_attributes;
        for (tag, attrs) in overrides.0 {
            attributes.insert(tag, attrs.into_iter().collect());
        }

        // 3. 推导元素集合
        let elements: HashSet<String> = attributes
            .keys()
            .cloned()
            .chain(self.attribute_free_tags.iter().cloned())
            .collect();

        if self.max_depth == 0 {
            return Err(SanitizeError::ConfigError("嵌套深度上限必须大于0".to_string()));
        }

        debug!(
            "白名单配置构建完成：元素{}个、带属性标签{}个、CSS属性{}个",
            elements.len(),
            attributes.len(),
            self.css_properties.len()
        );

        Ok(AllowlistConfig {
            attributes,
            attribute_free_tags: self.attribute_free_tags,
            elements,
            css_properties: self.css_properties,
            url_schemes: self.url_schemes,
            whitespace_elements: self.whitespace_elements,
            max_input_chars: self.max_input_chars,
            max_depth: self.max_depth,
        })
    }

    /// 标签名校验：非空、仅 ASCII 字母数字和 '-'、不能是内容丢弃标签
    fn validate_tag(tag: &str) -> SanResult<()> {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(SanitizeError::ConfigError(format!("无效标签名：{:?}", tag)));
        }
        if NO_CONTENT_TAGS.contains(&tag) {
            return Err(SanitizeError::ConfigError(format!(
                "标签 {} 的内容会被整体丢弃，不能加入白名单",
                tag
            )));
        }
        Ok(())
    }
}
