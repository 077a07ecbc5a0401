//! HTML片段构建器
//! 基于 html5ever 分词器，把任意（可能残缺的）标记构建成节点树：
//! 自动补全未闭合标签、忽略多余的结束标签、限制嵌套深度

use std::cell::RefCell;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts
};
use markup5ever::interface::Attribute;
use tendril::StrTendril;
use tracing::warn;

use super::node::{Element, Fragment, Node};
use crate::error::{SanResult, SanitizeError};

/// 空元素：没有结束标签，也不会包含子节点
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "param", "source", "track", "wbr",
];

/// 开始标签会隐式关闭当前 <p> 的块级元素
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "details", "dialog",
    "dir", "div", "dl", "fieldset", "figcaption", "figure", "footer", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "main",
    "menu", "nav", "ol", "p", "pre", "section", "table", "ul",
];

/// 查找待关闭元素时不越过的作用域边界
const SCOPE_BOUNDARIES: &[&str] = &[
    "applet", "button", "caption", "marquee", "object", "table", "td", "th", "template",
];

const LIST_BOUNDARIES: &[&str] = &["ol", "ul"];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// 构建状态：打开元素栈 + 已完成的顶层节点
#[derive(Debug, Default)]
struct BuildState {
    root: Vec<Node>,
    open: Vec<Element>,
    depth_exceeded: bool,
}

impl BuildState {
    /// 追加节点到当前插入点
    fn append(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    /// 追加文本，相邻文本节点合并
    fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let siblings = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.root,
        };
        if let Some(Node::Text(last)) = siblings.last_mut() {
            last.push_str(text);
        } else {
            siblings.push(Node::Text(text.to_string()));
        }
    }

    /// 关闭栈中位于 index 及其之后的所有元素
    fn close_from(&mut self, index: usize) {
        while self.open.len() > index {
            if let Some(element) = self.open.pop() {
                self.append(Node::Element(element));
            }
        }
    }

    /// 自栈顶向下查找 targets 中的元素，遇到边界即停止
    fn find_open(&self, targets: &[&str], boundaries: &[&str]) -> Option<usize> {
        for (index, element) in self.open.iter().enumerate().rev() {
            let name = element.name.as_str();
            if targets.contains(&name) {
                return Some(index);
            }
            if boundaries.contains(&name) {
                return None;
            }
        }
        None
    }

    /// 新开始标签引起的隐式关闭
    fn close_implied(&mut self, name: &str) {
        if CLOSES_PARAGRAPH.contains(&name) {
            if let Some(index) = self.find_open(&["p"], SCOPE_BOUNDARIES) {
                self.close_from(index);
            }
        }

        let implied = match name {
            "li" => Some((&["li"][..], LIST_BOUNDARIES)),
            "dd" | "dt" => Some((&["dd", "dt"][..], &["dl"][..])),
            "td" | "th" => Some((&["td", "th"][..], &["table", "tr"][..])),
            "tr" => Some((&["tr"][..], &["table", "thead", "tbody", "tfoot"][..])),
            "option" => Some((&["option"][..], &["select", "datalist"][..])),
            _ => None,
        };

        if let Some((targets, boundaries)) = implied {
            if let Some(index) = self.find_open(targets, boundaries) {
                self.close_from(index);
            }
        }
    }

    fn finish(mut self) -> Fragment {
        self.close_from(0);
        self.root
    }
}

/// 片段构建器（分词器的 TokenSink）
#[derive(Debug)]
pub struct FragmentBuilder {
    state: RefCell<BuildState>,
    max_depth: usize,
}

impl TokenSink for FragmentBuilder {
    type Handle = ();

    fn process_token(&self, token: Token, _line: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => return self.start_tag(tag),
                TagKind::EndTag => self.end_tag(tag),
            },
            Token::CharacterTokens(text) => self.state.borrow_mut().append_text(&text),
            Token::CommentToken(comment) => {
                self.state.borrow_mut().append(Node::Comment(comment.to_string()))
            }
            // doctype / NUL / EOF / 解析告警均不进入节点树
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

impl FragmentBuilder {
    /// 创建新的构建器
    pub fn new(max_depth: usize) -> Self {
        Self {
            state: RefCell::new(BuildState::default()),
            max_depth,
        }
    }

    /// 从HTML字符串构建片段
    pub fn build(self, html: &str) -> SanResult<Fragment> {
        let tokenizer = Tokenizer::new(self, TokenizerOpts::default());
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from(html));

        let _ = tokenizer.feed(&queue);
        if !queue.is_empty() {
            warn!("分词结束后输入缓冲区仍有残留");
        }
        tokenizer.end();

        tokenizer.sink.into_fragment()
    }

    fn into_fragment(self) -> SanResult<Fragment> {
        let max_depth = self.max_depth;
        let state = self.state.into_inner();
        if state.depth_exceeded {
            return Err(SanitizeError::MalformedInput(format!(
                "元素嵌套超过{}层",
                max_depth
            )));
        }
        Ok(state.finish())
    }

    /// 处理开始标签
    fn start_tag(&self, tag: Tag) -> TokenSinkResult<()> {
        let Tag { name, attrs, .. } = tag;
        let name = name.as_ref().to_ascii_lowercase();
        let mut state = self.state.borrow_mut();

        state.close_implied(&name);

        let element = Element {
            attributes: Self::convert_attributes(attrs),
            children: Vec::new(),
            name,
        };

        if is_void_element(&element.name) {
            state.append(Node::Element(element));
            return TokenSinkResult::Continue;
        }

        // 超过深度上限后不再加深，元素按叶子处理，最终整体报错
        if state.open.len() >= self.max_depth {
            state.depth_exceeded = true;
            state.append(Node::Element(element));
            return TokenSinkResult::Continue;
        }

        let raw_kind = match element.name.as_str() {
            "script" => Some(RawKind::ScriptData),
            "style" => Some(RawKind::Rawtext),
            _ => None,
        };
        state.open.push(element);

        match raw_kind {
            Some(kind) => TokenSinkResult::RawData(kind),
            None => TokenSinkResult::Continue,
        }
    }

    /// 处理结束标签
    fn end_tag(&self, tag: Tag) {
        let name = tag.name.as_ref().to_ascii_lowercase();
        let mut state = self.state.borrow_mut();

        // 浏览器把 </br> 当作 <br>
        if name == "br" {
            state.append(Node::Element(Element::new("br")));
            return;
        }

        // 没有匹配的打开元素时直接忽略
        if let Some(index) = state.open.iter().rposition(|element| element.name == name) {
            state.close_from(index);
        }
    }

    /// 转换属性，同名属性保留第一次出现的值
    fn convert_attributes(attrs: Vec<Attribute>) -> Vec<(String, String)> {
        let mut attributes: Vec<(String, String)> = Vec::with_capacity(attrs.len());
        for attr in attrs {
            let key = attr.name.local.as_ref().to_ascii_lowercase();
            if attributes.iter().any(|(existing, _)| *existing == key) {
                continue;
            }
            attributes.push((key, attr.value.to_string()));
        }
        attributes
    }
}

/// 解析HTML片段
pub fn parse_fragment(html: &str, max_depth: usize) -> SanResult<Fragment> {
    FragmentBuilder::new(max_depth).build(html)
}
