//! 片段节点模型
//! 解析结果是一组无公共根节点的顶层节点，子节点顺序即文档顺序

/// 片段：有序的顶层节点序列
pub type Fragment = Vec<Node>;

/// 节点（封闭枚举，遍历时必须穷尽匹配）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// 元素节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// 小写标签名
    pub name: String,
    /// 属性列表（保持原始顺序，属性名唯一）
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// 读取属性值
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// 写入属性值：已存在则原位替换，否则追加到末尾
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// 删除属性，返回旧值
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// 只保留满足条件的属性
    pub fn retain_attrs<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.attributes.retain(|(key, value)| keep(key, value));
    }

    /// 拼接所有后代文本
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => collect_text(&element.children, out),
            Node::Comment(_) => {}
        }
    }
}

impl Node {
    pub fn text(content: impl Into<String>) -> Self {
        Node::Text(content.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }
}
