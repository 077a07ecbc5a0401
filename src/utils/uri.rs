//! URI工具：链接规范化、查询参数合并

use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::Regex;
use url::{ParseError, Url};

use crate::error::{SanResult, SanitizeError};

/// 相对引用的校验基址
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// 相对引用中需要转义的字符（非 ASCII 字符总会被转义）
const RELATIVE_REF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// 协议前缀：字母开头，后接字母数字或 + . -
static SCHEME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z][a-z0-9+.\-]*):").unwrap()
});

/// 规范化链接
///
/// - 绝对地址：按 WHATWG 规则序列化（IDN 主机转 punycode、转义规范化）
/// - `//host/...`：同上，输出时去掉补上的协议
/// - 相对引用：校验可解析后仅转义非法字符
pub fn normalize_uri(value: &str) -> SanResult<String> {
    // 与浏览器一致：只去掉首尾的 C0 控制字符和空格
    let trimmed = value.trim_matches(|c: char| c <= ' ');

    if trimmed.starts_with("//") {
        let url = Url::parse(&format!("http:{}", trimmed)).map_err(|e| invalid_uri(value, e))?;
        return Ok(url.as_str()["http:".len()..].to_string());
    }

    match Url::parse(trimmed) {
        Ok(url) => Ok(url.to_string()),
        Err(ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(RELATIVE_BASE)?;
            base.join(trimmed).map_err(|e| invalid_uri(value, e))?;
            Ok(utf8_percent_encode(trimmed, RELATIVE_REF).to_string())
        }
        Err(e) => Err(invalid_uri(value, e)),
    }
}

fn invalid_uri(value: &str, err: ParseError) -> SanitizeError {
    SanitizeError::InvalidUri(format!("{}（{}）", value, err))
}

/// 提取链接协议（小写）；相对引用返回 None
/// 浏览器会忽略其中的空白和控制字符，这里同样先剔除
pub fn uri_scheme(value: &str) -> Option<String> {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect::<String>()
        .to_ascii_lowercase();

    SCHEME_RE
        .captures(&compact)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// 向 URL 合并查询参数
///
/// 没有协议时按 `http://` 补全；同名参数被替换，参数按名称排序；
/// 无法解析时返回 None
pub fn add_params_to_url<K, V>(url: &str, params: &[(K, V)]) -> Option<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut uri = match Url::parse(url) {
        Ok(uri) => uri,
        Err(ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("http://{}", url)).ok()?,
        Err(_) => return None,
    };

    if !params.is_empty() {
        let mut pairs: Vec<(String, String)> = uri
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            match pairs.iter_mut().find(|(existing, _)| existing.as_str() == key) {
                Some((_, existing)) => *existing = value.to_string(),
                None => pairs.push((key.to_string(), value.to_string())),
            }
        }
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        uri.query_pairs_mut().clear().extend_pairs(pairs);
    }

    Some(uri.to_string())
}
