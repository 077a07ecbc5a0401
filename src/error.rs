//! 全局错误类型定义

use thiserror::Error;
use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;
use url::ParseError as UrlParseError;

#[derive(Error, Debug)]
pub enum SanitizeError {
    // 链接相关错误（仅在链接规范化内部使用，不会透出 sanitize）
    #[error("URI解析失败：{0}")]
    InvalidUri(String),
    #[error("URL解析失败：{0}")]
    UrlError(#[from] UrlParseError),

    // 输入相关错误
    #[error("输入结构异常：{0}")]
    MalformedInput(String),

    // 配置相关错误
    #[error("白名单配置错误：{0}")]
    ConfigError(String),

    // 序列化/反序列化错误
    #[error("JSON解析失败：{0}")]
    JsonError(#[from] SerdeJsonError),

    // 基础错误
    #[error("IO操作失败：{0}")]
    IoError(#[from] IoError),
}

// 全局Result类型
pub type SanResult<T> = Result<T, SanitizeError>;
