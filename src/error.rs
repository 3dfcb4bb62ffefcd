//! 统一错误处理模块
//!
//! 提供页面翻译流水线的统一错误类型定义和处理机制

// 第三方crate导入
use thiserror::Error;

/// 页面翻译统一错误类型
///
/// 流水线中任何一步失败都以该类型返回给调用方，不会被吞掉或降级为未翻译页面。
/// 需要实现 `Clone`，因为同一缓存键的并发请求会共享同一次远程调用的结果。
#[derive(Debug, Clone, Error)]
pub enum TranslationError {
    /// 选择器在文档中没有匹配的元素
    #[error("未找到元素 [{selector}]: 页面中没有匹配的元素")]
    ElementNotFound {
        /// 未匹配的选择器
        selector: String,
    },

    /// 翻译服务不可达（网络、超时、服务端错误）
    #[error("翻译服务不可用: {message}")]
    RemoteUnavailable {
        /// 错误消息
        message: String,
        /// HTTP状态码（如果适用）
        status_code: Option<u16>,
    },

    /// 翻译服务拒绝请求（认证失败、配额耗尽）
    #[error("翻译服务拒绝请求 [{status_code}]: {message}")]
    RemoteRejected {
        /// API响应状态码
        status_code: u16,
        /// 错误消息
        message: String,
    },

    /// 不支持的语言对
    #[error("不支持的语言: {source_lang} -> {target_lang}")]
    LanguageUnsupported {
        /// 源语言
        source_lang: String,
        /// 目标语言
        target_lang: String,
    },

    /// 视图渲染失败
    #[error("视图 {view} 未找到: {reason}")]
    ViewNotFound {
        /// 视图名称
        view: String,
        /// 失败原因
        reason: String,
    },

    /// 译文无法回填到页面
    #[error("译文回填失败 [{selector}]: {reason}")]
    SubstitutionFailed {
        /// 无法回填的片段对应的选择器
        selector: String,
        /// 失败原因
        reason: String,
    },

    /// HTML解析或序列化失败
    #[error("HTML解析失败: {details}")]
    HtmlParse {
        /// 具体错误信息
        details: String,
    },

    /// 配置相关错误
    #[error("配置错误 [{field}]: {reason}")]
    Configuration {
        /// 配置项名称
        field: String,
        /// 错误原因
        reason: String,
    },
}

impl TranslationError {
    /// 检查错误是否可以重试
    ///
    /// 只有传输层面的失败值得重试，认证、配额和语言错误重试也不会成功。
    pub fn is_retryable(&self) -> bool {
        matches!(self, TranslationError::RemoteUnavailable { .. })
    }
}

/// 页面翻译结果类型别名
pub type Result<T> = std::result::Result<T, TranslationError>;

/// 便捷的错误创建宏
#[macro_export]
macro_rules! translation_error {
    (element_not_found, $selector:expr) => {
        $crate::error::TranslationError::ElementNotFound {
            selector: $selector.to_string(),
        }
    };
    (unavailable, $msg:expr) => {
        $crate::error::TranslationError::RemoteUnavailable {
            message: $msg.to_string(),
            status_code: None,
        }
    };
    (unavailable, $msg:expr, $code:expr) => {
        $crate::error::TranslationError::RemoteUnavailable {
            message: $msg.to_string(),
            status_code: Some($code),
        }
    };
    (rejected, $code:expr, $msg:expr) => {
        $crate::error::TranslationError::RemoteRejected {
            status_code: $code,
            message: $msg.to_string(),
        }
    };
    (unsupported, $source:expr, $target:expr) => {
        $crate::error::TranslationError::LanguageUnsupported {
            source_lang: $source.to_string(),
            target_lang: $target.to_string(),
        }
    };
    (view_not_found, $view:expr, $reason:expr) => {
        $crate::error::TranslationError::ViewNotFound {
            view: $view.to_string(),
            reason: $reason.to_string(),
        }
    };
    (substitution, $selector:expr, $reason:expr) => {
        $crate::error::TranslationError::SubstitutionFailed {
            selector: $selector.to_string(),
            reason: $reason.to_string(),
        }
    };
    (html_parse, $details:expr) => {
        $crate::error::TranslationError::HtmlParse {
            details: $details.to_string(),
        }
    };
    (config, $field:expr, $reason:expr) => {
        $crate::error::TranslationError::Configuration {
            field: $field.to_string(),
            reason: $reason.to_string(),
        }
    };
}

/// 从reqwest::Error转换为TranslationError
///
/// 走到这里的都是传输层错误（连接失败、超时、读取响应失败）。
impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        let status_code = error.status().map(|s| s.as_u16());
        TranslationError::RemoteUnavailable {
            message: error.to_string(),
            status_code,
        }
    }
}
