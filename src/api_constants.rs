/// 翻译API配置常量
///
/// 该文件定义了所有翻译服务相关的常量配置，方便统一管理和维护

/// 默认翻译API配置
pub mod api_config {
    /// 默认翻译API地址 (DeepL 免费版)
    pub const DEFAULT_API_URL: &str = "https://api-free.deepl.com/v2/translate";

    /// DeepL 专业版API地址
    pub const PRO_API_URL: &str = "https://api.deepl.com/v2/translate";

    /// API密钥环境变量名
    pub const API_KEY_ENV: &str = "DEEPL_API_KEY";

    /// API地址环境变量名
    pub const API_URL_ENV: &str = "DEEPL_API_URL";
}

/// 翻译服务配置
pub mod service_config {
    /// 默认源语言
    pub const DEFAULT_SOURCE_LANG: &str = "en";

    /// 默认支持的目标语言
    pub const DEFAULT_TARGET_LANGS: &[&str] = &["fr"];

    /// 默认最大重试次数
    pub const DEFAULT_MAX_RETRIES: usize = 3;

    /// 请求超时时间（秒）
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// 翻译缓存有效期（秒），插入后10分钟绝对过期
    pub const CACHE_TTL_SECONDS: u64 = 10 * 60;

    /// 缓存有效期上限（秒），30天
    pub const MAX_CACHE_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;
}

/// 页面处理配置
pub mod page_config {
    /// 默认提取的元素，顺序即片段顺序
    pub const DEFAULT_SELECTORS: &[&str] = &["title", "ul", "h1", "p", "footer"];

    /// 默认视图目录
    pub const DEFAULT_VIEWS_DIR: &str = "views";

    /// 默认视图
    pub const DEFAULT_VIEW: &str = "Index";

    /// 视图文件扩展名
    pub const VIEW_EXTENSION: &str = "html";

    /// 默认页面标题
    pub const DEFAULT_TITLE: &str = "Home Page";
}

/// 错误消息常量
pub mod error_messages {
    /// 不支持的语言错误
    pub const UNSUPPORTED_LANGUAGE: &str = "Unsupported language.";

    /// API认证错误
    pub const AUTH_ERROR: &str = "API认证失败，请检查API密钥";

    /// 配额耗尽错误
    pub const QUOTA_ERROR: &str = "翻译配额已用完";

    /// 请求过于频繁
    pub const RATE_LIMIT_ERROR: &str = "请求过于频繁，已被限流";
}

/// 验证API URL是否有效
pub fn is_valid_api_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some(),
        Err(_) => false,
    }
}

/// 根据密钥选择API地址
///
/// DeepL 免费版密钥以 `:fx` 结尾，需要走免费版域名。
pub fn api_url_for_key(api_key: &str) -> &'static str {
    if api_key.ends_with(":fx") {
        api_config::DEFAULT_API_URL
    } else {
        api_config::PRO_API_URL
    }
}
