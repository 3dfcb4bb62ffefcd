//! 配置管理模块
//!
//! 提供CLI参数解析和页面翻译配置管理功能

// 标准库导入
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// 第三方crate导入
use clap::Parser;

// 本地模块导入
use crate::api_constants::{self, api_config, page_config, service_config};
use crate::error::Result;
use crate::html_processor::Selector;
pub use crate::html_processor::SubstitutionMode;
use crate::language::SupportedLanguages;
use crate::retry::RetryConfig;

/// 页面翻译配置
///
/// 支持Builder模式进行链式配置。API密钥只在启动时从环境或参数加载一次。
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use page_translator::config::PageTranslationConfig;
///
/// let config = PageTranslationConfig::new()
///     .with_api_key("secret:fx")
///     .with_cache_ttl(Duration::from_secs(300))
///     .with_max_retries(0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct PageTranslationConfig {
    /// 源语言与可翻译的目标语言
    languages: SupportedLanguages,
    /// 翻译API服务地址
    api_url: String,
    /// 翻译API密钥
    api_key: Option<String>,
    /// 缓存有效期
    cache_ttl: Duration,
    /// 单次远程调用超时
    request_timeout: Duration,
    /// 远程调用失败后的最大重试次数
    max_retries: usize,
    /// 是否启用缓存
    enable_cache: bool,
    /// 提取片段的选择器，顺序即片段顺序
    selectors: Vec<Selector>,
    /// 译文回填方式
    substitution: SubstitutionMode,
}

impl PageTranslationConfig {
    /// 创建新的配置实例
    ///
    /// 默认值：
    /// - 源语言 `en`，目标语言 `fr`
    /// - API地址: DeepL 免费版
    /// - 缓存有效期: 10分钟
    /// - 请求超时: 30秒
    /// - 最大重试次数: 3
    /// - 选择器: title, ul, h1, p, footer
    pub fn new() -> Self {
        Self {
            languages: SupportedLanguages::default(),
            api_url: api_config::DEFAULT_API_URL.to_string(),
            api_key: None,
            cache_ttl: Duration::from_secs(service_config::CACHE_TTL_SECONDS),
            request_timeout: Duration::from_secs(service_config::REQUEST_TIMEOUT_SECONDS),
            max_retries: service_config::DEFAULT_MAX_RETRIES,
            enable_cache: true,
            selectors: Selector::defaults(),
            substitution: SubstitutionMode::default(),
        }
    }

    /// 从环境变量加载密钥和API地址（会先读取 `.env`）
    ///
    /// 未设置API地址时按密钥类型选择免费版或专业版地址。
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::new();
        if let Ok(key) = std::env::var(api_config::API_KEY_ENV) {
            config.api_url = api_constants::api_url_for_key(&key).to_string();
            config.api_key = Some(key);
        }
        if let Ok(url) = std::env::var(api_config::API_URL_ENV) {
            config.api_url = url;
        }
        config
    }

    pub fn languages(&self) -> &SupportedLanguages {
        &self.languages
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.enable_cache
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn substitution(&self) -> SubstitutionMode {
        self.substitution
    }

    /// 远程调用的重试配置
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_retries(self.max_retries)
    }

    pub fn with_languages(mut self, languages: SupportedLanguages) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.to_string();
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn enable_cache(mut self, enable: bool) -> Self {
        self.enable_cache = enable;
        self
    }

    pub fn with_selectors(mut self, selectors: Vec<Selector>) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn with_substitution(mut self, mode: SubstitutionMode) -> Self {
        self.substitution = mode;
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if !api_constants::is_valid_api_url(&self.api_url) {
            return Err(translation_error!(
                config,
                "api_url",
                format!("无效的API地址: {}", self.api_url)
            ));
        }

        if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(translation_error!(
                config,
                "api_key",
                format!("未设置API密钥，请设置环境变量 {}", api_config::API_KEY_ENV)
            ));
        }

        if self.selectors.is_empty() {
            return Err(translation_error!(config, "selectors", "至少需要一个选择器"));
        }

        if self.cache_ttl.is_zero() && self.enable_cache {
            return Err(translation_error!(config, "cache_ttl", "缓存有效期必须大于0"));
        }

        if self.cache_ttl > Duration::from_secs(service_config::MAX_CACHE_TTL_SECONDS) {
            return Err(translation_error!(
                config,
                "cache_ttl",
                format!(
                    "缓存有效期不能超过 {} 秒",
                    service_config::MAX_CACHE_TTL_SECONDS
                )
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(translation_error!(config, "request_timeout", "请求超时必须大于0"));
        }

        Ok(())
    }
}

impl Default for PageTranslationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PageTranslationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTranslationConfig")
            .field("languages", &self.languages)
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "****"))
            .field("cache_ttl", &self.cache_ttl)
            .field("request_timeout", &self.request_timeout)
            .field("max_retries", &self.max_retries)
            .field("enable_cache", &self.enable_cache)
            .field("selectors", &self.selectors)
            .field("substitution", &self.substitution)
            .finish()
    }
}

/// CLI参数结构
#[derive(Parser, Debug)]
#[command(author, version, about = "页面翻译CLI工具 - 渲染视图、翻译文本片段并缓存结果", long_about = None)]
pub struct Cli {
    /// 要渲染的视图 (可用逗号分隔多个)
    #[arg(short = 'p', long = "view", value_delimiter = ',', default_value = page_config::DEFAULT_VIEW)]
    pub views: Vec<String>,

    /// 请求的语言或文化名 (如: fr, fr-FR；可用逗号分隔多个)
    #[arg(short, long = "lang", value_delimiter = ',', default_value = "fr-FR")]
    pub langs: Vec<String>,

    /// 视图模板目录
    #[arg(long, default_value = page_config::DEFAULT_VIEWS_DIR)]
    pub views_dir: PathBuf,

    /// 输出目录 (文件名为 视图_语言.html)
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// 直接输出到标准输出，不写文件
    #[arg(long)]
    pub stdout: bool,

    /// 翻译API地址
    #[arg(short, long, env = "DEEPL_API_URL")]
    pub api: Option<String>,

    /// 翻译API密钥
    #[arg(long, env = "DEEPL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// 源语言
    #[arg(long, default_value = service_config::DEFAULT_SOURCE_LANG)]
    pub source_lang: String,

    /// 支持的目标语言 (逗号分隔)
    #[arg(long, value_delimiter = ',', default_value = "fr")]
    pub targets: Vec<String>,

    /// 提取的元素 (逗号分隔，顺序即片段顺序)
    #[arg(long, value_delimiter = ',', default_value = "title,ul,h1,p,footer")]
    pub selectors: Vec<String>,

    /// 缓存有效期（秒）
    #[arg(long, default_value = "600")]
    pub cache_ttl: u64,

    /// 翻译请求超时（秒）
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// 最大重试次数
    #[arg(long, default_value = "3")]
    pub max_retries: usize,

    /// 禁用缓存
    #[arg(long)]
    pub no_cache: bool,

    /// 译文回填方式
    #[arg(long, value_enum, default_value_t = SubstitutionMode::Positional)]
    pub substitution: SubstitutionMode,

    /// 列出可用视图后退出
    #[arg(long)]
    pub list_views: bool,

    /// 详细输出模式
    #[arg(short, long)]
    pub verbose: bool,

    /// 静默模式 (仅输出错误)
    #[arg(short, long)]
    pub quiet: bool,

    /// 显示性能统计
    #[arg(long)]
    pub stats: bool,
}

impl Cli {
    /// 根据命令行参数构建翻译配置
    ///
    /// 命令行参数优先；未给出时使用环境变量和 `.env`。
    pub fn to_config(&self) -> Result<PageTranslationConfig> {
        let languages = SupportedLanguages::new(&self.source_lang, &self.targets)?;
        let selectors = Selector::parse_list(&self.selectors)?;

        let mut config = PageTranslationConfig::from_env()
            .with_languages(languages)
            .with_selectors(selectors)
            .with_cache_ttl(Duration::from_secs(self.cache_ttl))
            .with_request_timeout(Duration::from_secs(self.timeout))
            .with_max_retries(self.max_retries)
            .enable_cache(!self.no_cache)
            .with_substitution(self.substitution);

        if let Some(key) = &self.api_key {
            config = config
                .with_api_url(api_constants::api_url_for_key(key))
                .with_api_key(key);
        }
        if let Some(api) = &self.api {
            config = config.with_api_url(api);
        }

        Ok(config)
    }
}
