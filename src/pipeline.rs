//! 页面翻译流水线
//!
//! 渲染 → 提取 → 计算缓存键 → 查缓存 → (未命中时远程翻译并写缓存) → 回填。
//! 任一步失败整个请求失败，不返回部分翻译的页面。

// 标准库导入
use std::sync::Arc;
use std::time::{Duration, Instant};

// 第三方crate导入
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info};

// 本地模块导入
use crate::cache::{CacheKey, CacheStats, TranslationCache};
use crate::config::PageTranslationConfig;
use crate::error::{Result, TranslationError};
use crate::html_processor::{substitute_fragments, FragmentExtractor, SubstitutionMode};
use crate::language::{LanguageCode, LanguagePair, LanguageResolution, SupportedLanguages};
use crate::render::ViewRenderer;
use crate::retry::{with_retry_if, RetryConfig};
use crate::stats::{CacheStatus, PipelineStats};
use crate::translator::{DeepLClient, TranslationClient};

/// 进行中的远程翻译，所有等待者共享同一个结果
type SharedTranslation = Shared<BoxFuture<'static, Result<Arc<Vec<String>>>>>;

/// 一次页面翻译的结果
#[derive(Debug, Clone)]
pub struct PageOutcome {
    /// 回填后的页面（源语言时为原始渲染结果）
    pub html: String,
    /// 页面的语言
    pub language: LanguageCode,
    pub stats: PipelineStats,
}

/// 页面翻译流水线
///
/// 可在多个任务间共享（`&self` 调用）。缓存是唯一的共享可变状态。
pub struct PageTranslationPipeline {
    renderer: Arc<dyn ViewRenderer>,
    client: Arc<dyn TranslationClient>,
    cache: Arc<TranslationCache>,
    extractor: FragmentExtractor,
    languages: SupportedLanguages,
    cache_ttl: Duration,
    request_timeout: Duration,
    retry: RetryConfig,
    enable_cache: bool,
    substitution: SubstitutionMode,
    in_flight: Arc<DashMap<CacheKey, SharedTranslation>>,
}

impl PageTranslationPipeline {
    /// 用给定的渲染器和翻译客户端创建流水线
    pub fn new(
        config: &PageTranslationConfig,
        renderer: Arc<dyn ViewRenderer>,
        client: Arc<dyn TranslationClient>,
    ) -> Self {
        Self {
            renderer,
            client,
            cache: Arc::new(TranslationCache::new()),
            extractor: FragmentExtractor::new(config.selectors().to_vec()),
            languages: config.languages().clone(),
            cache_ttl: config.cache_ttl(),
            request_timeout: config.request_timeout(),
            retry: config.retry_config(),
            enable_cache: config.is_cache_enabled(),
            substitution: config.substitution(),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// 校验配置并创建使用 DeepL 的流水线
    pub fn with_deepl(config: &PageTranslationConfig, renderer: Arc<dyn ViewRenderer>) -> Result<Self> {
        config.validate()?;

        let api_key = config.api_key().unwrap_or_default();
        let client = DeepLClient::new(config.api_url(), api_key, config.request_timeout())?
            .with_served_languages(config.languages().clone());

        info!("🔧 翻译服务: DeepL ({})", config.api_url());
        Ok(Self::new(config, renderer, Arc::new(client)))
    }

    /// 与其它流水线共享同一个缓存
    pub fn with_cache(mut self, cache: Arc<TranslationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn languages(&self) -> &SupportedLanguages {
        &self.languages
    }

    /// 渲染视图并翻译为请求的语言
    ///
    /// `requested_lang` 可以是语言代码或文化名（如 `fr-FR`）。不支持的语言在渲染前即被拒绝。
    pub async fn translate_page(&self, view: &str, requested_lang: &str) -> Result<PageOutcome> {
        let resolution = self.languages.resolve(requested_lang)?;
        debug!("[Start] 视图 {}，请求语言 {}", view, requested_lang);

        let render_start = Instant::now();
        let markup = self.renderer.render(view).await?;
        let mut stats = PipelineStats::new(view, requested_lang);
        stats.render_time = render_start.elapsed();
        stats.input_size = markup.len();
        debug!("[Rendered] {} 字节", markup.len());

        let pair = match resolution {
            LanguageResolution::Source(language) => {
                info!("📄 {} 请求的是源语言 {}，返回原始页面", view, language);
                stats.output_size = markup.len();
                return Ok(PageOutcome {
                    html: markup,
                    language,
                    stats,
                });
            }
            LanguageResolution::Translate(pair) => pair,
        };
        stats.language = pair.target.to_string();

        let extract_start = Instant::now();
        let fragments = self.extractor.extract(&markup)?;
        stats.extract_time = extract_start.elapsed();
        stats.fragments = fragments.len();
        debug!("[Extracted] {} 个片段", fragments.len());

        let texts = fragments.texts();
        let key = CacheKey::compute(&texts, &pair);
        debug!("[KeyComputed] {}", key);

        let translate_start = Instant::now();
        let (translations, cache_status) = self.lookup_or_translate(key, texts, &pair).await?;
        stats.translate_time = translate_start.elapsed();
        stats.cache_status = cache_status;

        let substitute_start = Instant::now();
        let substitution =
            substitute_fragments(&markup, &fragments, &translations, self.substitution)?;
        stats.substitute_time = substitute_start.elapsed();
        stats.substitution = Some(substitution.mode);
        stats.output_size = substitution.html.len();
        debug!(
            "[Substituted] 方式 {}，替换 {} 处",
            substitution.mode, substitution.applied
        );

        info!(
            "✅ {} 已翻译为 {} ({} 个片段，缓存{})",
            view, pair.target, stats.fragments, cache_status
        );

        Ok(PageOutcome {
            html: substitution.html,
            language: pair.target,
            stats,
        })
    }

    /// 查缓存，未命中时发起（或加入进行中的）远程翻译
    async fn lookup_or_translate(
        &self,
        key: CacheKey,
        texts: Vec<String>,
        pair: &LanguagePair,
    ) -> Result<(Arc<Vec<String>>, CacheStatus)> {
        if self.enable_cache {
            if let Some(cached) = self.cache.get(&key) {
                debug!("[CacheHit] {}", key);
                return Ok((cached, CacheStatus::Hit));
            }
            debug!("[CacheMiss] {}", key);
        }

        // 分片锁只在这个块内持有，等待远程结果时不持有任何锁
        let (pending, leader) = match self.in_flight.entry(key) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let pending = self.remote_translation(key, texts, pair.clone());
                entry.insert(pending.clone());
                (pending, true)
            }
        };

        if !leader {
            debug!("相同请求正在翻译，等待共享结果: {}", key);
        }

        let translations = pending.await?;
        debug!("[Translated] {} 个译文", translations.len());

        let status = match (self.enable_cache, leader) {
            (false, _) => CacheStatus::Disabled,
            (true, true) => CacheStatus::Miss,
            (true, false) => CacheStatus::Coalesced,
        };
        Ok((translations, status))
    }

    /// 构造一次远程翻译
    ///
    /// 完成时先写缓存再移出进行中表，之后的相同请求要么命中缓存要么加入本次调用。
    fn remote_translation(
        &self,
        key: CacheKey,
        texts: Vec<String>,
        pair: LanguagePair,
    ) -> SharedTranslation {
        let client = Arc::clone(&self.client);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let retry = self.retry.clone();
        let timeout = self.request_timeout;
        let ttl = self.cache_ttl;
        let store = self.enable_cache;

        async move {
            let result = call_remote(client.as_ref(), &texts, &pair, timeout, &retry)
                .await
                .and_then(|translated| {
                    if translated.len() != texts.len() {
                        return Err(translation_error!(
                            unavailable,
                            format!(
                                "译文数量与片段数量不一致: 期望 {}，实际 {}",
                                texts.len(),
                                translated.len()
                            )
                        ));
                    }
                    Ok(Arc::new(translated))
                });

            if let Ok(translations) = &result {
                if store {
                    cache.put(key, Arc::clone(translations), ttl);
                    debug!("[Stored] {}", key);
                }
            }
            in_flight.remove(&key);

            result
        }
        .boxed()
        .shared()
    }
}

/// 调用翻译服务，单次调用受超时限制，可重试的错误按配置重试
async fn call_remote(
    client: &dyn TranslationClient,
    texts: &[String],
    pair: &LanguagePair,
    timeout: Duration,
    retry: &RetryConfig,
) -> Result<Vec<String>> {
    let operation = format!("{} 翻译 {}", client.provider_name(), pair);

    with_retry_if(
        retry,
        &operation,
        move || async move {
            match tokio::time::timeout(timeout, client.translate(texts, &pair.source, &pair.target))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(translation_error!(
                    unavailable,
                    format!("翻译请求超时 ({:?})", timeout)
                )),
            }
        },
        TranslationError::is_retryable,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 把每个片段转成大写的假翻译服务
    struct UppercaseClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranslationClient for UppercaseClient {
        async fn translate(
            &self,
            fragments: &[String],
            _source: &LanguageCode,
            _target: &LanguageCode,
        ) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(fragments.iter().map(|f| f.to_uppercase()).collect())
        }

        fn provider_name(&self) -> &str {
            "uppercase"
        }
    }

    fn pipeline(config: PageTranslationConfig) -> (PageTranslationPipeline, Arc<UppercaseClient>) {
        let client = Arc::new(UppercaseClient {
            calls: AtomicUsize::new(0),
        });
        let renderer = |_: &str| -> Result<String> {
            Ok("<title>Home</title><h1>Welcome</h1><p>Body</p><footer>Foot</footer><ul><li>a</li></ul>".to_string())
        };
        let pipeline = PageTranslationPipeline::new(&config, Arc::new(renderer), client.clone());
        (pipeline, client)
    }

    #[tokio::test]
    async fn test_translates_default_selectors() {
        let (pipeline, client) = pipeline(PageTranslationConfig::new());

        let outcome = pipeline.translate_page("Index", "fr-FR").await.unwrap();
        assert_eq!(
            outcome.html,
            "<title>HOME</title><h1>WELCOME</h1><p>BODY</p><footer>FOOT</footer><ul><LI>A</LI></ul>"
        );
        assert_eq!(outcome.language.as_str(), "fr");
        assert_eq!(outcome.stats.fragments, 5);
        assert_eq!(outcome.stats.cache_status, CacheStatus::Miss);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_calls_remote() {
        let (pipeline, client) = pipeline(PageTranslationConfig::new().enable_cache(false));

        let first = pipeline.translate_page("Index", "fr").await.unwrap();
        let second = pipeline.translate_page("Index", "fr").await.unwrap();

        assert_eq!(first.html, second.html);
        assert_eq!(second.stats.cache_status, CacheStatus::Disabled);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        assert!(pipeline.cache().is_empty());
    }

    #[tokio::test]
    async fn test_source_language_is_untranslated() {
        let (pipeline, client) = pipeline(PageTranslationConfig::new());

        let outcome = pipeline.translate_page("Index", "en-US").await.unwrap();
        assert!(outcome.html.contains("<title>Home</title>"));
        assert_eq!(outcome.stats.cache_status, CacheStatus::Untranslated);
        assert_eq!(outcome.stats.substitution, None);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_element_fails_whole_request() {
        let config = PageTranslationConfig::new()
            .with_selectors(crate::html_processor::Selector::parse_list(["title", "nav"]).unwrap());
        let (pipeline, client) = pipeline(config);

        let err = pipeline.translate_page("Index", "fr").await.unwrap_err();
        assert!(matches!(err, TranslationError::ElementNotFound { .. }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}
