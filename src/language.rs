//! 语言代码与支持的语言对
//!
//! 请求通常带的是区域文化名（如 `fr-FR`），翻译服务只认基础语言代码（如 `fr`）。
//! 这里负责规范化并判断语言对是否在服务范围内。

// 标准库导入
use std::collections::BTreeSet;
use std::fmt;

// 本地模块导入
use crate::api_constants::service_config;
use crate::error::{Result, TranslationError};

/// 规范化后的语言代码（小写的 ISO 639-1 基础代码）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguageCode(String);

impl LanguageCode {
    /// 从语言代码或文化名创建，例如 `"fr-FR"` -> `fr`
    ///
    /// 空字符串或包含非法字符时返回配置错误。
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(TranslationError::Configuration {
                field: "language".to_string(),
                reason: "语言代码为空".to_string(),
            });
        }

        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TranslationError::Configuration {
                field: "language".to_string(),
                reason: format!("语言代码包含非法字符: {}", trimmed),
            });
        }

        Ok(Self(normalize_locale(trimmed)))
    }

    /// 获取语言代码
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 翻译服务使用的大写形式（`fr` -> `FR`）
    pub fn to_api_code(&self) -> String {
        self.0.to_uppercase()
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 去掉区域和脚本部分，只保留基础语言代码
///
/// `en-US` -> `en`，`zh_Hans` -> `zh`，`FR` -> `fr`
pub fn normalize_locale(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_lowercase()
}

/// 一次翻译请求的语言对
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguagePair {
    pub source: LanguageCode,
    pub target: LanguageCode,
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// 语言解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageResolution {
    /// 请求的就是源语言，页面原样返回
    Source(LanguageCode),
    /// 需要翻译
    Translate(LanguagePair),
}

/// 支持的语言集合：一个固定源语言加若干目标语言
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedLanguages {
    source: LanguageCode,
    targets: BTreeSet<LanguageCode>,
}

impl SupportedLanguages {
    /// 创建语言集合
    pub fn new<I, S>(source: &str, targets: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let source = LanguageCode::parse(source)?;
        let targets = targets
            .into_iter()
            .map(|t| LanguageCode::parse(t.as_ref()))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(Self { source, targets })
    }

    /// 源语言
    pub fn source(&self) -> &LanguageCode {
        &self.source
    }

    /// 目标语言（已排序）
    pub fn targets(&self) -> impl Iterator<Item = &LanguageCode> {
        self.targets.iter()
    }

    /// 检查语言对是否受支持
    pub fn supports(&self, pair: &LanguagePair) -> bool {
        pair.source == self.source && self.targets.contains(&pair.target)
    }

    /// 解析请求的语言或文化名
    ///
    /// 源语言返回 [`LanguageResolution::Source`]；不在目标集合中的语言返回
    /// `LanguageUnsupported`。
    pub fn resolve(&self, requested: &str) -> Result<LanguageResolution> {
        let target = LanguageCode::parse(requested).map_err(|_| {
            TranslationError::LanguageUnsupported {
                source_lang: self.source.to_string(),
                target_lang: requested.to_string(),
            }
        })?;

        if target == self.source {
            return Ok(LanguageResolution::Source(target));
        }

        if !self.targets.contains(&target) {
            return Err(TranslationError::LanguageUnsupported {
                source_lang: self.source.to_string(),
                target_lang: target.to_string(),
            });
        }

        Ok(LanguageResolution::Translate(LanguagePair {
            source: self.source.clone(),
            target,
        }))
    }
}

impl Default for SupportedLanguages {
    fn default() -> Self {
        Self {
            source: LanguageCode(service_config::DEFAULT_SOURCE_LANG.to_string()),
            targets: service_config::DEFAULT_TARGET_LANGS
                .iter()
                .map(|t| LanguageCode(t.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("en-US"), "en");
        assert_eq!(normalize_locale("fr-FR"), "fr");
        assert_eq!(normalize_locale("zh_Hans"), "zh");
        assert_eq!(normalize_locale("FR"), "fr");
    }

    #[test]
    fn test_language_code_rejects_invalid() {
        assert!(LanguageCode::parse("").is_err());
        assert!(LanguageCode::parse("fr@FR").is_err());
        assert_eq!(LanguageCode::parse(" fr-FR ").unwrap().as_str(), "fr");
    }

    #[test]
    fn test_api_code_is_uppercase() {
        assert_eq!(LanguageCode::parse("fr").unwrap().to_api_code(), "FR");
    }

    #[test]
    fn test_resolve_default_languages() {
        let langs = SupportedLanguages::default();

        match langs.resolve("fr-FR").unwrap() {
            LanguageResolution::Translate(pair) => {
                assert_eq!(pair.source.as_str(), "en");
                assert_eq!(pair.target.as_str(), "fr");
            }
            other => panic!("unexpected resolution: {:?}", other),
        }

        assert!(matches!(
            langs.resolve("en-US").unwrap(),
            LanguageResolution::Source(_)
        ));
    }

    #[test]
    fn test_resolve_rejects_unlisted_language() {
        let langs = SupportedLanguages::default();
        match langs.resolve("de-DE") {
            Err(TranslationError::LanguageUnsupported { target_lang, .. }) => {
                assert_eq!(target_lang, "de");
            }
            other => panic!("expected LanguageUnsupported, got {:?}", other),
        }
        assert!(langs.resolve("").is_err());
    }

    #[test]
    fn test_configurable_targets() {
        let langs = SupportedLanguages::new("en", ["fr", "de", "es-ES"]).unwrap();
        let targets: Vec<&str> = langs.targets().map(|t| t.as_str()).collect();
        assert_eq!(targets, vec!["de", "es", "fr"]);
        assert!(langs.resolve("de").is_ok());
    }
}
