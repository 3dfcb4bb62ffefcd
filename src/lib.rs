//! Page Translator - 页面翻译流水线库
//!
//! 这个库提供了视图渲染、HTML片段提取、译文缓存、远程翻译和译文回填等核心功能。

#[macro_use]
pub mod error;

pub mod api_constants;
pub mod cache;
pub mod config;
pub mod html_processor;
pub mod language;
pub mod pipeline;
pub mod render;
pub mod retry;
pub mod stats;
pub mod translator;
pub mod utils;

pub use cache::{CacheKey, CacheStats, TranslationCache};
pub use config::{Cli, PageTranslationConfig};
pub use error::{Result, TranslationError};
pub use html_processor::{Fragment, FragmentExtractor, FragmentSet, Selector, SubstitutionMode};
pub use language::{LanguageCode, LanguagePair, SupportedLanguages};
pub use pipeline::{PageOutcome, PageTranslationPipeline};
pub use render::{FileViewRenderer, ViewRenderer};
pub use translator::{DeepLClient, TranslationClient};
