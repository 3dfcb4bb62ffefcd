//! 翻译结果缓存
//!
//! 缓存键按内容寻址：相同的片段文本（按顺序）加相同的语言对得到相同的键，
//! 与是哪个页面、哪个请求产生的无关。条目在插入后经过固定时长绝对过期。

// 标准库导入
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// 第三方crate导入
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

// 本地模块导入
use crate::language::LanguagePair;

/// 内容寻址的缓存键（blake3 哈希）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// 根据片段文本和语言对计算缓存键
    ///
    /// 每个字段都带长度前缀，片段文本中出现任何分隔符都不会造成键冲突。
    pub fn compute<S: AsRef<str>>(fragments: &[S], pair: &LanguagePair) -> Self {
        let mut hasher = blake3::Hasher::new();

        update_field(&mut hasher, pair.source.as_str());
        update_field(&mut hasher, pair.target.as_str());
        hasher.update(&(fragments.len() as u64).to_le_bytes());
        for fragment in fragments {
            update_field(&mut hasher, fragment.as_ref());
        }

        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn update_field(hasher: &mut blake3::Hasher, field: &str) {
    hasher.update(&(field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// 缓存条目
#[derive(Debug, Clone)]
struct CacheEntry {
    translations: Arc<Vec<String>>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// 命中率，没有请求时为 0
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 翻译缓存
///
/// 基于分片并发哈希表，读写不同键互不阻塞；同一个键并发写入以最后一次为准。
#[derive(Debug, Default)]
pub struct TranslationCache {
    entries: DashMap<CacheKey, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 查找缓存，过期或不存在都视为未命中
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<String>>> {
        let now = Instant::now();

        let found = self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| Arc::clone(&entry.translations));

        match found {
            Some(translations) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(translations)
            }
            None => {
                // 读锁已释放；只删除仍然过期的条目，避免误删并发写入的新值
                if self
                    .entries
                    .remove_if(key, |_, entry| entry.is_expired(now))
                    .is_some()
                {
                    debug!("缓存条目 {} 已过期，已删除", key);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 写入缓存，条目在 `ttl` 后过期
    pub fn put(&self, key: CacheKey, translations: Arc<Vec<String>>, ttl: Duration) {
        let now = Instant::now();
        // 有效期过大时按最远时间处理，避免时间溢出
        let expires_at = now.checked_add(ttl).unwrap_or_else(|| far_future(now));
        let entry = CacheEntry {
            translations,
            expires_at,
        };
        self.entries.insert(key, entry);
    }

    /// 当前条目数（包括尚未清理的过期条目）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 清理所有过期条目，返回清理数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

/// 约三十年后，足以视为永不过期
fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86400 * 365 * 30)
}
