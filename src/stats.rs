//! 流水线统计
//!
//! 每次页面翻译产生一份 `PipelineStats`，CLI 在 `--stats` 时打印报告。

use std::fmt;
use std::time::Duration;

use crate::cache::CacheStats;
use crate::html_processor::SubstitutionMode;

/// 译文来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStatus {
    /// 请求的是源语言，没有翻译
    #[default]
    Untranslated,
    /// 缓存命中
    Hit,
    /// 缓存未命中，本请求发起了远程调用
    Miss,
    /// 缓存未命中，但与进行中的相同请求共享了远程调用结果
    Coalesced,
    /// 缓存已禁用
    Disabled,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CacheStatus::Untranslated => "未翻译",
            CacheStatus::Hit => "命中",
            CacheStatus::Miss => "未命中",
            CacheStatus::Coalesced => "合并请求",
            CacheStatus::Disabled => "已禁用",
        };
        f.write_str(label)
    }
}

/// 单次页面翻译的统计
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub view: String,
    pub language: String,
    pub render_time: Duration,
    pub extract_time: Duration,
    pub translate_time: Duration,
    pub substitute_time: Duration,
    pub input_size: usize,
    pub output_size: usize,
    pub fragments: usize,
    pub cache_status: CacheStatus,
    /// 实际使用的回填方式，未翻译时为 `None`
    pub substitution: Option<SubstitutionMode>,
}

impl PipelineStats {
    pub fn new(view: &str, language: &str) -> Self {
        Self {
            view: view.to_string(),
            language: language.to_string(),
            ..Self::default()
        }
    }

    /// 各阶段耗时之和
    pub fn total_time(&self) -> Duration {
        self.render_time + self.extract_time + self.translate_time + self.substitute_time
    }
}

/// 打印性能统计
pub fn print_performance_stats(pages: &[PipelineStats], cache: &CacheStats, total_duration: Duration) {
    println!("\n📊 性能统计报告:");
    println!("═══════════════════════════════════════");

    for stats in pages {
        println!("📄 {} ({})", stats.view, stats.language);
        println!("   渲染: {}", format_duration(stats.render_time));
        println!("   提取: {}", format_duration(stats.extract_time));
        println!("   翻译: {}", format_duration(stats.translate_time));
        println!("   回填: {}", format_duration(stats.substitute_time));
        println!(
            "   大小: {} -> {} 字节",
            stats.input_size, stats.output_size
        );
        println!("   片段: {} 个", stats.fragments);
        println!("   缓存: {}", stats.cache_status);
        if let Some(mode) = stats.substitution {
            println!("   回填方式: {}", mode);
        }
    }

    if cache.hits + cache.misses > 0 {
        println!("\n💾 缓存统计:");
        println!("   缓存命中: {} 次", cache.hits);
        println!("   缓存未命中: {} 次", cache.misses);
        println!("   命中率: {:.1}%", cache.hit_rate() * 100.0);
        println!("   条目数: {}", cache.entries);
    }

    println!("\n⏱️  总耗时: {}", format_duration(total_duration));
}

/// 格式化持续时间
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
    }

    #[test]
    fn test_total_time() {
        let stats = PipelineStats {
            render_time: Duration::from_millis(1),
            extract_time: Duration::from_millis(2),
            translate_time: Duration::from_millis(3),
            substitute_time: Duration::from_millis(4),
            ..PipelineStats::new("Index", "fr")
        };
        assert_eq!(stats.total_time(), Duration::from_millis(10));
        assert_eq!(stats.cache_status, CacheStatus::Untranslated);
    }
}
