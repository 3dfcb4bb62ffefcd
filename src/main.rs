use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use tracing::{error, info};

use page_translator::api_constants::error_messages;
use page_translator::config::Cli;
use page_translator::stats::print_performance_stats;
use page_translator::utils::{generate_output_path, init_logging, validate_views_dir};
use page_translator::{FileViewRenderer, PageOutcome, PageTranslationPipeline, TranslationError};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    init_logging(cli.verbose, cli.quiet);

    validate_views_dir(&cli.views_dir)?;
    let renderer = FileViewRenderer::new(&cli.views_dir).context("创建视图渲染器失败")?;

    if cli.list_views {
        for view in renderer.available_views() {
            println!("{}", view);
        }
        return Ok(());
    }

    let config = cli.to_config().context("配置无效")?;
    let pipeline = PageTranslationPipeline::with_deepl(&config, Arc::new(renderer))
        .context("创建翻译流水线失败")?;

    if !cli.quiet {
        info!("🚀 启动页面翻译");
        info!("📂 视图目录: {}", cli.views_dir.display());
        info!("📄 视图: {}", cli.views.join(", "));
        info!("🌐 请求语言: {}", cli.langs.join(", "));
    }

    let total_start = Instant::now();

    let jobs: Vec<(&str, &str)> = cli
        .views
        .iter()
        .flat_map(|view| cli.langs.iter().map(move |lang| (view.as_str(), lang.as_str())))
        .collect();

    let results = join_all(
        jobs.iter()
            .map(|(view, lang)| pipeline.translate_page(view, lang)),
    )
    .await;

    let mut pages = Vec::new();
    let mut failures = 0;

    for ((view, lang), result) in jobs.iter().zip(results) {
        match result {
            Ok(outcome) => {
                write_outcome(&cli.output_dir, cli.stdout, view, lang, &outcome)?;
                pages.push(outcome.stats);
            }
            Err(TranslationError::LanguageUnsupported { target_lang, .. }) => {
                error!(
                    "❌ {} ({}): {} [{}]",
                    view,
                    lang,
                    error_messages::UNSUPPORTED_LANGUAGE,
                    target_lang
                );
                failures += 1;
            }
            Err(e) => {
                error!("❌ 翻译失败 {} ({}): {}", view, lang, e);
                failures += 1;
            }
        }
    }

    let total_duration = total_start.elapsed();

    if cli.stats || cli.verbose {
        print_performance_stats(&pages, &pipeline.cache_stats(), total_duration);
    }

    if failures > 0 {
        anyhow::bail!("{} 个页面翻译失败", failures);
    }

    if !cli.quiet {
        info!(
            "✅ 全部完成！{} 个页面，总耗时: {:.3}秒",
            pages.len(),
            total_duration.as_secs_f64()
        );
    }

    Ok(())
}

/// 输出翻译结果
fn write_outcome(
    output_dir: &Path,
    to_stdout: bool,
    view: &str,
    lang: &str,
    outcome: &PageOutcome,
) -> Result<()> {
    if to_stdout {
        println!("{}", outcome.html);
        return Ok(());
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("创建输出目录失败: {}", output_dir.display()))?;

    let output_path = generate_output_path(output_dir, view, lang);
    std::fs::write(&output_path, &outcome.html)
        .with_context(|| format!("写入文件失败: {}", output_path.display()))?;

    info!("💾 {} ({}) -> {}", view, outcome.language, output_path.display());
    Ok(())
}
