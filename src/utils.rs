use std::path::{Path, PathBuf};

use anyhow::Result;

/// 初始化日志系统
pub fn init_logging(verbose: bool, quiet: bool) {
    tracing_subscriber::fmt()
        .with_max_level(log_level(verbose, quiet))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// 日志级别：静默模式只保留错误，优先于详细模式
pub fn log_level(verbose: bool, quiet: bool) -> tracing::Level {
    if quiet {
        tracing::Level::ERROR
    } else if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    }
}

/// 验证视图目录
pub fn validate_views_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("视图目录不存在: {}", path.display());
    }

    if !path.is_dir() {
        anyhow::bail!("视图路径不是目录: {}", path.display());
    }

    Ok(())
}

/// 生成输出文件路径: `{output_dir}/{view}_{lang}.html`
///
/// 嵌套视图（如 `Home/Privacy`）中的分隔符替换为下划线。
pub fn generate_output_path(output_dir: &Path, view: &str, lang: &str) -> PathBuf {
    let view_name: String = view
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    output_dir.join(format!("{}_{}.html", view_name, lang))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(false, false), tracing::Level::INFO);
        assert_eq!(log_level(true, false), tracing::Level::DEBUG);
        assert_eq!(log_level(false, true), tracing::Level::ERROR);
        assert_eq!(log_level(true, true), tracing::Level::ERROR);
    }

    #[test]
    fn test_generate_output_path() {
        let dir = Path::new("out");
        assert_eq!(
            generate_output_path(dir, "Index", "fr"),
            PathBuf::from("out/Index_fr.html")
        );
        assert_eq!(
            generate_output_path(dir, "Home/Privacy", "fr-FR"),
            PathBuf::from("out/Home_Privacy_fr-FR.html")
        );
    }

    #[test]
    fn test_validate_views_dir() {
        let dir = TempDir::new().unwrap();
        assert!(validate_views_dir(dir.path()).is_ok());
        assert!(validate_views_dir(&dir.path().join("missing")).is_err());

        let file = dir.path().join("Index.html");
        std::fs::write(&file, "<p>x</p>").unwrap();
        assert!(validate_views_dir(&file).is_err());
    }
}
