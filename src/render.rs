//! 视图渲染
//!
//! 流水线只把渲染当作 `render(view) -> markup` 的黑盒。这里提供一个基于文件的实现：
//! 视图是 `{views_dir}/{view}.html` 模板，`{{ Key }}` 占位符由视图数据填充。

// 标准库导入
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// 第三方crate导入
use async_trait::async_trait;
use regex::{Captures, Regex};
use tracing::debug;
use walkdir::WalkDir;

// 本地模块导入
use crate::api_constants::page_config;
use crate::error::{Result, TranslationError};

/// 视图渲染器
#[async_trait]
pub trait ViewRenderer: Send + Sync {
    /// 渲染视图为完整的HTML，找不到视图时返回 `ViewNotFound`
    async fn render(&self, view: &str) -> Result<String>;
}

#[async_trait]
impl<F> ViewRenderer for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    async fn render(&self, view: &str) -> Result<String> {
        self(view)
    }
}

/// 视图数据，填充模板中的占位符
pub type ViewData = BTreeMap<String, String>;

/// 基于文件的视图渲染器
#[derive(Debug, Clone)]
pub struct FileViewRenderer {
    views_dir: PathBuf,
    data: ViewData,
    placeholder: Regex,
}

impl FileViewRenderer {
    /// 创建渲染器，默认注入页面标题
    pub fn new<P: AsRef<Path>>(views_dir: P) -> Result<Self> {
        let placeholder = Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").map_err(|e| {
            TranslationError::Configuration {
                field: "views".to_string(),
                reason: format!("编译占位符正则表达式失败: {}", e),
            }
        })?;

        let mut data = ViewData::new();
        data.insert("Title".to_string(), page_config::DEFAULT_TITLE.to_string());

        Ok(Self {
            views_dir: views_dir.as_ref().to_path_buf(),
            data,
            placeholder,
        })
    }

    /// 设置一项视图数据
    pub fn with_data(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn views_dir(&self) -> &Path {
        &self.views_dir
    }

    /// 列出视图目录下所有可用视图（按名称排序）
    pub fn available_views(&self) -> Vec<String> {
        let mut views: Vec<String> = WalkDir::new(&self.views_dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == page_config::VIEW_EXTENSION)
            })
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.views_dir).ok()?;
                let name = relative.with_extension("");
                let parts: Vec<String> = name
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(parts.join("/"))
            })
            .collect();

        views.sort();
        views
    }

    /// 视图名转换为模板路径，拒绝目录穿越
    fn view_path(&self, view: &str) -> Result<PathBuf> {
        let valid = !view.is_empty()
            && view.split('/').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            });

        if !valid {
            return Err(TranslationError::ViewNotFound {
                view: view.to_string(),
                reason: "视图名不合法".to_string(),
            });
        }

        let mut path = self.views_dir.clone();
        for segment in view.split('/') {
            path.push(segment);
        }
        path.set_extension(page_config::VIEW_EXTENSION);
        Ok(path)
    }

    /// 用视图数据填充占位符，未知键替换为空串
    fn fill(&self, template: &str) -> String {
        self.placeholder
            .replace_all(template, |caps: &Captures<'_>| {
                let key = &caps[1];
                match self.data.get(key) {
                    Some(value) => value.clone(),
                    None => {
                        debug!("视图数据缺少键: {}", key);
                        String::new()
                    }
                }
            })
            .into_owned()
    }
}

#[async_trait]
impl ViewRenderer for FileViewRenderer {
    async fn render(&self, view: &str) -> Result<String> {
        let path = self.view_path(view)?;

        let template = tokio::fs::read_to_string(&path).await.map_err(|e| {
            TranslationError::ViewNotFound {
                view: view.to_string(),
                reason: format!("{}: {}", path.display(), e),
            }
        })?;

        debug!("📄 渲染视图 {} ({} 字节)", view, template.len());
        Ok(self.fill(&template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn views() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Index.html"),
            "<title>{{ Title }}</title><p>{{Missing}}</p>",
        )
        .unwrap();
        fs::create_dir(dir.path().join("Home")).unwrap();
        fs::write(dir.path().join("Home").join("Privacy.html"), "<p>Privacy</p>").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a view").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_render_fills_view_data() {
        let dir = views();
        let renderer = FileViewRenderer::new(dir.path()).unwrap();

        let html = renderer.render("Index").await.unwrap();
        assert_eq!(html, "<title>Home Page</title><p></p>");

        let renderer = renderer.with_data("Title", "Accueil");
        assert_eq!(
            renderer.render("Index").await.unwrap(),
            "<title>Accueil</title><p></p>"
        );
    }

    #[tokio::test]
    async fn test_render_nested_view() {
        let dir = views();
        let renderer = FileViewRenderer::new(dir.path()).unwrap();
        assert_eq!(
            renderer.render("Home/Privacy").await.unwrap(),
            "<p>Privacy</p>"
        );
    }

    #[tokio::test]
    async fn test_missing_view() {
        let dir = views();
        let renderer = FileViewRenderer::new(dir.path()).unwrap();

        let err = renderer.render("Nope").await.unwrap_err();
        assert!(matches!(err, TranslationError::ViewNotFound { .. }));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = views();
        let renderer = FileViewRenderer::new(dir.path()).unwrap();

        for view in ["../secret", "", "Home//Privacy", "a.b"] {
            let err = renderer.render(view).await.unwrap_err();
            assert!(matches!(err, TranslationError::ViewNotFound { .. }));
        }
    }

    #[test]
    fn test_available_views() {
        let dir = views();
        let renderer = FileViewRenderer::new(dir.path()).unwrap();
        assert_eq!(renderer.available_views(), vec!["Home/Privacy", "Index"]);
    }

    #[tokio::test]
    async fn test_closure_renderer() {
        let renderer = |view: &str| -> Result<String> { Ok(format!("<p>{}</p>", view)) };
        assert_eq!(renderer.render("Index").await.unwrap(), "<p>Index</p>");
    }
}
