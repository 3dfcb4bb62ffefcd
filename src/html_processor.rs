//! HTML处理模块
//!
//! 提供页面片段提取和译文回填功能。
//!
//! 提取时用 html5ever 解析出文档树，按选择器顺序找到第一个匹配元素；
//! 再在原始标记中定位该元素内部HTML的原文区间，片段文本取原文，
//! 回填时按区间精确替换。定位失败的片段使用序列化结果，整页退回到整串文本替换，
//! 序列化结果在页面中不存在时回填失败。

// 标准库导入
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

// 第三方crate导入
use html5ever::{namespace_url, ns, parse_document, parse_fragment, LocalName, QualName};
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use regex::Regex;
use tracing::{debug, warn};

// 本地模块导入
use crate::api_constants::page_config;
use crate::error::{Result, TranslationError};

/// 元素选择器：匹配文档中第一个指定标签名的元素
///
/// 支持 `title` 和 XPath 风格的 `//title` 两种写法。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    tag: String,
}

impl Selector {
    /// 解析选择器
    pub fn parse(spec: &str) -> Result<Self> {
        let tag = spec.trim().trim_start_matches("//").to_ascii_lowercase();

        let valid = !tag.is_empty()
            && tag.starts_with(|c: char| c.is_ascii_alphabetic())
            && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

        if !valid {
            return Err(TranslationError::Configuration {
                field: "selectors".to_string(),
                reason: format!("无效的选择器: {:?}", spec),
            });
        }

        Ok(Self { tag })
    }

    /// 解析选择器列表，保持原有顺序
    pub fn parse_list<I, S>(specs: I) -> Result<Vec<Selector>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        specs.into_iter().map(|s| Selector::parse(s.as_ref())).collect()
    }

    /// 默认选择器列表（`page_config::DEFAULT_SELECTORS`）
    pub fn defaults() -> Vec<Selector> {
        page_config::DEFAULT_SELECTORS
            .iter()
            .map(|tag| Self {
                tag: (*tag).to_string(),
            })
            .collect()
    }

    /// 标签名（小写）
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl FromStr for Selector {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "//{}", self.tag)
    }
}

/// 单个可翻译片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// 产生该片段的选择器
    pub selector: Selector,
    /// 元素的内部HTML（定位成功时为原始标记中的原文）
    pub text: String,
    /// 片段在原始标记中的字节区间，定位不到时为 `None`
    pub span: Option<Range<usize>>,
}

/// 一次渲染提取出的全部片段，顺序与选择器列表一致
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentSet {
    fragments: Vec<Fragment>,
}

impl FragmentSet {
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fragment> {
        self.fragments.iter()
    }

    /// 按提取顺序返回片段文本
    pub fn texts(&self) -> Vec<String> {
        self.fragments.iter().map(|f| f.text.clone()).collect()
    }

    /// 是否所有片段都定位到了原始区间
    pub fn is_fully_located(&self) -> bool {
        self.fragments.iter().all(|f| f.span.is_some())
    }
}

impl<'a> IntoIterator for &'a FragmentSet {
    type Item = &'a Fragment;
    type IntoIter = std::slice::Iter<'a, Fragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.fragments.iter()
    }
}

/// 片段提取器，持有固定顺序的选择器列表
#[derive(Debug, Clone)]
pub struct FragmentExtractor {
    selectors: Vec<Selector>,
}

impl FragmentExtractor {
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self { selectors }
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// 从渲染后的页面中提取片段
    pub fn extract(&self, markup: &str) -> Result<FragmentSet> {
        extract_fragments(markup, &self.selectors)
    }
}

/// 按选择器顺序提取片段
///
/// 任何一个选择器没有匹配都返回 `ElementNotFound`：跳过会让片段与译文的位置对应关系错位。
pub fn extract_fragments(markup: &str, selectors: &[Selector]) -> Result<FragmentSet> {
    let dom = parse_html(markup)?;
    let opaque = opaque_ranges(markup)?;
    let mut fragments = Vec::with_capacity(selectors.len());

    for selector in selectors {
        let element = find_first_element(&dom.document, selector.tag()).ok_or_else(|| {
            TranslationError::ElementNotFound {
                selector: selector.to_string(),
            }
        })?;

        let serialized = serialize_inner_html(&element)?;
        let fragment = match locate_span(markup, &opaque, selector.tag(), &serialized)? {
            Some(span) => Fragment {
                selector: selector.clone(),
                text: markup[span.clone()].to_string(),
                span: Some(span),
            },
            None => {
                debug!("片段 {} 无法在原始标记中定位，使用序列化结果", selector);
                Fragment {
                    selector: selector.clone(),
                    text: serialized,
                    span: None,
                }
            }
        };

        fragments.push(fragment);
    }

    debug!("📝 提取到 {} 个片段", fragments.len());
    Ok(FragmentSet { fragments })
}

/// 解析HTML文档
fn parse_html(markup: &str) -> Result<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut markup.as_bytes())
        .map_err(|e| TranslationError::HtmlParse {
            details: e.to_string(),
        })
}

/// 以 `tag` 元素为上下文解析一段内部HTML，返回序列化结果
fn reserialize_inner_html(raw: &str, tag: &str) -> Result<String> {
    let context = QualName::new(None, ns!(html), LocalName::from(tag));
    let dom = parse_fragment(RcDom::default(), Default::default(), context, Vec::new())
        .from_utf8()
        .read_from(&mut raw.as_bytes())
        .map_err(|e| TranslationError::HtmlParse {
            details: e.to_string(),
        })?;

    // 片段解析的结果挂在文档下唯一的 <html> 节点中
    let root = dom
        .document
        .children
        .borrow()
        .first()
        .cloned()
        .ok_or_else(|| TranslationError::HtmlParse {
            details: "片段解析结果为空".to_string(),
        })?;

    serialize_inner_html(&root)
}

/// 按文档顺序（深度优先）查找第一个匹配的元素
fn find_first_element(root: &Handle, tag: &str) -> Option<Handle> {
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if let NodeData::Element { ref name, .. } = node.data {
            if name.local.as_ref().eq_ignore_ascii_case(tag) {
                return Some(node);
            }
        }

        // 逆序压栈，保证先访问靠前的子节点
        for child in node.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }

    None
}

/// 序列化元素的子节点，即元素的内部HTML
fn serialize_inner_html(element: &Handle) -> Result<String> {
    let mut buffer = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };

    serialize(&mut buffer, &SerializableHandle::from(element.clone()), opts).map_err(|e| {
        TranslationError::HtmlParse {
            details: format!("HTML序列化失败: {}", e),
        }
    })?;

    String::from_utf8(buffer).map_err(|e| TranslationError::HtmlParse {
        details: format!("UTF-8转换失败: {}", e),
    })
}

fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| TranslationError::HtmlParse {
        details: format!("编译正则表达式失败: {}", e),
    })
}

/// 原始标记中不会产生元素的区间：注释，以及 script/style/textarea/title 的内容
fn opaque_ranges(markup: &str) -> Result<Vec<Range<usize>>> {
    let mut ranges: Vec<Range<usize>> = compile_regex(r"(?s)<!--.*?-->")?
        .find_iter(markup)
        .map(|m| m.range())
        .collect();

    for tag in ["script", "style", "textarea", "title"] {
        let raw_text = compile_regex(&format!(
            r"(?is)<{tag}(?:[\s/][^>]*)?>(.*?)</{tag}\s*>"
        ))?;
        ranges.extend(
            raw_text
                .captures_iter(markup)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.range()),
        );
    }

    Ok(ranges)
}

fn is_opaque(ranges: &[Range<usize>], pos: usize) -> bool {
    ranges.iter().any(|r| r.contains(&pos))
}

/// 在原始标记中定位元素的内部HTML
///
/// 只看原始标记中第一个 `<tag>` 开始标签（跳过注释和纯文本元素内容），它与文档树中
/// 第一个同名元素对应；按同名标签的嵌套层数找到对应的结束标签。
/// 这段原文按该元素上下文重新解析后必须与 `serialized` 一致，否则返回 `None`，
/// 绝不退而匹配其它同名元素。
fn locate_span(
    markup: &str,
    opaque: &[Range<usize>],
    tag: &str,
    serialized: &str,
) -> Result<Option<Range<usize>>> {
    let escaped = regex::escape(tag);
    let tag_token = compile_regex(&format!(r"(?i)<(/?){}(?:[\s/][^>]*)?>", escaped))?;

    let mut tokens = tag_token
        .captures_iter(markup)
        .filter(|caps| caps.get(0).is_some_and(|m| !is_opaque(opaque, m.start())));

    let Some(open_caps) = tokens.next() else {
        return Ok(None);
    };
    let (Some(open_match), Some(open_slash)) = (open_caps.get(0), open_caps.get(1)) else {
        return Ok(None);
    };
    if !open_slash.as_str().is_empty() || open_match.as_str().ends_with("/>") {
        // 第一个标签是结束标签或自闭合写法，无法对应到元素内容
        return Ok(None);
    }

    let start = open_match.end();
    let mut depth = 1usize;
    let mut end = None;

    for caps in tokens {
        let (Some(token), Some(slash)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if slash.as_str().is_empty() {
            if !token.as_str().ends_with("/>") {
                depth += 1;
            }
        } else {
            depth -= 1;
            if depth == 0 {
                end = Some(token.start());
                break;
            }
        }
    }

    let Some(end) = end else {
        return Ok(None);
    };

    if reserialize_inner_html(&markup[start..end], tag)? == serialized {
        Ok(Some(start..end))
    } else {
        debug!("<{}> 的原文与文档树内容不一致，放弃定位", tag);
        Ok(None)
    }
}

/// 译文回填方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SubstitutionMode {
    /// 按片段在原文中的位置替换，定位失败时退回文本替换
    #[default]
    Positional,
    /// 总是按文本内容替换所有出现位置
    Literal,
}

impl fmt::Display for SubstitutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstitutionMode::Positional => f.write_str("positional"),
            SubstitutionMode::Literal => f.write_str("literal"),
        }
    }
}

/// 回填结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// 回填后的页面
    pub html: String,
    /// 实际使用的回填方式
    pub mode: SubstitutionMode,
    /// 成功替换的片段数
    pub applied: usize,
}

/// 将译文回填到原始页面
///
/// `translations[i]` 对应 `fragments` 中第 i 个片段。
pub fn substitute_fragments(
    markup: &str,
    fragments: &FragmentSet,
    translations: &[String],
    mode: SubstitutionMode,
) -> Result<Substitution> {
    if fragments.len() != translations.len() {
        return Err(TranslationError::RemoteUnavailable {
            message: format!(
                "译文数量与片段数量不一致: 期望 {}，实际 {}",
                fragments.len(),
                translations.len()
            ),
            status_code: None,
        });
    }

    if mode == SubstitutionMode::Positional {
        if let Some(spans) = non_overlapping_spans(fragments) {
            return Ok(substitute_by_position(markup, spans, translations));
        }
        warn!("⚠️  片段区间无法全部定位或存在重叠，退回文本替换");
    }

    substitute_by_text(markup, fragments, translations)
}

/// 收集全部区间（附带片段序号），有缺失或重叠时返回 `None`
fn non_overlapping_spans(fragments: &FragmentSet) -> Option<Vec<(usize, Range<usize>)>> {
    let mut spans: Vec<(usize, Range<usize>)> = fragments
        .iter()
        .enumerate()
        .map(|(i, f)| f.span.clone().map(|s| (i, s)))
        .collect::<Option<_>>()?;

    spans.sort_by_key(|(_, span)| span.start);

    let overlapping = spans
        .windows(2)
        .any(|w| w[1].1.start < w[0].1.end || w[1].1.start == w[0].1.start);

    if overlapping {
        None
    } else {
        Some(spans)
    }
}

fn substitute_by_position(
    markup: &str,
    spans: Vec<(usize, Range<usize>)>,
    translations: &[String],
) -> Substitution {
    let mut html = markup.to_string();
    let applied = spans.len();

    // 从后往前替换，前面的区间偏移量保持不变
    for (index, span) in spans.into_iter().rev() {
        html.replace_range(span, &translations[index]);
    }

    Substitution {
        html,
        mode: SubstitutionMode::Positional,
        applied,
    }
}

fn substitute_by_text(
    markup: &str,
    fragments: &FragmentSet,
    translations: &[String],
) -> Result<Substitution> {
    // 原文中根本不存在的片段无法回填，直接失败而不是返回部分翻译的页面
    if let Some(missing) = fragments
        .iter()
        .find(|f| !f.text.is_empty() && !markup.contains(&f.text))
    {
        return Err(TranslationError::SubstitutionFailed {
            selector: missing.selector.to_string(),
            reason: "片段原文在页面中不存在".to_string(),
        });
    }

    let mut html = markup.to_string();
    let mut applied = 0;

    for (fragment, translation) in fragments.iter().zip(translations) {
        if fragment.text.is_empty() {
            continue;
        }

        // 相同原文已被前面的片段替换掉
        if html.contains(&fragment.text) {
            html = html.replace(&fragment.text, translation);
            applied += 1;
        } else {
            warn!("⚠️  片段 {} 的原文已被相同文本的片段替换", fragment.selector);
        }
    }

    Ok(Substitution {
        html,
        mode: SubstitutionMode::Literal,
        applied,
    })
}
