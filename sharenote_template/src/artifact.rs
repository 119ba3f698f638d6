use html_escape::{encode_double_quoted_attribute, encode_text};
use thiserror::Error;

use crate::style::ElementStyle;

const BOOTSTRAP_JS: &str = include_str!("assets/bootstrap.js");
const MATHJAX_SRC: &str = "https://cdn.jsdelivr.net/npm/mathjax@3.2.2/es5/tex-chtml-full.js";

/// Reading width used when the descriptor leaves it empty or unusable.
pub const DEFAULT_WIDTH: &str = "800px";

pub(crate) const ENCRYPTED_DATA_OPEN: &str = r#"<div id="encrypted-data" style="display: none">"#;
const ELEMENT_STYLES_OPEN: &str = r#"<div id="element-styles" style="display: none">"#;
const PLACEHOLDER: &str = r#"<div id="template-user-data"></div>"#;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to serialize element styles: {0}")]
    ElementStyles(#[from] serde_json::Error),
}

/// Body of a shared document: plaintext markup or a serialized envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    Plain(String),
    Encrypted(String),
}

/// Everything that goes into one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDescriptor {
    pub id: String,
    pub title: String,
    pub description: String,
    /// CSS length of the reading column, e.g. `800px` or `70%`.
    pub width: String,
    pub elements: Vec<ElementStyle>,
    pub content: DocumentContent,
    pub math: bool,
    /// Public URL of the theme stylesheet.
    pub theme_css: Option<String>,
}

impl TemplateDescriptor {
    pub fn encrypted(&self) -> bool {
        matches!(self.content, DocumentContent::Encrypted(_))
    }

    fn body_classes(&self) -> String {
        self.elements
            .iter()
            .find(|e| e.element == "body")
            .map(|e| e.classes.join(" "))
            .unwrap_or_default()
    }

    fn reading_width(&self) -> &str {
        let width = self.width.trim();
        let valid = !width.is_empty()
            && width
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '%');
        if valid { width } else { DEFAULT_WIDTH }
    }
}

/// Renders the complete HTML document.
///
/// Output depends only on the descriptor: equal descriptors give identical
/// bytes.
pub fn build(descriptor: &TemplateDescriptor) -> Result<String, TemplateError> {
    tracing::debug!(
        "building artifact for {} (encrypted: {})",
        descriptor.id,
        descriptor.encrypted()
    );

    let (plain, envelope) = match &descriptor.content {
        DocumentContent::Plain(html) => (html.as_str(), ""),
        DocumentContent::Encrypted(envelope) => ("", envelope.as_str()),
    };
    let element_styles = serde_json::to_string(&descriptor.elements)?;
    let title = encode_double_quoted_attribute(&descriptor.title);
    let description = encode_double_quoted_attribute(&descriptor.description);

    let mut html = format!(
        r#"<!DOCTYPE HTML>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title_text}</title>
    <meta name="description" content="{description}">
    <meta property="og:title" content="{title}">
    <meta property="og:description" content="{description}">
    <link rel="icon" type="image/x-icon" href="/favicon.ico">
    <style>
        html,
        body {{
            overflow: visible !important;
        }}

        .view-content {{
            height: 100% !important;
        }}

        .status-bar {{
            position: fixed !important;
        }}

        .markdown-preview-sizer.markdown-preview-section {{
            max-width: {width} !important;
            margin: 0 auto;
        }}
    </style>
"#,
        title_text = encode_text(&descriptor.title),
        width = descriptor.reading_width(),
    );
    if let Some(css) = &descriptor.theme_css {
        html.push_str(&format!(
            "    <link rel=\"stylesheet\" href=\"{}\">\n",
            encode_double_quoted_attribute(css)
        ));
    }
    if descriptor.math {
        html.push_str(&format!(
            "    <script async src=\"{MATHJAX_SRC}\"></script>\n"
        ));
    }
    html.push_str(&format!(
        r#"</head>
<body class="{body_classes}">
<div class="app-container">
    <div class="horizontal-main-container">
        <div class="workspace">
            <div class="workspace-split mod-vertical mod-root">
                <div class="workspace-leaf mod-active">
                    <div class="workspace-leaf-content">
                        <div class="view-content">
                            <div class="markdown-reading-view" style="height:100%;width:100%;">
                                <div>
                                    <div class="markdown-preview-sizer markdown-preview-section">
                                        <div>
{plain}
                                        </div>
{placeholder}
                                    </div>
                                </div>
                            </div>
                        </div>
                    </div>
                </div>
            </div>
        </div>
    </div>
    <div class="status-bar">
        <div class="status-bar-item">
            <span class="status-bar-item-segment">Shared note</span>
            <span id="theme-mode-toggle" class="status-bar-item-segment">&#127763;</span>
        </div>
    </div>
</div>
{ENCRYPTED_DATA_OPEN}{envelope}</div>
{ELEMENT_STYLES_OPEN}{element_styles}</div>
<script>
{BOOTSTRAP_JS}</script>
</body>
</html>
"#,
        body_classes = encode_double_quoted_attribute(&descriptor.body_classes()),
        placeholder = if descriptor.encrypted() { PLACEHOLDER } else { "" },
        envelope = encode_text(envelope),
        element_styles = encode_text(&element_styles),
    ));
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(content: DocumentContent) -> TemplateDescriptor {
        TemplateDescriptor {
            id: "a1b2c3".to_owned(),
            title: "T".to_owned(),
            description: "A note".to_owned(),
            width: String::new(),
            elements: vec![ElementStyle {
                element: "body".to_owned(),
                classes: vec!["theme-dark".to_owned(), "mod-windows".to_owned()],
                style: String::new(),
            }],
            content,
            math: false,
            theme_css: None,
        }
    }

    #[test]
    fn build_is_deterministic() {
        let d = descriptor(DocumentContent::Plain("<p>hi</p>".to_owned()));
        assert_eq!(build(&d).unwrap(), build(&d.clone()).unwrap());
    }

    #[test]
    fn plain_content_is_inline() {
        let html = build(&descriptor(DocumentContent::Plain("<p>hi</p>".to_owned()))).unwrap();
        let region_start = html.find("markdown-preview-sizer markdown-preview-section\">").unwrap();
        let region_end = html.find("<div class=\"status-bar\">").unwrap();
        assert!(html[region_start..region_end].contains("<p>hi</p>"));
        assert!(!html.contains(PLACEHOLDER));
        assert!(html.contains(&format!("{ENCRYPTED_DATA_OPEN}</div>")));
    }

    #[test]
    fn encrypted_content_uses_placeholder() {
        let envelope = r#"{"ciphertext":["q83vEjRWeJA="]}"#;
        let html = build(&descriptor(DocumentContent::Encrypted(envelope.to_owned()))).unwrap();
        assert!(html.contains(PLACEHOLDER));
        assert!(html.contains(&format!("{ENCRYPTED_DATA_OPEN}{envelope}</div>")));
    }

    #[test]
    fn head_reflects_descriptor() {
        let mut d = descriptor(DocumentContent::Plain(String::new()));
        d.title = r#"Q&A "draft""#.to_owned();
        d.width = "70%".to_owned();
        d.math = true;
        d.theme_css = Some("https://notes.example.com/assets/Minimal.css".to_owned());
        let html = build(&d).unwrap();

        assert!(html.contains("<title>Q&amp;A \"draft\"</title>"));
        assert!(html.contains(r#"content="Q&amp;A &quot;draft&quot;""#));
        assert!(html.contains("max-width: 70% !important"));
        assert!(html.contains(MATHJAX_SRC));
        assert!(html.contains(r#"href="https://notes.example.com/assets/Minimal.css""#));
        assert!(html.contains(r#"<body class="theme-dark mod-windows">"#));
    }

    #[test]
    fn width_falls_back_to_default() {
        let mut d = descriptor(DocumentContent::Plain(String::new()));
        assert!(build(&d).unwrap().contains("max-width: 800px !important"));
        d.width = "1px; } body { display: none".to_owned();
        assert!(build(&d).unwrap().contains("max-width: 800px !important"));
    }

    #[test]
    fn element_styles_are_embedded() {
        let mut d = descriptor(DocumentContent::Plain(String::new()));
        d.elements.push(ElementStyle {
            element: ".markdown-preview-view".to_owned(),
            classes: vec!["is-readable-line-width".to_owned()],
            style: "tab-size: 4;".to_owned(),
        });
        let html = build(&d).unwrap();
        assert!(html.contains(r#""element":".markdown-preview-view""#));
        assert!(html.contains(r#""style":"tab-size: 4;""#));
    }

    #[test]
    fn bootstrap_is_embedded() {
        let html = build(&descriptor(DocumentContent::Plain(String::new()))).unwrap();
        assert!(html.contains("function initDocument ()"));
        assert!(html.contains("Unable to decrypt using this key."));
        assert!(html.contains("ivArr[0] = index & 0xFF"));
    }

    #[test]
    fn malformed_key_fragment_reaches_failure_path() {
        let html = build(&descriptor(DocumentContent::Encrypted("{}".to_owned()))).unwrap();
        let decode = html
            .find("decodeURIComponent(window.location.hash.slice(1))")
            .unwrap();
        let guard = html[..decode].rfind("try {").unwrap();
        assert!(!html[guard..decode].contains('}'));
        assert!(html[decode..].contains("} catch (e) {"));
        assert!(!html.contains("const secret = decodeURIComponent"));
    }
}
