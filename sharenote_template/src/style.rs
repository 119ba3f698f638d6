use serde::{Deserialize, Serialize};

/// Class of the element that pushes rendered content down the page.
pub const PUSHER_CLASS: &str = "markdown-preview-pusher";

/// Classes and inline style of one element, keyed by a CSS selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementStyle {
    pub element: String,
    pub classes: Vec<String>,
    pub style: String,
}

/// A live element whose presentation can be captured.
pub trait StyleSource {
    fn classes(&self) -> anyhow::Result<Vec<String>>;
    /// The element's inline style in `cssText` form, e.g. `color: red; margin: 0;`.
    fn inline_style(&self) -> anyhow::Result<String>;
}

/// Snapshots `source` under the selector `key`.
///
/// The pusher element loses its `margin-bottom`; everything else is kept
/// verbatim. A failing source yields an empty snapshot.
pub fn capture_element_style(key: &str, source: &dyn StyleSource) -> ElementStyle {
    let captured = source
        .classes()
        .and_then(|classes| Ok((source.inline_style()?, classes)));

    match captured {
        Ok((style, classes)) => {
            let style = if classes.iter().any(|c| c == PUSHER_CLASS) {
                remove_style_property(&style, "margin-bottom")
            } else {
                style
            };
            ElementStyle {
                element: key.to_owned(),
                classes,
                style,
            }
        }
        Err(e) => {
            tracing::warn!("failed to capture style of {key}: {e:#}");
            ElementStyle {
                element: key.to_owned(),
                ..Default::default()
            }
        }
    }
}

/// Drops every declaration of `property` from `css_text`.
pub fn remove_style_property(css_text: &str, property: &str) -> String {
    let kept: Vec<&str> = css_text
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter(|decl| {
            let name = decl.split_once(':').map_or(*decl, |(name, _)| name);
            !name.trim().eq_ignore_ascii_case(property)
        })
        .collect();

    if kept.is_empty() {
        String::new()
    } else {
        format!("{};", kept.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        classes: &'static [&'static str],
        style: &'static str,
    }

    impl StyleSource for Fixed {
        fn classes(&self) -> anyhow::Result<Vec<String>> {
            Ok(self.classes.iter().map(|c| c.to_string()).collect())
        }

        fn inline_style(&self) -> anyhow::Result<String> {
            Ok(self.style.to_owned())
        }
    }

    struct Detached;

    impl StyleSource for Detached {
        fn classes(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec!["orphan".to_owned()])
        }

        fn inline_style(&self) -> anyhow::Result<String> {
            anyhow::bail!("element is detached")
        }
    }

    #[test]
    fn pusher_loses_margin_bottom() {
        let pusher = Fixed {
            classes: &["markdown-preview-pusher"],
            style: "width: 1px; height: 0.1px; margin-bottom: 2186px;",
        };
        let captured = capture_element_style(".markdown-preview-pusher", &pusher);
        assert_eq!(captured.style, "width: 1px; height: 0.1px;");
        assert!(!captured.style.contains("margin-bottom"));
        assert_eq!(captured.classes, vec!["markdown-preview-pusher"]);
    }

    #[test]
    fn other_elements_are_verbatim() {
        let view = Fixed {
            classes: &["markdown-reading-view"],
            style: "margin-bottom: 10px;  color:red",
        };
        let captured = capture_element_style(".markdown-reading-view", &view);
        assert_eq!(captured.style, "margin-bottom: 10px;  color:red");
    }

    #[test]
    fn failure_degrades_to_empty() {
        let captured = capture_element_style("body", &Detached);
        assert_eq!(
            captured,
            ElementStyle {
                element: "body".to_owned(),
                classes: vec![],
                style: String::new(),
            }
        );
    }

    #[test]
    fn remove_property_is_case_insensitive() {
        assert_eq!(
            remove_style_property("Margin-Bottom: 4px; margin-top: 8px", "margin-bottom"),
            "margin-top: 8px;"
        );
        assert_eq!(remove_style_property("margin-bottom: 4px;", "margin-bottom"), "");
        assert_eq!(remove_style_property("", "margin-bottom"), "");
    }
}
