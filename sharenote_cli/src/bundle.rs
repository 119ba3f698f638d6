//! A note bundle on disk, acting as the publisher's host.
//!
//! A bundle is a directory holding `bundle.toml`, the rendered HTML sections
//! it lists, its attachments and optionally a theme stylesheet. Share state is
//! kept next to it in `share.toml`.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use sharenote_core::UnitKind;
use sharenote_publish::{
    Host, ShareMetadata, ShareMetadataUpdate, SourceDocument, SourceFile, ThemeSource,
};
use sharenote_template::{StyleSource, capture_element_style};

use crate::init_config::write_atomically;

pub const MANIFEST_FILE: &str = "bundle.toml";
pub const SHARE_FILE: &str = "share.toml";

#[derive(Debug, Deserialize)]
struct BundleManifest {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    width: String,
    sections: Vec<PathBuf>,
    #[serde(default)]
    math: bool,
    theme: Option<ThemeManifest>,
    #[serde(default, rename = "file")]
    files: Vec<FileManifest>,
    #[serde(default, rename = "element")]
    elements: Vec<ElementSnapshot>,
}

#[derive(Debug, Deserialize)]
struct ThemeManifest {
    name: String,
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct FileManifest {
    kind: String,
    path: PathBuf,
    reference: Option<String>,
}

/// Presentation of one element as exported alongside the rendered note.
#[derive(Debug, Clone, Deserialize)]
struct ElementSnapshot {
    selector: String,
    #[serde(default)]
    classes: Vec<String>,
    #[serde(default)]
    style: String,
}

impl StyleSource for ElementSnapshot {
    fn classes(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.classes.clone())
    }

    fn inline_style(&self) -> anyhow::Result<String> {
        Ok(self.style.clone())
    }
}

pub struct BundleHost {
    root: PathBuf,
    assume_yes: bool,
}

impl BundleHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            assume_yes: false,
        }
    }

    /// Answer every confirmation with yes instead of prompting.
    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    fn share_file(&self) -> PathBuf {
        self.root.join(SHARE_FILE)
    }

    async fn load(&self) -> anyhow::Result<SourceDocument> {
        let manifest_path = self.root.join(MANIFEST_FILE);
        let manifest = tokio::fs::read_to_string(&manifest_path)
            .await
            .with_context(|| format!("failed to read {}", manifest_path.display()))?;
        let manifest: BundleManifest = toml::from_str(&manifest)
            .with_context(|| format!("invalid manifest {}", manifest_path.display()))?;

        let mut sections = Vec::with_capacity(manifest.sections.len());
        for section in &manifest.sections {
            let path = self.root.join(section);
            let html = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read section {}", path.display()))?;
            sections.push(html);
        }

        let mut files = Vec::with_capacity(manifest.files.len());
        for file in manifest.files {
            files.push(self.load_file(file).await?);
        }

        let theme = match manifest.theme {
            Some(theme) => {
                let path = self.root.join(&theme.path);
                let css = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read theme {}", path.display()))?;
                Some(ThemeSource {
                    name: theme.name,
                    css: Bytes::from(css),
                })
            }
            None => None,
        };

        let elements = manifest
            .elements
            .iter()
            .map(|element| capture_element_style(&element.selector, element))
            .collect();

        Ok(SourceDocument {
            id: self.root.display().to_string(),
            title: manifest.title,
            description: manifest.description,
            width: manifest.width,
            sections,
            elements,
            files,
            theme,
            math: manifest.math,
        })
    }

    async fn load_file(&self, file: FileManifest) -> anyhow::Result<SourceFile> {
        let kind: UnitKind = file.kind.parse()?;
        let path = self.root.join(&file.path);
        let content = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read file {}", path.display()))?;
        let filetype = file_extension(&file.path)
            .ok_or_else(|| anyhow!("{} has no file extension", file.path.display()))?;
        let reference = match file.reference {
            Some(reference) => reference,
            None => file.path.to_string_lossy().into_owned(),
        };
        Ok(SourceFile {
            kind,
            reference,
            filetype,
            content: Bytes::from(content),
        })
    }
}

fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

#[async_trait]
impl Host for BundleHost {
    async fn active_document(&self) -> anyhow::Result<Option<SourceDocument>> {
        if !self.root.join(MANIFEST_FILE).exists() {
            return Ok(None);
        }
        self.load().await.map(Some)
    }

    async fn read_share_metadata(&self, _doc: &SourceDocument) -> anyhow::Result<ShareMetadata> {
        let path = self.share_file();
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("invalid share file {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ShareMetadata::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_share_metadata(
        &self,
        doc: &SourceDocument,
        update: ShareMetadataUpdate,
    ) -> anyhow::Result<()> {
        let mut metadata = self.read_share_metadata(doc).await?;
        metadata.apply(&update);
        let contents = toml::to_string(&metadata)?;
        let path = self.share_file();
        tokio::task::spawn_blocking(move || write_atomically(&path, contents.as_bytes())).await?
    }

    async fn confirm(&self, prompt: &str) -> anyhow::Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        let prompt = prompt.to_owned();
        tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let mut stderr = std::io::stderr();
            write!(stderr, "{prompt} [y/N] ")?;
            stderr.flush()?;
            let mut answer = String::new();
            std::io::stdin().read_line(&mut answer)?;
            Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;

    fn write_bundle(dir: &Path) {
        fs::write(
            dir.join(MANIFEST_FILE),
            r#"
title = "Trip notes"
description = "Day one"
sections = ["intro.html", "body.html"]
math = true

[theme]
name = "minimal"
path = "theme.css"

[[file]]
kind = "note_attachment"
path = "img/Cat.PNG"

[[file]]
kind = "note_attachment"
path = "map.pdf"
reference = "app://local/map.pdf"

[[element]]
selector = "body"
classes = ["theme-dark"]
style = "color: red;"

[[element]]
selector = ".markdown-preview-pusher"
classes = ["markdown-preview-pusher"]
style = "width: 1px; margin-bottom: 0px;"
"#,
        )
        .unwrap();
        fs::write(dir.join("intro.html"), "<h1>Day one</h1>").unwrap();
        fs::write(dir.join("body.html"), "<img src=\"img/Cat.PNG\">").unwrap();
        fs::write(dir.join("theme.css"), "body { color: red }").unwrap();
        fs::create_dir(dir.join("img")).unwrap();
        fs::write(dir.join("img/Cat.PNG"), b"png").unwrap();
        fs::write(dir.join("map.pdf"), b"pdf").unwrap();
    }

    #[tokio::test]
    async fn loads_bundle() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(dir.path());
        let host = BundleHost::new(dir.path());

        let doc = host.active_document().await.unwrap().unwrap();
        assert_eq!(doc.title, "Trip notes");
        assert_eq!(doc.sections, vec!["<h1>Day one</h1>", "<img src=\"img/Cat.PNG\">"]);
        assert!(doc.math);
        assert_eq!(doc.theme.as_ref().unwrap().name, "minimal");

        assert_eq!(doc.files[0].kind, UnitKind::NoteAttachment);
        assert_eq!(doc.files[0].reference, "img/Cat.PNG");
        assert_eq!(doc.files[0].filetype, "png");
        assert_eq!(doc.files[1].reference, "app://local/map.pdf");

        assert_eq!(doc.elements[0].element, "body");
        assert_eq!(doc.elements[1].style, "width: 1px;");
    }

    #[tokio::test]
    async fn missing_manifest_means_no_document() {
        let dir = tempfile::tempdir().unwrap();
        let host = BundleHost::new(dir.path());
        assert!(host.active_document().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_unknown_file_kind() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            "title = \"x\"\nsections = []\n[[file]]\nkind = \"video\"\npath = \"a.mp4\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("a.mp4"), b"").unwrap();

        let err = BundleHost::new(dir.path())
            .active_document()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("malformed publish unit"));
    }

    #[tokio::test]
    async fn share_file_round_trips_and_keeps_overrides() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(dir.path());
        fs::write(dir.path().join(SHARE_FILE), "encrypted = true\n").unwrap();
        let host = BundleHost::new(dir.path());
        let doc = host.active_document().await.unwrap().unwrap();

        host.write_share_metadata(
            &doc,
            ShareMetadataUpdate::Published {
                share_id: "abc".parse().unwrap(),
                link: "https://notes.example.com/abc#key".to_owned(),
                updated: Utc::now(),
            },
        )
        .await
        .unwrap();
        let metadata = host.read_share_metadata(&doc).await.unwrap();
        assert!(metadata.encrypted);
        assert_eq!(metadata.share_id.unwrap().as_str(), "abc");

        host.write_share_metadata(&doc, ShareMetadataUpdate::Cleared)
            .await
            .unwrap();
        let metadata = host.read_share_metadata(&doc).await.unwrap();
        assert!(metadata.encrypted);
        assert!(metadata.link.is_none());
    }

    #[tokio::test]
    async fn assume_yes_skips_prompt() {
        let host = BundleHost::new("/nonexistent").assume_yes(true);
        assert!(host.confirm("delete?").await.unwrap());
    }
}
