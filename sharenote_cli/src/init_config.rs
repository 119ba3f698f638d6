use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Subcommand;
use sharenote_publish::RetryPolicy;
use toml_edit::{DocumentMut, Item, Table, value};
use tracing::info;

const PLACEHOLDER_BASE_URL: &str = "http://localhost:8080/";

#[derive(Subcommand)]
pub enum CmdConfig {
    /// Creates the config file if it doesn't exist, publishing to a local directory
    Init,
}

impl CmdConfig {
    pub fn run(self, config_file: PathBuf, local_data_dir: &Path) -> anyhow::Result<()> {
        let mut doc = if config_file.exists() {
            fs::read_to_string(&config_file)?
        } else {
            if let Some(parent) = config_file.parent() {
                fs::create_dir_all(parent)?;
            }
            String::new()
        }
        .parse::<DocumentMut>()
        .context("could not parse config file")?;

        match self {
            Self::Init => {
                if !doc.contains_key("public_base_url") {
                    doc.insert("public_base_url", value(PLACEHOLDER_BASE_URL));
                }
                if !doc.contains_key("share_unencrypted") {
                    doc.insert("share_unencrypted", value(false));
                }

                let retry = doc
                    .entry("retry")
                    .or_insert(Item::Table(Table::new()))
                    .as_table_mut()
                    .context("`retry` must be a table")?;
                if !retry.contains_key("attempts") {
                    retry.insert("attempts", value(i64::from(RetryPolicy::ASSET.attempts)));
                }
                if !retry.contains_key("delay_ms") {
                    retry.insert(
                        "delay_ms",
                        value(RetryPolicy::ASSET.delay.as_millis() as i64),
                    );
                }

                if !doc.contains_key("store") {
                    let publish_root = local_data_dir.join("published");
                    let mut store = Table::new();
                    store.insert("type", value("local"));
                    store.insert("base_path", value(publish_root.to_string_lossy().into_owned()));
                    doc.insert("store", Item::Table(store));
                }
            }
        }

        info!("writing to config file {config_file:?}");
        write_atomically(&config_file, doc.to_string().as_bytes())
    }
}

/// Writes through a temp file and a rename so readers never see a partial file.
pub fn write_atomically(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let mut tmp = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;
    tmp.write_all(contents)?;
    tmp.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SharenoteConfig, StoreConfig};

    #[test]
    fn init_writes_a_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("sharenote").join("config.toml");

        CmdConfig::Init.run(config_file.clone(), dir.path()).unwrap();
        let config = SharenoteConfig::load(&config_file).unwrap();

        assert_eq!(config.public_base_url.as_str(), PLACEHOLDER_BASE_URL);
        assert!(matches!(config.store, StoreConfig::Local(_)));
        assert!(!config_file.with_extension("tmp").exists());
    }

    #[test]
    fn init_keeps_existing_values() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("config.toml");
        fs::write(
            &config_file,
            "# my notes\npublic_base_url = \"https://notes.example.com/\"\n",
        )
        .unwrap();

        CmdConfig::Init.run(config_file.clone(), dir.path()).unwrap();

        let written = fs::read_to_string(&config_file).unwrap();
        assert!(written.starts_with("# my notes\n"));
        let config = SharenoteConfig::load(&config_file).unwrap();
        assert_eq!(config.public_base_url.as_str(), "https://notes.example.com/");
    }
}
