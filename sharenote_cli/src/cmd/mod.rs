use std::path::{Path, PathBuf};

use anyhow::Result;
use sharenote_publish::{Publisher, UploadQueue};

use crate::config::{SharenoteConfig, open_store};

mod decrypt;
mod publish;

pub use decrypt::run_decrypt;
pub use publish::{run_check, run_delete, run_publish};

pub async fn run_command(
    config_file: PathBuf,
    local_data_dir: &Path,
    cmd: crate::Commands,
) -> Result<()> {
    match cmd {
        crate::Commands::Config { cmd } => {
            cmd.run(config_file, local_data_dir)?;
            Ok(())
        }
        // Decryption works on a downloaded artifact and needs no store.
        crate::Commands::Decrypt { artifact, key } => run_decrypt(&artifact, &key).await,
        _ => {
            let config = SharenoteConfig::load(&config_file)?;
            let publisher = open_publisher(&config)?;

            match cmd {
                crate::Commands::Publish { bundle, force } => {
                    run_publish(&publisher, bundle, force).await
                }
                crate::Commands::Delete { bundle, yes } => {
                    run_delete(&publisher, bundle, yes).await
                }
                crate::Commands::Check => run_check(&publisher).await,
                crate::Commands::Config { .. } | crate::Commands::Decrypt { .. } => {
                    unreachable!()
                }
            }
        }
    }
}

fn open_publisher(config: &SharenoteConfig) -> Result<Publisher> {
    let store = open_store(&config.store)?;
    let queue = UploadQueue::new(store, config.public_base_url.clone())
        .with_retry_policy((&config.retry).into());
    Ok(Publisher::new(queue, config.publish_config()))
}
