use std::path::PathBuf;

use anyhow::{Result, bail};
use sharenote_publish::{PublishOptions, Publisher};

use crate::bundle::BundleHost;

pub async fn run_publish(publisher: &Publisher, bundle: PathBuf, force: bool) -> Result<()> {
    let host = BundleHost::new(bundle);
    let outcome = publisher.publish(&host, PublishOptions { force }).await?;
    if !outcome.assets_complete {
        tracing::warn!("published with missing assets; run publish again to retry them");
    }
    // The link is the command's output; everything else goes to the log.
    println!("{}", outcome.link);
    Ok(())
}

pub async fn run_delete(publisher: &Publisher, bundle: PathBuf, yes: bool) -> Result<()> {
    let host = BundleHost::new(bundle).assume_yes(yes);
    if publisher.unpublish(&host).await? {
        println!("Shared note deleted");
    }
    Ok(())
}

pub async fn run_check(publisher: &Publisher) -> Result<()> {
    if let Err(err) = publisher.check_connection().await {
        bail!("store is not writable: {err}");
    }
    println!("Connection OK");
    Ok(())
}
