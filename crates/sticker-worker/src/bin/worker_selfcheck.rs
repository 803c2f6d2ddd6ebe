use std::path::Path;

use sticker_media::{check_ffmpeg, MetadataWriter, StickerPackMetadata};
use sticker_queue::QueueConfig;
use sticker_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.conversion.work_dir.display()
    );
    config.validate()?;
    ensure_workdir(&config.conversion.work_dir).await?;

    let ffmpeg = check_ffmpeg()?;
    println!("worker-selfcheck: ffmpeg at {}", ffmpeg.display());

    QueueConfig::from_env()
        .validate()
        .map_err(|e| anyhow::anyhow!("queue config: {}", e))?;
    MetadataWriter::new(&StickerPackMetadata::from_env())?;
    ensure_env_present(&["REDIS_URL", "WHATSAPP_TOKEN", "WHATSAPP_PHONE_NUMBER_ID"])?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
