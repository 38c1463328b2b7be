use avatar_rag::config::Config;
use avatar_rag::error::{AvatarError, Result};

pub async fn run(config: Config, json: bool) -> Result<()> {
    let service = super::build_service(&config).await?;
    let stats = service.knowledge().stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("manifest:     {}", config.manifest_path().display());
        println!("profile:      {}", stats.profile_id.as_deref().unwrap_or("-"));
        println!("chunks:       {}", stats.chunks);
        println!("content hash: {}", stats.content_hash.as_deref().unwrap_or("-"));
        if let Some(built_at) = stats.built_at {
            println!("built at:     {}", built_at.to_rfc3339());
        }
    }

    if stats.ready {
        Ok(())
    } else {
        Err(AvatarError::NotReady)
    }
}
