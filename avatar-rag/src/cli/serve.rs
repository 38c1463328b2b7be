use avatar_rag::config::Config;
use avatar_rag::error::Result;
use avatar_rag::server;

pub async fn run(config: Config, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let service = super::build_service(&config).await?;

    let stats = service.knowledge().stats();
    tracing::info!(
        ready = stats.ready,
        chunks = stats.chunks,
        profile_id = stats.profile_id.as_deref().unwrap_or_default(),
        "starting server"
    );

    server::serve(service, &bind).await
}
