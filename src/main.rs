use std::{net::SocketAddr, sync::Arc};

use legato::{
    audio::{AudioBackend, FfmpegTranscoder, YtDlpStreamResolver},
    common::{
        banner::{BannerInfo, print_banner},
        cache::MemoryCache,
        logger,
        types::AnyResult,
    },
    configs::Config,
    lyrics::LyricsManager,
    session::{CloseReason, SessionRegistry},
    sources::YtDlpSource,
    transport::{self, AppState},
    voice::UdpBridgeConnector,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(&config);
    print_banner(&BannerInfo::default());

    let pipeline = &config.pipeline;
    let source = Arc::new(YtDlpSource::new(&pipeline.ytdlp_path, pipeline.resolve_timeout()));
    let backend = AudioBackend {
        resolver: Arc::new(YtDlpStreamResolver::new(&pipeline.ytdlp_path, pipeline.resolve_timeout())),
        url_cache: Arc::new(MemoryCache::<String, String>::new()),
        transcoder: Arc::new(FfmpegTranscoder::new(&pipeline.ffmpeg_path)),
        url_ttl: pipeline.url_cache_ttl(),
    };

    let bridge_addr: SocketAddr = config.voice.bridge_addr.parse()?;
    let registry = SessionRegistry::new(
        Arc::new(UdpBridgeConnector::new(bridge_addr)),
        source.clone(),
        backend,
        config.session.clone(),
        config.player.clone(),
    );
    let lyrics = Arc::new(LyricsManager::new(&config.lyrics));

    let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(config, registry.clone(), source, lyrics);

    let shutdown = CancellationToken::new();
    let sweeper = registry.spawn_sweeper(shutdown.clone());

    let app = transport::router(state);
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("legato listening on {}", address);

    let teardown = {
        let registry = registry.clone();
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received, closing sessions");
            shutdown.cancel();
            let closed = registry.destroy_all(CloseReason::Shutdown);
            info!("Closed {} session(s)", closed);
        }
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(teardown)
        .await?;

    let _ = sweeper.await;
    info!("legato stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
