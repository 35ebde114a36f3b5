use crate::{
    annotator::Annotator,
    config::Config,
    coordinator::Coordinator,
    detection::HttpDetector,
    entity::{publish_states, Entities, StatePublisher, StateWriter},
    home_assistant::HomeAssistantClient,
    server::{HttpServer, SharedState},
    service::AnalyzeService,
    telemetry::Metrics,
};

use std::sync::Arc;
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let metrics = Arc::new(Metrics::new()?);

    let home_assistant = Arc::new(HomeAssistantClient::new(&config.home_assistant)?);
    let detector = match HttpDetector::new(&config.detection) {
        Ok(detector) => Arc::new(detector),
        Err(e) => {
            tracing::error!("Failed to initialize detection client: {:?}", e);
            return Err(e.into());
        }
    };
    tracing::info!(
        "Sending snapshots to {} (min_confidence={}, timeout={}s)",
        detector.endpoint(),
        config.detection.min_confidence,
        config.detection.timeout
    );

    let annotator = Arc::new(Annotator::new(&config.annotation));

    let coordinator = Arc::new(Coordinator::new());
    let (writer, states_rx) = StateWriter::channel();
    let entities = Arc::new(Entities::register(coordinator.clone(), writer));

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();
    let publisher_shutdown_rx = shutdown_tx.subscribe();

    let publisher: Option<Arc<dyn StatePublisher>> = if config.home_assistant.publish_states {
        tracing::info!("Publishing entity states to {}", config.home_assistant.url);
        Some(home_assistant.clone() as Arc<dyn StatePublisher>)
    } else {
        None
    };
    let publisher_handle = tokio::spawn(publish_states(
        states_rx,
        publisher,
        publisher_shutdown_rx,
    ));

    let analyze_service = Arc::new(AnalyzeService::new(
        home_assistant,
        detector,
        annotator,
        coordinator,
    ));

    let app_state = SharedState {
        analyze_service,
        entities,
        metrics,
    };
    let server = HttpServer::new(app_state, &config.server).await?;
    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    if let Err(e) = server_handle.await? {
        tracing::error!("Server exited with error: {:?}", e);
    }
    let _ = publisher_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
