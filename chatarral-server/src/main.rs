use chatarral_core::{logging::setup_logging, Result, Settings};
use chatarral_server::{api_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    setup_logging(&settings);

    let storage = chatarral_db_backends::open_storage(&settings.database)?;
    chatarral_db_backends::bootstrap::initialize(storage.as_ref()).await?;
    chatarral_server::seed::ensure_admin(storage.as_ref()).await?;

    let state = AppState::new(storage, &settings);
    let app = api_router(state);

    let addr = format!("{}:{}", settings.bind, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| chatarral_core::Error::Storage(format!("no se pudo abrir {addr}: {e}")))?;
    tracing::info!(%addr, "servidor escuchando");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| chatarral_core::Error::Storage(format!("fallo del servidor: {e}")))?;
    tracing::info!("servidor detenido");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
