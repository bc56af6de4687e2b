//! LifeX account server.

use anyhow::Context;
use lifex::{
    App, AppConfig, ResendSender,
    gateway::PostgrestBackend,
    sweeper::sweeper_spawn,
    telemetry::{LogFormat, telemetry_init, trace_layer},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry_init(LogFormat::from_env());

    let config = AppConfig::from_env().context("loading configuration")?;
    let bind_addr = config.bind_addr.clone();

    let client = reqwest::Client::builder()
        .user_agent(concat!("lifex/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;

    let backend = PostgrestBackend::from_config(client.clone(), &config);
    let sender = ResendSender::from_config(client, &config);

    if config.database_url.is_none() || config.database_service_key.is_none() {
        tracing::warn!("database gateway not configured; storage requests will fail");
    }
    if !config.email_configured() {
        tracing::warn!("email gateway not configured; confirmation emails will not be sent");
    }

    let app = App::new(config, backend)
        .context("validating configuration")?
        .with_email_sender(sender);

    let sweeper = sweeper_spawn(app.clone());

    let router = app.router().layer(trace_layer());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    tracing::info!("shut down");

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = tokio::signal::ctrl_c() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable; waiting for ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
