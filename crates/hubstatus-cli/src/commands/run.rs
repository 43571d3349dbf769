//! `hubstatus run`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hubstatus_config::Config;
use hubstatus_gateway::{
    ActivityObserver, GatewayClient, GatewayStatus, WsTransport, parse_stored_token,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::config_bridge;
use crate::credentials::CredentialRefresher;
use crate::feed;

/// Run the client until stdin closes or Ctrl-C.
pub(crate) async fn run(cfg: &Config, token_override: Option<String>) -> Result<()> {
    let gateway_config = config_bridge::to_gateway_config(cfg);

    let inline = token_override
        .or_else(|| cfg.credential.token.clone())
        .and_then(|raw| parse_stored_token(&raw));
    let (token_tx, token_rx) = watch::channel(inline.clone());

    let refresher = match (&inline, &cfg.credential.token_file) {
        (None, Some(path)) => {
            let interval = Duration::from_secs(cfg.credential.refresh_interval_secs);
            info!(path = %path.display(), ?interval, "Watching token file");
            Some(CredentialRefresher::new(path.clone(), interval).spawn(token_tx))
        },
        (None, None) => {
            warn!("No credential configured; activity will not be advertised");
            None
        },
        (Some(_), _) => None,
    };

    let (handle, client_task) = GatewayClient::spawn(
        gateway_config,
        Arc::new(WsTransport::new()),
        Box::new(token_rx),
    );
    let status_task = tokio::spawn(log_status(handle.subscribe()));

    let mut observer = ActivityObserver::new(config_bridge::to_tracked_hosts(cfg), handle.clone());
    let lines = feed::spawn_stdin_reader().context("failed to start stdin reader")?;

    tokio::select! {
        () = feed::drive(lines, &mut observer) => {},
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Interrupted"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        },
    }

    if handle.shutdown().is_err() {
        debug!("Gateway client already stopped");
    }
    client_task.await.context("gateway client task failed")?;

    if let Some(task) = refresher {
        task.abort();
    }
    status_task.abort();
    Ok(())
}

/// Log every status change until the client goes away.
async fn log_status(mut status: broadcast::Receiver<GatewayStatus>) {
    loop {
        match status.recv().await {
            Ok(GatewayStatus::TransportError(error)) => warn!(%error, "Gateway transport error"),
            Ok(GatewayStatus::Closed(info)) if !info.clean => {
                warn!(code = info.code, reason = %info.reason, "Gateway connection lost");
            },
            Ok(other) => debug!(status = ?other, "Gateway status"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "Status log lagged");
            },
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
