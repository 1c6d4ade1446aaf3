//! storedesk-notify: terminal notifier for the back-office event stream.
//!
//! Rings the terminal bell and prints a line per new order or call request,
//! and keeps the unread counters on screen. Press Enter once to allow the
//! bell (it stays silent until the first interaction), Ctrl-C to quit.

use std::sync::Arc;

use anyhow::Context;
use storedesk_client::alerts::{Alerts, AudioCue, TerminalBell, ToastQueue};
use storedesk_client::credentials::StoredCredentials;
use storedesk_client::stores::{BackendSnapshots, COUNTERS};
use storedesk_client::stream::{ConnectionState, Notifier, StreamManager};
use storedesk_client::{logging, ClientConfig, Storage};
use storedesk_shared::CredentialPair;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("storedesk_client=info,storedesk_notify=info");

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    let storage = match &config.data_dir {
        Some(dir) => Storage::at(dir),
        None => Storage::default_location()?,
    };
    tracing::info!("Credential storage at {}", storage.dir().display());

    let credentials = StoredCredentials::new(storage, &config.api_url);
    seed_credentials(&credentials)?;
    let credentials = Arc::new(credentials);

    let alerts = Arc::new(Alerts::new(
        AudioCue::new(TerminalBell),
        ToastQueue::new(config.toast_ttl),
    ));
    let sink = Arc::new(Notifier::new(alerts.clone(), COUNTERS.clone()));

    let snapshots = BackendSnapshots::new(config.api_url.clone(), credentials.clone());
    if !COUNTERS.refresh(&snapshots).await {
        tracing::warn!("Could not load initial counters, starting from zero");
    }

    let stream = StreamManager::websocket(config, credentials, sink);
    stream.start();
    if stream.status().state == ConnectionState::Idle {
        tracing::warn!(
            "No stored credentials; set STOREDESK_ACCESS_TOKEN and STOREDESK_REFRESH_TOKEN"
        );
    }

    tokio::spawn(print_toasts(alerts.clone()));
    tokio::spawn(print_counters());
    tokio::spawn(print_status(stream.clone()));
    tokio::spawn(unlock_on_enter(alerts));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");
    stream.shutdown().await;

    Ok(())
}

/// Store a pair passed through the environment, replacing any stored one.
fn seed_credentials(credentials: &StoredCredentials) -> anyhow::Result<()> {
    let Ok(access_token) = std::env::var("STOREDESK_ACCESS_TOKEN") else {
        return Ok(());
    };
    let refresh_token = std::env::var("STOREDESK_REFRESH_TOKEN").unwrap_or_default();

    credentials
        .store(&CredentialPair {
            access_token,
            refresh_token,
        })
        .context("failed to store credentials from the environment")?;
    tracing::info!("Stored credentials from the environment");
    Ok(())
}

async fn print_toasts(alerts: Arc<Alerts>) {
    let mut rx = alerts.toasts().subscribe();
    let mut seen = std::collections::HashSet::new();

    while rx.changed().await.is_ok() {
        let toasts = rx.borrow_and_update().clone();
        seen.retain(|id| toasts.iter().any(|toast| toast.id == *id));
        for toast in toasts {
            if seen.insert(toast.id) {
                println!(
                    "[{}] {}: {}",
                    toast.created_at.format("%H:%M:%S"),
                    toast.title,
                    toast.body
                );
            }
        }
    }
}

async fn print_counters() {
    let mut rx = COUNTERS.subscribe();
    loop {
        let counters = *rx.borrow_and_update();
        println!(
            "Pending orders: {}  New call requests: {}",
            counters.pending_orders, counters.new_call_requests
        );
        if rx.changed().await.is_err() {
            break;
        }
    }
}

async fn print_status(stream: StreamManager) {
    let mut rx = stream.subscribe_status();
    while rx.changed().await.is_ok() {
        let status = *rx.borrow_and_update();
        match status.state {
            ConnectionState::Open => tracing::info!("Live"),
            ConnectionState::Idle if status.failures > 0 => {
                tracing::error!("Notification stream gave up; log in again and restart")
            }
            _ => tracing::debug!("Stream status: {:?}", status),
        }
    }
}

async fn unlock_on_enter(alerts: Arc<Alerts>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(_)) = lines.next_line().await {
        if alerts.audio().unlock() {
            println!("Sound enabled");
        }
    }
}
