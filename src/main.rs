use anyhow::{Context, Result};
use colored::*;
use log::*;
use notifications::{
    DeliveryConfig, HttpApiConfig, HttpNotificationApi, Manager, Mode, Snapshot,
};
use service::config::Config;
use service::logging::Logger;
use std::sync::Arc;

fn delivery_config(config: &Config) -> DeliveryConfig {
    DeliveryConfig {
        poll_interval: config.poll_interval(),
        request_timeout: config.request_timeout(),
        eager_fetch_on_open: config.eager_fetch_on_open,
        page_size: config.panel_page_size,
    }
}

fn http_config(config: &Config) -> HttpApiConfig {
    HttpApiConfig {
        base_url: config.notifications_base_url().to_string(),
        auth_token: config.auth_token(),
        timeout: config.request_timeout(),
        ..HttpApiConfig::default()
    }
}

fn render(snapshot: &Snapshot) {
    let mode = match snapshot.mode {
        Mode::Idle => "idle".white(),
        Mode::Streaming => "streaming".green(),
        Mode::Polling => "polling".yellow(),
        Mode::Disabled => "disabled".red(),
    };
    println!(
        "{} [{}] {} unread",
        "●".blue(),
        mode,
        snapshot.unread_count.to_string().bold()
    );

    for item in &snapshot.recent_items {
        let marker = if item.read { " ".normal() } else { "•".bright_blue() };
        println!(
            "   {} {} {}",
            marker,
            item.id.dimmed(),
            item.title().unwrap_or("(untitled)")
        );
    }
}

async fn wait_for_close(config: &Config) {
    match config.watch_duration() {
        Some(duration) => tokio::time::sleep(duration).await,
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Unable to listen for Ctrl-C: {e}");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::new();
    Logger::init_logger(&config).context("Failed to start logger")?;

    info!(
        "Notification delivery config: base_url={}, poll_interval={}s, request_timeout={}s, eager_fetch_on_open={}",
        config.notifications_base_url(),
        config.poll_interval_secs,
        config.request_timeout_secs,
        config.eager_fetch_on_open,
    );

    let api = HttpNotificationApi::new(http_config(&config))
        .context("Failed to build notification HTTP client")?;
    let manager = Manager::new(Arc::new(api), delivery_config(&config));
    let mut updates = manager.subscribe();

    if config.user_id().is_none() {
        warn!("No user id configured, notifications stay inactive");
    }

    println!("{}", "=== NOTIFICATIONS ===".bright_white().bold());
    manager.activate(config.user_id());
    manager.open_panel().await;
    render(&manager.snapshot());

    let close = wait_for_close(&config);
    tokio::pin!(close);

    loop {
        tokio::select! {
            _ = &mut close => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                render(&snapshot);
            }
        }
    }

    manager.close_panel();
    println!("{}", "Panel closed".dimmed());
    Ok(())
}
