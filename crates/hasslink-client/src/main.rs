//! hasslink demo binary.
//!
//! Connects with credentials from the environment, logs the server version,
//! and streams events to stdout until interrupted. Reconnects transparently:
//! when an event stream dies with its epoch, a fresh subscription is made on
//! the next ready connection.

use tracing_subscriber::{fmt, EnvFilter};

use hasslink_client::{config, Client};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = config::from_env().expect("HASSLINK_HOST and HASSLINK_TOKEN must be set");
    let client = Client::connect(cfg).await.expect("session establishment failed");
    tracing::info!(
        version = client.server_version().unwrap_or("unknown"),
        "session established"
    );

    loop {
        let mut events = match client.subscribe_events(None).await {
            Ok(stream) => stream,
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "subscribe interrupted, retrying");
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "subscribe failed");
                break;
            }
        };
        while let Some(event) = events.next().await {
            println!("{}", event.get());
        }
        tracing::warn!("event stream ended, resubscribing");
    }
}
