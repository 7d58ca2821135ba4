#![allow(clippy::expect_used, clippy::uninlined_format_args)]
//! Example: log in, select INBOX, idle briefly and log out.
//!
//! ## Running
//!
//! ```bash
//! IMAP_HOST=imap.example.com IMAP_USER=me@example.com IMAP_PASSWORD=secret \
//!     RUST_LOG=mailwire_imap=trace \
//!     cargo run --package mailwire-imap --example plain_session
//! ```
//!
//! Set `IMAP_PLAIN=1` to connect without TLS on port 143 (for local test
//! servers only).

use std::time::Duration;

use mailwire_imap::handler::LoggingHandler;
use mailwire_imap::{Client, Config, Credentials, Security};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailwire_imap=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = std::env::var("IMAP_HOST").expect("IMAP_HOST is not set");
    let user = std::env::var("IMAP_USER").expect("IMAP_USER is not set");
    let password = std::env::var("IMAP_PASSWORD").expect("IMAP_PASSWORD is not set");
    let security = if std::env::var_os("IMAP_PLAIN").is_some() {
        Security::None
    } else {
        Security::Implicit
    };

    let config = Config::builder(host)
        .security(security)
        .connect_timeout(Duration::from_secs(15))
        .build();
    info!(address = %config.address(), "connecting");

    let mut client = Client::open_and_login(&config, &Credentials::new(user, password)).await?;
    client.add_handler(LoggingHandler);
    println!("Capabilities: {}", client.capabilities().join(" "));

    let inbox = client.select("INBOX").await?;
    println!(
        "INBOX: {} messages, UIDVALIDITY {:?}, read-only: {}",
        inbox.exists(),
        inbox.status().uid_validity,
        inbox.is_read_only()
    );

    if client.has_capability("IDLE") {
        println!("Idling for 10 seconds...");
        let updates = client.idle(Duration::from_secs(10)).await?;
        println!("{} updates while idling", updates.len());
    }

    client.logout().await?;
    println!("Logged out");
    Ok(())
}
