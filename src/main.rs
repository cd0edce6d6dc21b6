use clap::Parser;
use minecraft_idle_proxy::{
    auth::{AuthError, CredentialStore, Credentials, SessionService},
    config::Config,
    session,
};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::sleep};
use tracing_subscriber::EnvFilter;

/// Backoff after a failed authentication; the auth server rate-limits
/// aggressive retries.
const AUTH_BACKOFF: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let config = Config::parse();

    // The listener is bound once and lives across reconnects.
    let listener = Arc::new(
        TcpListener::bind((config.bind_address.as_str(), config.listen_port)).await?,
    );
    tracing::info!(
        "listening for clients on {}:{}",
        config.bind_address,
        config.listen_port
    );

    let service = SessionService::new();
    let store = CredentialStore::new(config.credentials_file.clone());

    // Session tokens can be invalidated at any moment by a concurrent
    // login from the real client, so every reconnect re-checks them.
    loop {
        let credentials = match ensure_credentials(&service, &store, &config).await {
            Ok(credentials) => credentials,
            Err(e) => {
                if config.username.is_none() || config.password.is_none() {
                    tracing::error!("cannot re-authenticate without a username and password");
                    return Err(e.into());
                }
                tracing::warn!("authentication failed: {e}");
                sleep(AUTH_BACKOFF).await;
                continue;
            }
        };

        match session::run(&config, Arc::clone(&listener), &service, &credentials).await {
            Ok(()) => tracing::info!("session ended"),
            Err(e) => tracing::warn!("session ended: {e:#}"),
        }
        tracing::info!("reconnecting in {} seconds", config.reconnect_seconds);
        sleep(Duration::from_secs(config.reconnect_seconds)).await;
    }
}

/// Loads cached credentials if they are still valid, else performs a
/// fresh authentication with the configured username and password.
async fn ensure_credentials(
    service: &SessionService,
    store: &CredentialStore,
    config: &Config,
) -> Result<Credentials, AuthError> {
    match store.load() {
        Ok(credentials) => {
            if service.validate(&credentials).await? {
                tracing::info!("cached session for {} is valid", credentials.selected_profile.name);
                return Ok(credentials);
            }
            tracing::info!("cached session is no longer valid");
            store.delete()?;
        }
        Err(AuthError::NotFound) => {}
        Err(e) => return Err(e),
    }

    let (username, password) = match (&config.username, &config.password) {
        (Some(username), Some(password)) => (username, password),
        _ => return Err(AuthError::NotFound),
    };
    let credentials = service.authenticate(username, password).await?;
    store.save(&credentials)?;
    tracing::info!("authenticated as {}", credentials.selected_profile.name);
    Ok(credentials)
}
