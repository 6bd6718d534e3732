use std::time::Duration;

use chrono::Utc;
use contracts::config;
use contracts::contracts::{reconcile, Credential, HttpContractsApi, ReconcileOptions};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let credential = config::CONTRACTS_AUTH_TOKEN
        .clone()
        .map(|token| Credential::new(*config::CONTRACTS_AUTH_SCHEME, token));
    if credential.is_none() {
        tracing::warn!("CONTRACTS_AUTH_TOKEN is not set; requests will be anonymous");
    }

    let api = HttpContractsApi::new(
        config::api_base_url(),
        credential,
        Duration::from_secs(*config::CONTRACTS_HTTP_TIMEOUT_SECS),
    )?;

    let mut options = ReconcileOptions::new(config::CONTRACTS_MARKETPLACE.as_str(), Utc::now());
    if let Some(open_subscription) = std::env::args().nth(1) {
        options = options.with_open_subscription(open_subscription);
    }

    tracing::info!(
        api_url = config::api_base_url(),
        marketplace = %options.marketplace,
        scheme = config::CONTRACTS_AUTH_SCHEME.as_str(),
        "reconciling contracts"
    );
    let view = match reconcile(&api, &options).await {
        Ok(view) => view,
        Err(err) if err.is_unauthorized() => {
            tracing::error!("contracts API credential is stale; re-authenticate and retry");
            return Err(Box::new(err) as Box<dyn std::error::Error>);
        }
        Err(err) => {
            tracing::error!(?err, "reconciliation failed");
            return Err(Box::new(err) as Box<dyn std::error::Error>);
        }
    };

    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
