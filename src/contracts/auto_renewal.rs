use futures_util::future::try_join_all;
use tracing::info;

use crate::error::{ReconcileError, ReconcileResult};

use super::api::ContractsApi;
use super::models::{Account, SubscriptionFilters};

/// key: contracts-auto-renewal -> toggle across every monthly subscription
///
/// Returns how many subscriptions were updated.
pub async fn set_auto_renewal(
    api: &dyn ContractsApi,
    marketplace: &str,
    should_auto_renew: bool,
) -> ReconcileResult<usize> {
    if !should_auto_renew {
        return Err(ReconcileError::InvalidRequest(
            "should_auto_renew required".to_string(),
        ));
    }

    let accounts = api.list_accounts().await?;
    let updated = try_join_all(
        accounts
            .iter()
            .map(|account| update_account(api, marketplace, account, should_auto_renew)),
    )
    .await?;

    let total: usize = updated.iter().sum();
    info!(accounts = accounts.len(), subscriptions = total, "auto-renewal updated");
    Ok(total)
}

async fn update_account(
    api: &dyn ContractsApi,
    marketplace: &str,
    account: &Account,
    should_auto_renew: bool,
) -> ReconcileResult<usize> {
    let subscriptions = api
        .list_subscriptions(&account.id, marketplace, &SubscriptionFilters::active_monthly())
        .await
        .map_err(|err| err.for_account(&account.id))?;

    for subscription in &subscriptions {
        api.set_auto_renewal(&subscription.subscription.id, should_auto_renew)
            .await
            .map_err(|err| err.for_account(&account.id))?;
    }
    Ok(subscriptions.len())
}
