use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::PURCHASE_METRIC;
use crate::error::{ReconcileError, ReconcileResult};

use super::api::ContractsApi;
use super::models::{Purchase, PurchaseItem, PurchaseRequest, SubscriptionFilters};

/// key: contracts-cancellation -> which path removed the listings
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancellationOutcome {
    Purchased { purchase: Purchase },
    SubscriptionCancelled { subscription_id: String },
}

pub fn build_cancellation_request(
    account_id: &str,
    previous_purchase_id: &str,
    listing_ids: &[String],
) -> PurchaseRequest {
    PurchaseRequest {
        account_id: account_id.to_string(),
        items: listing_ids
            .iter()
            .map(|listing_id| PurchaseItem {
                product_listing_id: listing_id.clone(),
                metric: PURCHASE_METRIC.to_string(),
                value: 0,
                delete: true,
            })
            .collect(),
        previous_purchase_id: previous_purchase_id.to_string(),
    }
}

/// Removes listings through a zero-quantity purchase. When the API refuses because that would
/// drop the last contract, the account's active monthly subscription is cancelled instead.
pub async fn resolve_cancellation(
    api: &dyn ContractsApi,
    marketplace: &str,
    account_id: &str,
    previous_purchase_id: &str,
    listing_ids: &[String],
) -> ReconcileResult<CancellationOutcome> {
    if account_id.is_empty() || previous_purchase_id.is_empty() || listing_ids.is_empty() {
        return Err(ReconcileError::InvalidRequest(
            "account_id, previous_purchase_id and product_listings are required".to_string(),
        ));
    }

    let request = build_cancellation_request(account_id, previous_purchase_id, listing_ids);
    match api.submit_purchase(marketplace, &request, false).await {
        Ok(purchase) => {
            info!(%account_id, purchase_id = %purchase.id, "listings removed");
            Ok(CancellationOutcome::Purchased { purchase })
        }
        Err(ReconcileError::LastContractCannotBeCancelled) => {
            warn!(%account_id, "last contract cannot be removed; cancelling subscription");
            cancel_monthly_subscription(api, marketplace, account_id).await
        }
        Err(err) => {
            error!(?err, ?request, "cancellation purchase rejected");
            Err(err)
        }
    }
}

async fn cancel_monthly_subscription(
    api: &dyn ContractsApi,
    marketplace: &str,
    account_id: &str,
) -> ReconcileResult<CancellationOutcome> {
    let subscriptions = api
        .list_subscriptions(account_id, marketplace, &SubscriptionFilters::active_monthly())
        .await?;
    let subscription = subscriptions.first().ok_or_else(|| {
        ReconcileError::NoActiveMonthlySubscription {
            account_id: account_id.to_string(),
        }
    })?;

    let subscription_id = subscription.subscription.id.clone();
    api.cancel_subscription(&subscription_id).await?;
    info!(%account_id, %subscription_id, "subscription cancelled");
    Ok(CancellationOutcome::SubscriptionCancelled { subscription_id })
}
