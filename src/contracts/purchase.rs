use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::PURCHASE_METRIC;
use crate::error::{ReconcileError, ReconcileResult};

use super::api::ContractsApi;
use super::models::{
    Period, Purchase, PurchaseItem, PurchaseRequest, Subscription, SubscriptionFilters,
};

/// Additional quantity requested for one product listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedProduct {
    pub product_listing_id: String,
    pub quantity: u64,
}

/// Currently subscribed quantity keyed by product-listing id.
pub type SubscribedQuantities = BTreeMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub account_id: String,
    pub previous_purchase_id: String,
    pub period: Period,
    pub products: Vec<RequestedProduct>,
    /// Guest checkouts have no subscriptions to look up yet.
    #[serde(default)]
    pub guest: bool,
}

pub fn subscribed_quantities(subscription: &Subscription) -> SubscribedQuantities {
    subscription
        .purchased_product_listings
        .iter()
        .map(|listing| (listing.product_listing.id.clone(), listing.value))
        .collect()
}

/// key: contracts-purchase-builder -> absolute target quantities
///
/// Each item carries the existing subscribed quantity plus the requested delta; the billing API
/// never receives raw deltas.
pub fn build_purchase_request(
    account_id: &str,
    previous_purchase_id: &str,
    existing: &SubscribedQuantities,
    requested: &[RequestedProduct],
) -> ReconcileResult<PurchaseRequest> {
    let items = requested
        .iter()
        .map(|product| {
            let current = existing
                .get(&product.product_listing_id)
                .copied()
                .unwrap_or(0);
            let value = current.checked_add(product.quantity).ok_or_else(|| {
                ReconcileError::InvalidRequest(format!(
                    "quantity for listing {} overflows",
                    product.product_listing_id
                ))
            })?;
            Ok(PurchaseItem {
                product_listing_id: product.product_listing_id.clone(),
                metric: PURCHASE_METRIC.to_string(),
                value,
                delete: false,
            })
        })
        .collect::<ReconcileResult<Vec<_>>>()?;

    Ok(PurchaseRequest {
        account_id: account_id.to_string(),
        items,
        previous_purchase_id: previous_purchase_id.to_string(),
    })
}

/// Builds the purchase from the account's live quantities and submits it, or previews it.
pub async fn submit_purchase(
    api: &dyn ContractsApi,
    marketplace: &str,
    order: &PurchaseOrder,
    preview: bool,
) -> ReconcileResult<Purchase> {
    if order.account_id.is_empty() {
        return Err(ReconcileError::InvalidRequest("account_id required".to_string()));
    }
    if order.products.is_empty() {
        return Err(ReconcileError::InvalidRequest("products required".to_string()));
    }

    let existing = if order.guest {
        SubscribedQuantities::new()
    } else {
        let subscriptions = api
            .list_subscriptions(&order.account_id, marketplace, &SubscriptionFilters::active())
            .await?;
        subscriptions
            .iter()
            .filter(|subscription| subscription.subscription.period == order.period)
            .last()
            .map(subscribed_quantities)
            .unwrap_or_default()
    };

    let request = build_purchase_request(
        &order.account_id,
        &order.previous_purchase_id,
        &existing,
        &order.products,
    )?;

    match api.submit_purchase(marketplace, &request, preview).await {
        Ok(purchase) => {
            info!(
                account_id = %order.account_id,
                purchase_id = %purchase.id,
                preview,
                items = request.items.len(),
                "purchase submitted"
            );
            Ok(purchase)
        }
        Err(err) => {
            error!(?err, ?request, preview, "purchase request rejected");
            Err(err)
        }
    }
}
