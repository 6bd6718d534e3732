use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{ReconcileError, ReconcileResult};

use super::api::ContractsApi;
use super::classifier::PreviousPurchaseIds;
use super::models::{Account, Product, ProductListing, SubscriptionFilters};

#[derive(Debug, Clone, Serialize)]
pub struct ShopListing {
    pub listing: ProductListing,
    pub product: Product,
}

/// key: contracts-shop -> purchasable listings for the caller
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShopView {
    /// `None` until the caller makes a first purchase.
    pub account: Option<Account>,
    pub previous_purchase_ids: PreviousPurchaseIds,
    pub listings: Vec<ShopListing>,
}

impl ShopView {
    /// A marketplace without priced listings has not been opened yet.
    pub fn is_open(&self) -> bool {
        !self.listings.is_empty()
    }
}

pub async fn load_shop(api: &dyn ContractsApi, marketplace: &str) -> ReconcileResult<ShopView> {
    let account = match api.purchase_account(marketplace).await {
        Ok(account) => Some(account),
        Err(err) if err.is_not_found() => {
            debug!(%marketplace, "no purchase account yet");
            None
        }
        Err(err) => return Err(err),
    };

    let mut previous_purchase_ids = PreviousPurchaseIds::default();
    if let Some(account) = &account {
        let subscriptions = api
            .list_subscriptions(&account.id, marketplace, &SubscriptionFilters::active())
            .await?;
        for subscription in &subscriptions {
            previous_purchase_ids.record(
                subscription.subscription.period,
                &subscription.last_purchase_id,
            );
        }
    }

    let catalog = api.product_listings(marketplace).await?;
    let products: HashMap<&str, &Product> = catalog
        .products
        .iter()
        .map(|product| (product.id.as_str(), product))
        .collect();

    let mut listings = Vec::new();
    for listing in &catalog.product_listings {
        if listing.price.is_none() {
            continue;
        }
        let product = products.get(listing.product_id.as_str()).ok_or_else(|| {
            ReconcileError::data(format!(
                "listing {} references unknown product {}",
                listing.id, listing.product_id
            ))
        })?;
        listings.push(ShopListing {
            listing: listing.clone(),
            product: (*product).clone(),
        });
    }

    Ok(ShopView {
        account,
        previous_purchase_ids,
        listings,
    })
}
