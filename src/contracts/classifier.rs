use std::collections::BTreeMap;

use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::warn;

use crate::config::DISPLAY_DATE_FORMAT;
use crate::error::{ReconcileError, ReconcileResult};

use super::api::ContractsApi;
use super::models::{
    parse_timestamp, Period, Price, PurchasedProductListing, Subscription, SubscriptionStatus,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchasedProduct {
    pub quantity: u64,
    pub price: Price,
}

/// Purchased quantity and unit price keyed by product id.
pub type PurchasedProducts = BTreeMap<String, PurchasedProduct>;

/// key: contracts-previous-purchase -> optimistic concurrency tokens per period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviousPurchaseIds {
    pub monthly: String,
    pub yearly: String,
}

impl PreviousPurchaseIds {
    pub fn record(&mut self, period: Period, purchase_id: &str) {
        match period {
            Period::Monthly => self.monthly = purchase_id.to_string(),
            Period::Yearly => self.yearly = purchase_id.to_string(),
            Period::Unknown => {}
        }
    }

    pub fn get(&self, period: Period) -> Option<&str> {
        let value = match period {
            Period::Monthly => &self.monthly,
            Period::Yearly => &self.yearly,
            Period::Unknown => return None,
        };
        Some(value.as_str()).filter(|value| !value.is_empty())
    }

    /// Later non-empty ids replace earlier ones.
    pub fn merge(&mut self, later: &PreviousPurchaseIds) {
        if !later.monthly.is_empty() {
            self.monthly = later.monthly.clone();
        }
        if !later.yearly.is_empty() {
            self.yearly = later.yearly.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextPayment {
    pub date: String,
    /// `None` when the subscription has no purchased listings.
    pub amount: Option<String>,
}

/// key: contracts-monthly-summary -> aggregate of monthly subscriptions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub total_subscriptions: u64,
    pub has_monthly: bool,
    pub subscription_id: Option<String>,
    pub is_auto_renewal_enabled: bool,
    pub last_payment_date: Option<String>,
    pub current_subscription_no: u64,
    pub next_payment: Option<NextPayment>,
}

impl MonthlySummary {
    /// Totals accumulate; per-subscription fields follow the latest monthly subscription.
    pub fn merge(&mut self, later: MonthlySummary) {
        self.total_subscriptions += later.total_subscriptions;
        if !later.has_monthly {
            return;
        }
        self.has_monthly = true;
        self.subscription_id = later.subscription_id;
        self.is_auto_renewal_enabled = later.is_auto_renewal_enabled;
        self.last_payment_date = later.last_payment_date;
        self.current_subscription_no = later.current_subscription_no;
        self.next_payment = later.next_payment;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifiedSubscriptions {
    pub monthly: PurchasedProducts,
    pub yearly: PurchasedProducts,
    pub monthly_summary: MonthlySummary,
    pub previous_purchase_ids: PreviousPurchaseIds,
    pub payment_method_warning: bool,
}

/// Buckets subscriptions by period. No I/O.
pub fn partition(
    subscriptions: &[Subscription],
) -> ReconcileResult<(ClassifiedSubscriptions, Vec<&Subscription>)> {
    let mut classified = ClassifiedSubscriptions::default();
    let mut monthly = Vec::new();

    for subscription in subscriptions {
        let info = &subscription.subscription;
        if info.period == Period::Monthly
            && matches!(
                info.status,
                SubscriptionStatus::Active | SubscriptionStatus::Locked
            )
            && !subscription.pending_purchases.is_empty()
        {
            classified.payment_method_warning = true;
        }

        classified
            .previous_purchase_ids
            .record(info.period, &subscription.last_purchase_id);

        let bucket = match info.period {
            Period::Monthly => {
                monthly.push(subscription);
                &mut classified.monthly
            }
            Period::Yearly => &mut classified.yearly,
            Period::Unknown => {
                warn!(subscription_id = %info.id, "skipping subscription with unknown period");
                continue;
            }
        };
        for listing in &subscription.purchased_product_listings {
            let price = listing_price(listing)?;
            bucket.insert(
                listing.product_listing.product_id.clone(),
                PurchasedProduct {
                    quantity: listing.value,
                    price,
                },
            );
        }
    }

    Ok((classified, monthly))
}

/// Partitions an account's subscriptions and builds the monthly summary.
pub async fn classify_subscriptions(
    api: &dyn ContractsApi,
    subscriptions: &[Subscription],
) -> ReconcileResult<ClassifiedSubscriptions> {
    let (mut classified, monthly) = partition(subscriptions)?;

    let summaries = try_join_all(
        monthly
            .into_iter()
            .map(|subscription| summarize_monthly(api, subscription)),
    )
    .await?;
    for summary in summaries {
        classified.monthly_summary.merge(summary);
    }

    Ok(classified)
}

async fn summarize_monthly(
    api: &dyn ContractsApi,
    subscription: &Subscription,
) -> ReconcileResult<MonthlySummary> {
    let listings = &subscription.purchased_product_listings;
    let last_purchase = api.purchase(&subscription.last_purchase_id).await?;
    let created_at = last_purchase.created_at.as_deref().ok_or_else(|| {
        ReconcileError::data(format!(
            "purchase {} has no createdAt",
            subscription.last_purchase_id
        ))
    })?;
    let last_payment = parse_timestamp("purchase createdAt", created_at)?;

    let end_of_cycle = subscription
        .subscription
        .end_of_cycle
        .as_deref()
        .ok_or_else(|| {
            ReconcileError::data(format!(
                "subscription {} has no endOfCycle",
                subscription.subscription.id
            ))
        })?;
    let next_payment_date = parse_timestamp("subscription endOfCycle", end_of_cycle)?;

    Ok(MonthlySummary {
        total_subscriptions: listings.len() as u64,
        has_monthly: true,
        subscription_id: Some(subscription.subscription.id.clone()),
        is_auto_renewal_enabled: subscription.auto_renew,
        last_payment_date: Some(last_payment.format(DISPLAY_DATE_FORMAT).to_string()),
        current_subscription_no: listings.len() as u64,
        next_payment: Some(NextPayment {
            date: next_payment_date.format(DISPLAY_DATE_FORMAT).to_string(),
            amount: payment_total(listings)?,
        }),
    })
}

/// Renders Σ(unit price × quantity) as `"<major units> <currency>"`.
pub fn payment_total(listings: &[PurchasedProductListing]) -> ReconcileResult<Option<String>> {
    let Some(first) = listings.first() else {
        return Ok(None);
    };
    let currency = listing_price(first)?.currency;

    let mut total: i64 = 0;
    for listing in listings {
        let price = listing_price(listing)?.value;
        total = i64::try_from(listing.value)
            .ok()
            .and_then(|quantity| price.checked_mul(quantity))
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| {
                ReconcileError::data(format!(
                    "payment total overflows at listing {}",
                    listing.product_listing.id
                ))
            })?;
    }
    Ok(Some(format!("{} {}", format_minor_units(total), currency)))
}

/// Renders minor units as `<major>.<cents>` without going through floating point.
fn format_minor_units(total: i64) -> String {
    let sign = if total < 0 { "-" } else { "" };
    let magnitude = total.unsigned_abs();
    format!("{sign}{}.{:02}", magnitude / 100, magnitude % 100)
}

fn listing_price(listing: &PurchasedProductListing) -> ReconcileResult<Price> {
    listing.product_listing.price.clone().ok_or_else(|| {
        ReconcileError::data(format!(
            "purchased listing {} has no price",
            listing.product_listing.id
        ))
    })
}
