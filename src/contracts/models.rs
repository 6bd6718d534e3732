use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, ReconcileResult};

/// key: contracts-models -> accounts,contracts,renewals,subscriptions,purchases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub contract_info: ContractInfo,
    pub account_info: AccountInfo,
}

impl Contract {
    pub fn id(&self) -> &str {
        &self.contract_info.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    pub id: String,
    #[serde(default)]
    pub origin: Option<String>,
    pub created_at: String,
    pub effective_to: String,
    #[serde(default)]
    pub resource_entitlements: Vec<ResourceEntitlement>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub allowances: Vec<Allowance>,
    #[serde(default)]
    pub renewals: Option<Vec<Renewal>>,
}

impl ContractInfo {
    pub fn is_free(&self) -> bool {
        self.origin.as_deref() == Some("free")
    }

    pub fn product_id(&self) -> ReconcileResult<&str> {
        self.products
            .first()
            .map(String::as_str)
            .ok_or_else(|| ReconcileError::data(format!("contract {} has no products", self.id)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntitlement {
    #[serde(rename = "type")]
    pub entitlement_type: String,
    #[serde(default)]
    pub affordances: Affordances,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Affordances {
    #[serde(default, rename = "supportLevel")]
    pub support_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allowance {
    #[serde(default)]
    pub metric: Option<String>,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenewalStatus {
    Pending,
    Processing,
    Done,
    Closed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Renewal {
    pub id: String,
    pub status: RenewalStatus,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub actionable: Option<bool>,
    #[serde(default)]
    pub stripe_invoices: Vec<Invoice>,
}

/// Payment-intent snapshot attached to a processing renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub pi_status: String,
    pub subscription_status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Monthly,
    Yearly,
    #[serde(other)]
    Unknown,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Monthly => "monthly",
            Period::Yearly => "yearly",
            Period::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Locked,
    #[serde(other)]
    Other,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Locked => "locked",
            SubscriptionStatus::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub subscription: SubscriptionInfo,
    #[serde(rename = "lastPurchaseID")]
    pub last_purchase_id: String,
    #[serde(default)]
    pub auto_renew: bool,
    #[serde(default)]
    pub pending_purchases: Vec<String>,
    #[serde(default)]
    pub purchased_product_listings: Vec<PurchasedProductListing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub id: String,
    pub period: Period,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub end_of_cycle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedProductListing {
    pub product_listing: ProductListing,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListing {
    pub id: String,
    #[serde(rename = "productID")]
    pub product_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
}

/// Unit price in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub value: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCatalog {
    #[serde(default)]
    pub product_listings: Vec<ProductListing>,
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachedMachine {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// key: contracts-purchase-request -> marketplace purchase body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    #[serde(rename = "accountID")]
    pub account_id: String,
    #[serde(rename = "purchaseItems")]
    pub items: Vec<PurchaseItem>,
    #[serde(rename = "previousPurchaseID")]
    pub previous_purchase_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    #[serde(rename = "productListingID")]
    pub product_listing_id: String,
    pub metric: String,
    pub value: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub delete: bool,
}

/// Account returned when ensuring a purchase account exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Guest credential, only issued to callers that are not signed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Opaque payment-method reference as the contracts API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodRef {
    #[serde(rename = "Id")]
    pub id: String,
}

impl PaymentMethodRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseAccountRequest {
    #[serde(default)]
    pub email: String,
    #[serde(rename = "name", default)]
    pub account_name: String,
    #[serde(rename = "defaultPaymentMethod")]
    pub payment_method: PaymentMethodRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub last4: Option<String>,
    #[serde(default)]
    pub exp_month: Option<u32>,
    #[serde(default)]
    pub exp_year: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxId {
    #[serde(rename = "type")]
    pub tax_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default, rename = "taxID")]
    pub tax_id: Option<TaxId>,
    #[serde(default)]
    pub default_payment_method: Option<PaymentMethod>,
}

/// key: contracts-customer -> billing customer attached to an account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    #[serde(default)]
    pub customer_info: Option<CustomerInfo>,
    #[serde(default)]
    pub account_info: Option<Account>,
}

/// Body of a customer-info update; the payment method is always sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerInfoUpdate {
    #[serde(rename = "defaultPaymentMethod")]
    pub payment_method: PaymentMethodRef,
    #[serde(rename = "paymentMethodID")]
    pub payment_method_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "taxID", skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<TaxId>,
}

impl CustomerInfoUpdate {
    pub fn new(payment_method_id: impl Into<String>) -> Self {
        let payment_method_id = payment_method_id.into();
        Self {
            payment_method: PaymentMethodRef::new(payment_method_id.clone()),
            payment_method_id,
            address: None,
            name: None,
            tax_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilters {
    pub status: Option<SubscriptionStatus>,
    pub period: Option<Period>,
}

impl SubscriptionFilters {
    pub fn active() -> Self {
        Self {
            status: Some(SubscriptionStatus::Active),
            period: None,
        }
    }

    pub fn active_monthly() -> Self {
        Self {
            status: Some(SubscriptionStatus::Active),
            period: Some(Period::Monthly),
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, &'static str)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str()));
        }
        if let Some(period) = self.period {
            pairs.push(("period", period.as_str()));
        }
        pairs
    }
}

pub fn parse_timestamp(field: &str, value: &str) -> ReconcileResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| ReconcileError::data(format!("malformed {field} timestamp '{value}': {err}")))
}
