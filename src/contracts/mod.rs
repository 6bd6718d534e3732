//! Reconciliation of accounts, contracts, subscriptions and renewals from the contracts API.

pub mod api;
pub mod auto_renewal;
pub mod cancellation;
pub mod classifier;
pub mod customer;
pub mod http;
pub mod merge;
pub mod models;
pub mod purchase;
pub mod renewal;
pub mod shop;
pub mod usage;

pub use api::ContractsApi;
pub use auto_renewal::set_auto_renewal;
pub use cancellation::{build_cancellation_request, resolve_cancellation, CancellationOutcome};
pub use classifier::{
    classify_subscriptions, ClassifiedSubscriptions, MonthlySummary, NextPayment,
    PreviousPurchaseIds, PurchasedProduct, PurchasedProducts,
};
pub use customer::{
    ensure_purchase_account, load_customer_info, load_payment_methods,
    set_default_payment_method, update_customer_info, PaymentMethodsView,
};
pub use http::{AuthScheme, Credential, HttpContractsApi};
pub use merge::{
    reconcile, reconcile_accounts, ContractStatus, ContractView, MergedView, PersonalAccount,
    ReconcileOptions, ReconcileWarning,
};
pub use models::{
    Account, AccountInfo, Address, Affordances, Allowance, AttachedMachine, Contract,
    ContractInfo, CustomerInfo, CustomerInfoUpdate, CustomerRecord, Invoice, PaymentMethod,
    PaymentMethodRef, Period, Price, Product, ProductCatalog, ProductListing, Purchase,
    PurchaseAccount, PurchaseAccountRequest, PurchaseItem, PurchaseRequest,
    PurchasedProductListing, Renewal, RenewalStatus, ResourceEntitlement, Subscription,
    SubscriptionFilters, SubscriptionInfo, SubscriptionStatus, TaxId,
};
pub use purchase::{
    build_purchase_request, submit_purchase, PurchaseOrder, RequestedProduct,
    SubscribedQuantities,
};
pub use renewal::{accept_renewal, evaluate_renewal, RenewalView};
pub use shop::{load_shop, ShopListing, ShopView};
pub use usage::{machine_usage, MachineUsage};
