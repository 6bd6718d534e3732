use async_trait::async_trait;

use crate::error::ReconcileResult;

use super::models::{
    Account, AttachedMachine, Contract, CustomerInfoUpdate, CustomerRecord, ProductCatalog,
    Purchase, PurchaseAccount, PurchaseAccountRequest, PurchaseRequest, Renewal, Subscription,
    SubscriptionFilters,
};

/// key: contracts-api -> billing collaborator
///
/// Every reconciliation step talks to the contracts service through this trait. Implementations
/// report failures with the shared taxonomy: `Unauthorized`, `NotFound`,
/// `LastContractCannotBeCancelled`, `RemoteFailure` and `DataError`.
#[async_trait]
pub trait ContractsApi: Send + Sync {
    async fn list_accounts(&self) -> ReconcileResult<Vec<Account>>;

    async fn list_contracts(&self, account: &Account) -> ReconcileResult<Vec<Contract>>;

    async fn list_subscriptions(
        &self,
        account_id: &str,
        marketplace: &str,
        filters: &SubscriptionFilters,
    ) -> ReconcileResult<Vec<Subscription>>;

    async fn contract_token(&self, contract_id: &str) -> ReconcileResult<String>;

    async fn attached_machines(&self, contract_id: &str) -> ReconcileResult<Vec<AttachedMachine>>;

    async fn renewal(&self, renewal_id: &str) -> ReconcileResult<Renewal>;

    async fn accept_renewal(&self, renewal_id: &str) -> ReconcileResult<()>;

    async fn purchase(&self, purchase_id: &str) -> ReconcileResult<Purchase>;

    async fn submit_purchase(
        &self,
        marketplace: &str,
        request: &PurchaseRequest,
        preview: bool,
    ) -> ReconcileResult<Purchase>;

    async fn cancel_subscription(&self, subscription_id: &str) -> ReconcileResult<()>;

    async fn set_auto_renewal(
        &self,
        subscription_id: &str,
        should_auto_renew: bool,
    ) -> ReconcileResult<()>;

    /// The caller's purchase account on `marketplace`; `NotFound` when none exists yet.
    async fn purchase_account(&self, marketplace: &str) -> ReconcileResult<Account>;

    async fn product_listings(&self, marketplace: &str) -> ReconcileResult<ProductCatalog>;

    /// Creates the purchase account on `marketplace`, or returns the existing one.
    async fn ensure_purchase_account(
        &self,
        marketplace: &str,
        request: &PurchaseAccountRequest,
    ) -> ReconcileResult<PurchaseAccount>;

    /// `NotFound` when the account has no billing customer yet.
    async fn customer_info(&self, account_id: &str) -> ReconcileResult<CustomerRecord>;

    async fn put_payment_method(
        &self,
        account_id: &str,
        payment_method_id: &str,
    ) -> ReconcileResult<()>;

    async fn put_customer_info(
        &self,
        account_id: &str,
        update: &CustomerInfoUpdate,
    ) -> ReconcileResult<()>;
}
