#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use contracts::contracts::{
    Account, AccountInfo, Affordances, Allowance, AttachedMachine, Contract, ContractInfo,
    ContractsApi, CustomerInfoUpdate, CustomerRecord, Invoice, Period, Price, ProductCatalog,
    ProductListing, Purchase, PurchaseAccount, PurchaseAccountRequest, PurchaseRequest,
    PurchasedProductListing, Renewal, RenewalStatus, ResourceEntitlement, Subscription,
    SubscriptionFilters, SubscriptionInfo, SubscriptionStatus,
};
use contracts::{ReconcileError, ReconcileResult};

/// In-memory contracts API. Failures are injected per call key, e.g. `token:c1`.
#[derive(Default)]
pub struct FakeContractsApi {
    pub accounts: Vec<Account>,
    pub contracts: HashMap<String, Vec<Contract>>,
    pub subscriptions: HashMap<String, Vec<Subscription>>,
    pub machines: HashMap<String, usize>,
    pub renewals: HashMap<String, Renewal>,
    pub purchase_account: Option<Account>,
    pub catalog: ProductCatalog,
    pub issued_account: Option<PurchaseAccount>,
    pub customers: HashMap<String, CustomerRecord>,
    pub failures: HashMap<String, fn() -> ReconcileError>,
    pub calls: Mutex<Vec<String>>,
    pub submitted: Mutex<Vec<(PurchaseRequest, bool)>>,
    pub account_requests: Mutex<Vec<PurchaseAccountRequest>>,
    pub customer_updates: Mutex<Vec<(String, CustomerInfoUpdate)>>,
}

impl FakeContractsApi {
    pub fn fail(&mut self, key: &str, error: fn() -> ReconcileError) {
        self.failures.insert(key.to_string(), error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<(PurchaseRequest, bool)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn account_requests(&self) -> Vec<PurchaseAccountRequest> {
        self.account_requests.lock().unwrap().clone()
    }

    pub fn customer_updates(&self) -> Vec<(String, CustomerInfoUpdate)> {
        self.customer_updates.lock().unwrap().clone()
    }

    fn record(&self, key: String) -> ReconcileResult<()> {
        self.calls.lock().unwrap().push(key.clone());
        match self.failures.get(&key) {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContractsApi for FakeContractsApi {
    async fn list_accounts(&self) -> ReconcileResult<Vec<Account>> {
        self.record("accounts".to_string())?;
        Ok(self.accounts.clone())
    }

    async fn list_contracts(&self, account: &Account) -> ReconcileResult<Vec<Contract>> {
        self.record(format!("contracts:{}", account.id))?;
        Ok(self.contracts.get(&account.id).cloned().unwrap_or_default())
    }

    async fn list_subscriptions(
        &self,
        account_id: &str,
        _marketplace: &str,
        filters: &SubscriptionFilters,
    ) -> ReconcileResult<Vec<Subscription>> {
        self.record(format!("subscriptions:{account_id}"))?;
        Ok(self
            .subscriptions
            .get(account_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|subscription| {
                filters
                    .status
                    .map_or(true, |status| subscription.subscription.status == status)
                    && filters
                        .period
                        .map_or(true, |period| subscription.subscription.period == period)
            })
            .collect())
    }

    async fn contract_token(&self, contract_id: &str) -> ReconcileResult<String> {
        self.record(format!("token:{contract_id}"))?;
        Ok(format!("token-{contract_id}"))
    }

    async fn attached_machines(&self, contract_id: &str) -> ReconcileResult<Vec<AttachedMachine>> {
        self.record(format!("machines:{contract_id}"))?;
        let count = self.machines.get(contract_id).copied().unwrap_or(0);
        Ok((0..count)
            .map(|index| AttachedMachine {
                id: format!("{contract_id}-m{index}"),
            })
            .collect())
    }

    async fn renewal(&self, renewal_id: &str) -> ReconcileResult<Renewal> {
        self.record(format!("renewal:{renewal_id}"))?;
        self.renewals
            .get(renewal_id)
            .cloned()
            .ok_or(ReconcileError::NotFound)
    }

    async fn accept_renewal(&self, renewal_id: &str) -> ReconcileResult<()> {
        self.record(format!("accept:{renewal_id}"))
    }

    async fn purchase(&self, purchase_id: &str) -> ReconcileResult<Purchase> {
        self.record(format!("purchase:{purchase_id}"))?;
        Ok(Purchase {
            id: purchase_id.to_string(),
            created_at: Some("2024-03-01T09:30:00Z".to_string()),
            status: Some("done".to_string()),
        })
    }

    async fn submit_purchase(
        &self,
        _marketplace: &str,
        request: &PurchaseRequest,
        preview: bool,
    ) -> ReconcileResult<Purchase> {
        self.submitted
            .lock()
            .unwrap()
            .push((request.clone(), preview));
        self.record(if preview {
            "submit-preview".to_string()
        } else {
            "submit".to_string()
        })?;
        Ok(Purchase {
            id: "pNEW".to_string(),
            created_at: None,
            status: Some("processing".to_string()),
        })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> ReconcileResult<()> {
        self.record(format!("cancel:{subscription_id}"))
    }

    async fn set_auto_renewal(
        &self,
        subscription_id: &str,
        should_auto_renew: bool,
    ) -> ReconcileResult<()> {
        self.record(format!("auto-renew:{subscription_id}:{should_auto_renew}"))
    }

    async fn purchase_account(&self, _marketplace: &str) -> ReconcileResult<Account> {
        self.record("purchase-account".to_string())?;
        self.purchase_account.clone().ok_or(ReconcileError::NotFound)
    }

    async fn product_listings(&self, _marketplace: &str) -> ReconcileResult<ProductCatalog> {
        self.record("product-listings".to_string())?;
        Ok(self.catalog.clone())
    }

    async fn ensure_purchase_account(
        &self,
        marketplace: &str,
        request: &PurchaseAccountRequest,
    ) -> ReconcileResult<PurchaseAccount> {
        self.account_requests.lock().unwrap().push(request.clone());
        self.record(format!("ensure-account:{marketplace}"))?;
        self.issued_account.clone().ok_or(ReconcileError::NotFound)
    }

    async fn customer_info(&self, account_id: &str) -> ReconcileResult<CustomerRecord> {
        self.record(format!("customer-info:{account_id}"))?;
        self.customers
            .get(account_id)
            .cloned()
            .ok_or(ReconcileError::NotFound)
    }

    async fn put_payment_method(
        &self,
        account_id: &str,
        payment_method_id: &str,
    ) -> ReconcileResult<()> {
        self.record(format!("payment-method:{account_id}:{payment_method_id}"))
    }

    async fn put_customer_info(
        &self,
        account_id: &str,
        update: &CustomerInfoUpdate,
    ) -> ReconcileResult<()> {
        self.customer_updates
            .lock()
            .unwrap()
            .push((account_id.to_string(), update.clone()));
        self.record(format!("customer-info-update:{account_id}"))
    }
}

pub fn account(id: &str, name: &str) -> Account {
    Account {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn contract(
    id: &str,
    account_name: &str,
    product_id: &str,
    created_at: &str,
    effective_to: &str,
) -> Contract {
    Contract {
        contract_info: ContractInfo {
            id: id.to_string(),
            origin: None,
            created_at: created_at.to_string(),
            effective_to: effective_to.to_string(),
            resource_entitlements: vec![
                ResourceEntitlement {
                    entitlement_type: "esm-infra".to_string(),
                    affordances: Affordances::default(),
                },
                ResourceEntitlement {
                    entitlement_type: "support".to_string(),
                    affordances: Affordances {
                        support_level: Some("standard".to_string()),
                    },
                },
            ],
            products: vec![product_id.to_string()],
            allowances: vec![Allowance {
                metric: Some("units".to_string()),
                value: 5,
            }],
            renewals: None,
        },
        account_info: AccountInfo {
            id: None,
            name: account_name.to_string(),
        },
    }
}

pub fn free_contract(id: &str, account_name: &str) -> Contract {
    let mut free = contract(
        id,
        account_name,
        "free",
        "2023-01-01T00:00:00Z",
        "2030-01-01T00:00:00Z",
    );
    free.contract_info.origin = Some("free".to_string());
    free
}

pub fn listing(listing_id: &str, product_id: &str, price: i64, quantity: u64) -> PurchasedProductListing {
    PurchasedProductListing {
        product_listing: ProductListing {
            id: listing_id.to_string(),
            product_id: product_id.to_string(),
            name: None,
            price: Some(Price {
                value: price,
                currency: "USD".to_string(),
            }),
        },
        value: quantity,
    }
}

pub fn subscription(
    id: &str,
    period: Period,
    status: SubscriptionStatus,
    last_purchase_id: &str,
    listings: Vec<PurchasedProductListing>,
) -> Subscription {
    Subscription {
        subscription: SubscriptionInfo {
            id: id.to_string(),
            period,
            status,
            end_of_cycle: Some("2024-04-01T00:00:00Z".to_string()),
        },
        last_purchase_id: last_purchase_id.to_string(),
        auto_renew: true,
        pending_purchases: Vec::new(),
        purchased_product_listings: listings,
    }
}

pub fn renewal(id: &str, status: RenewalStatus, start: &str, end: &str, actionable: bool) -> Renewal {
    Renewal {
        id: id.to_string(),
        status,
        start: start.to_string(),
        end: end.to_string(),
        last_modified: None,
        actionable: Some(actionable),
        stripe_invoices: Vec::new(),
    }
}

pub fn invoice(pi_status: &str, subscription_status: &str) -> Invoice {
    Invoice {
        pi_status: pi_status.to_string(),
        subscription_status: subscription_status.to_string(),
    }
}
