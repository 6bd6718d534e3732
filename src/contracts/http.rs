use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::error::{ReconcileError, ReconcileResult};

use super::api::ContractsApi;
use super::models::{
    Account, AttachedMachine, Contract, CustomerInfoUpdate, CustomerRecord, PaymentMethodRef,
    ProductCatalog, Purchase, PurchaseAccount, PurchaseAccountRequest, PurchaseRequest, Renewal,
    Subscription, SubscriptionFilters,
};

/// Message the contracts API returns when a purchase would drop the last contract.
const LAST_CONTRACT_MESSAGE: &str = "cannot remove all subscription items";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Macaroon,
    Bearer,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Macaroon => "macaroon",
            AuthScheme::Bearer => "bearer",
        }
    }
}

#[derive(Clone)]
pub struct Credential {
    scheme: AuthScheme,
    token: String,
}

impl Credential {
    pub fn new(scheme: AuthScheme, token: impl Into<String>) -> Self {
        Self {
            scheme,
            token: token.into(),
        }
    }

    fn header_value(&self) -> String {
        match self.scheme {
            AuthScheme::Macaroon => format!("Macaroon root={}", self.token),
            AuthScheme::Bearer => format!("Bearer {}", self.token),
        }
    }
}

/// key: contracts-http -> REST collaborator
#[derive(Clone)]
pub struct HttpContractsApi {
    client: reqwest::Client,
    base_url: String,
    credential: Option<Credential>,
}

#[derive(Deserialize)]
struct AccountsEnvelope {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Deserialize)]
struct ContractsEnvelope {
    #[serde(default)]
    contracts: Vec<Contract>,
}

#[derive(Deserialize)]
struct SubscriptionsEnvelope {
    #[serde(default)]
    subscriptions: Vec<Subscription>,
}

#[derive(Deserialize)]
struct MachinesEnvelope {
    #[serde(default)]
    machines: Vec<AttachedMachine>,
}

#[derive(Deserialize)]
struct TokenEnvelope {
    #[serde(rename = "contractToken")]
    contract_token: String,
}

impl HttpContractsApi {
    pub fn new(
        base_url: impl Into<String>,
        credential: Option<Credential>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let base_url = base_url.into();
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("invalid contracts API url '{base_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("contracts API url must be http or https, got '{}'", parsed.scheme());
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build contracts API client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/v1/{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.endpoint(path));
        match &self.credential {
            Some(credential) => {
                request.header(reqwest::header::AUTHORIZATION, credential.header_value())
            }
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ReconcileResult<Response> {
        let response = request.send().await.map_err(transport_failure)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => format!("failed to read response body: {err}"),
        };
        tracing::debug!(status = status.as_u16(), %body, "contracts API rejected request");
        Err(classify_failure(status, body))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> ReconcileResult<T> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ReconcileError::data(format!("failed to decode {what}: {err}")))
    }
}

fn transport_failure(err: reqwest::Error) -> ReconcileError {
    ReconcileError::RemoteFailure {
        status: err.status().map(|status| status.as_u16()),
        body: err.to_string(),
    }
}

fn classify_failure(status: StatusCode, body: String) -> ReconcileError {
    match status {
        StatusCode::UNAUTHORIZED => ReconcileError::Unauthorized,
        StatusCode::NOT_FOUND => ReconcileError::NotFound,
        _ if is_last_contract_rejection(&body) => ReconcileError::LastContractCannotBeCancelled,
        _ => ReconcileError::RemoteFailure {
            status: Some(status.as_u16()),
            body,
        },
    }
}

fn is_last_contract_rejection(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(Value::as_str)
                .map(|message| message.contains(LAST_CONTRACT_MESSAGE))
        })
        .unwrap_or(false)
}

#[async_trait]
impl ContractsApi for HttpContractsApi {
    async fn list_accounts(&self) -> ReconcileResult<Vec<Account>> {
        let envelope: AccountsEnvelope = self
            .fetch(self.request(Method::GET, "accounts"), "accounts")
            .await?;
        Ok(envelope.accounts)
    }

    async fn list_contracts(&self, account: &Account) -> ReconcileResult<Vec<Contract>> {
        let path = format!("accounts/{}/contracts", account.id);
        let envelope: ContractsEnvelope =
            self.fetch(self.request(Method::GET, &path), "contracts").await?;
        Ok(envelope.contracts)
    }

    async fn list_subscriptions(
        &self,
        account_id: &str,
        marketplace: &str,
        filters: &SubscriptionFilters,
    ) -> ReconcileResult<Vec<Subscription>> {
        let path = format!("accounts/{account_id}/marketplace/{marketplace}/subscriptions");
        let request = self
            .request(Method::GET, &path)
            .query(&filters.query_pairs());
        let envelope: SubscriptionsEnvelope = self.fetch(request, "subscriptions").await?;
        Ok(envelope.subscriptions)
    }

    async fn contract_token(&self, contract_id: &str) -> ReconcileResult<String> {
        let path = format!("contracts/{contract_id}/token");
        let envelope: TokenEnvelope = self
            .fetch(
                self.request(Method::POST, &path).json(&json!({})),
                "contract token",
            )
            .await?;
        Ok(envelope.contract_token)
    }

    async fn attached_machines(&self, contract_id: &str) -> ReconcileResult<Vec<AttachedMachine>> {
        let path = format!("contracts/{contract_id}/context/machines");
        let envelope: MachinesEnvelope = self
            .fetch(self.request(Method::GET, &path), "attached machines")
            .await?;
        Ok(envelope.machines)
    }

    async fn renewal(&self, renewal_id: &str) -> ReconcileResult<Renewal> {
        let path = format!("renewals/{renewal_id}");
        self.fetch(self.request(Method::GET, &path), "renewal").await
    }

    async fn accept_renewal(&self, renewal_id: &str) -> ReconcileResult<()> {
        let path = format!("renewals/{renewal_id}/acceptance");
        self.send(self.request(Method::POST, &path).json(&json!({})))
            .await?;
        Ok(())
    }

    async fn purchase(&self, purchase_id: &str) -> ReconcileResult<Purchase> {
        let path = format!("purchase/{purchase_id}");
        self.fetch(self.request(Method::GET, &path), "purchase").await
    }

    async fn submit_purchase(
        &self,
        marketplace: &str,
        request: &PurchaseRequest,
        preview: bool,
    ) -> ReconcileResult<Purchase> {
        let path = if preview {
            format!("marketplace/{marketplace}/purchase/preview")
        } else {
            format!("marketplace/{marketplace}/purchase")
        };
        self.fetch(self.request(Method::POST, &path).json(request), "purchase")
            .await
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> ReconcileResult<()> {
        let path = format!("subscriptions/{subscription_id}");
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn set_auto_renewal(
        &self,
        subscription_id: &str,
        should_auto_renew: bool,
    ) -> ReconcileResult<()> {
        let path = format!("subscription/{subscription_id}/auto-renewal");
        self.send(
            self.request(Method::POST, &path)
                .json(&json!({ "shouldAutoRenew": should_auto_renew })),
        )
        .await?;
        Ok(())
    }

    async fn purchase_account(&self, marketplace: &str) -> ReconcileResult<Account> {
        let path = format!("marketplace/{marketplace}/account");
        self.fetch(self.request(Method::GET, &path), "purchase account")
            .await
    }

    async fn product_listings(&self, marketplace: &str) -> ReconcileResult<ProductCatalog> {
        let path = format!("marketplace/{marketplace}/product-listings");
        self.fetch(self.request(Method::GET, &path), "product listings")
            .await
    }

    async fn ensure_purchase_account(
        &self,
        marketplace: &str,
        request: &PurchaseAccountRequest,
    ) -> ReconcileResult<PurchaseAccount> {
        let path = format!("marketplace/{marketplace}/account");
        self.fetch(
            self.request(Method::POST, &path).json(request),
            "purchase account",
        )
        .await
    }

    async fn customer_info(&self, account_id: &str) -> ReconcileResult<CustomerRecord> {
        let path = format!("accounts/{account_id}/customer-info/stripe");
        self.fetch(self.request(Method::GET, &path), "customer info")
            .await
    }

    async fn put_payment_method(
        &self,
        account_id: &str,
        payment_method_id: &str,
    ) -> ReconcileResult<()> {
        let path = format!("accounts/{account_id}/customer-info/stripe");
        self.send(
            self.request(Method::PUT, &path)
                .json(&json!({ "defaultPaymentMethod": PaymentMethodRef::new(payment_method_id) })),
        )
        .await?;
        Ok(())
    }

    async fn put_customer_info(
        &self,
        account_id: &str,
        update: &CustomerInfoUpdate,
    ) -> ReconcileResult<()> {
        let path = format!("accounts/{account_id}/customer-info/stripe");
        self.send(self.request(Method::PUT, &path).json(update))
            .await?;
        Ok(())
    }
}
