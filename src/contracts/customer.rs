use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ReconcileError, ReconcileResult};

use super::api::ContractsApi;
use super::models::{
    CustomerInfoUpdate, CustomerRecord, PaymentMethod, PaymentMethodRef, PurchaseAccount,
    PurchaseAccountRequest,
};

/// key: contracts-payment-methods -> default card for the purchase account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaymentMethodsView {
    pub account_id: Option<String>,
    pub default_payment_method: Option<PaymentMethod>,
}

/// Creates or returns the purchase account. Guests get a token back for their follow-up calls.
pub async fn ensure_purchase_account(
    api: &dyn ContractsApi,
    marketplace: &str,
    email: &str,
    account_name: &str,
    payment_method_id: &str,
) -> ReconcileResult<PurchaseAccount> {
    let request = PurchaseAccountRequest {
        email: email.to_string(),
        account_name: account_name.to_string(),
        payment_method: PaymentMethodRef::new(payment_method_id),
    };
    let account = api.ensure_purchase_account(marketplace, &request).await?;
    info!(
        account_id = %account.id,
        %marketplace,
        guest = account.token.is_some(),
        "purchase account ensured"
    );
    Ok(account)
}

/// Customer record for `account_id`, or `None` when no billing customer exists yet.
pub async fn load_customer_info(
    api: &dyn ContractsApi,
    account_id: &str,
) -> ReconcileResult<Option<CustomerRecord>> {
    match api.customer_info(account_id).await {
        Ok(record) => Ok(Some(record)),
        Err(err) if err.is_not_found() => {
            debug!(%account_id, "no customer info yet");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Resolves the purchase account and its default payment method.
///
/// A missing purchase account or customer yields an empty view.
pub async fn load_payment_methods(
    api: &dyn ContractsApi,
    marketplace: &str,
) -> ReconcileResult<PaymentMethodsView> {
    let account = match api.purchase_account(marketplace).await {
        Ok(account) => account,
        Err(err) if err.is_not_found() => return Ok(PaymentMethodsView::default()),
        Err(err) => return Err(err),
    };

    let Some(record) = load_customer_info(api, &account.id).await? else {
        return Ok(PaymentMethodsView::default());
    };
    let Some(customer) = record.customer_info else {
        return Ok(PaymentMethodsView::default());
    };

    Ok(PaymentMethodsView {
        account_id: record.account_info.map(|info| info.id),
        default_payment_method: customer.default_payment_method,
    })
}

pub async fn set_default_payment_method(
    api: &dyn ContractsApi,
    account_id: &str,
    payment_method_id: &str,
) -> ReconcileResult<()> {
    if account_id.is_empty() {
        return Err(ReconcileError::InvalidRequest("account_id required".to_string()));
    }
    if payment_method_id.is_empty() {
        return Err(ReconcileError::InvalidRequest(
            "payment_method_id required".to_string(),
        ));
    }

    api.put_payment_method(account_id, payment_method_id).await?;
    info!(%account_id, "default payment method updated");
    Ok(())
}

pub async fn update_customer_info(
    api: &dyn ContractsApi,
    account_id: &str,
    update: &CustomerInfoUpdate,
) -> ReconcileResult<()> {
    if account_id.is_empty() {
        return Err(ReconcileError::InvalidRequest("account_id required".to_string()));
    }
    if update.payment_method_id.is_empty() {
        return Err(ReconcileError::InvalidRequest(
            "payment_method_id required".to_string(),
        ));
    }

    api.put_customer_info(account_id, update).await?;
    info!(%account_id, "customer info updated");
    Ok(())
}
