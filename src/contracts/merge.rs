use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use futures_util::future::try_join_all;
use futures_util::try_join;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{DISPLAY_DATE_FORMAT, EXPIRING_WINDOW_DAYS};
use crate::error::ReconcileResult;

use super::api::ContractsApi;
use super::classifier::{
    classify_subscriptions, ClassifiedSubscriptions, MonthlySummary, PreviousPurchaseIds,
    PurchasedProduct,
};
use super::models::{parse_timestamp, Account, Contract, Period, Price, SubscriptionFilters};
use super::renewal::{evaluate_renewal, RenewalView};
use super::usage::{machine_usage, MachineUsage};

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub marketplace: String,
    /// Contract the caller is currently looking at; listed first in its group.
    pub open_subscription: Option<String>,
    pub now: DateTime<Utc>,
}

impl ReconcileOptions {
    pub fn new(marketplace: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            marketplace: marketplace.into(),
            open_subscription: None,
            now,
        }
    }

    pub fn with_open_subscription(mut self, contract_id: impl Into<String>) -> Self {
        self.open_subscription = Some(contract_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Active,
    Expired,
}

/// key: contracts-view -> one display record per contract and period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractView {
    /// Both period copies of a contract point back to the same source id.
    pub source_contract_id: String,
    pub account_name: String,
    pub product_id: String,
    pub token: String,
    pub machine_usage: MachineUsage,
    pub entitlements: BTreeSet<String>,
    pub support_level: String,
    pub created_at: DateTime<Utc>,
    pub created_at_formatted: String,
    pub effective_to: DateTime<Utc>,
    pub effective_to_formatted: String,
    pub status: ContractStatus,
    pub days_till_expiry: i64,
    pub expiring: bool,
    pub restart_date: Option<DateTime<Utc>>,
    pub renewal: Option<RenewalView>,
    pub period: Period,
    pub price_per_unit: Option<Price>,
    pub machine_count: Option<u64>,
    pub is_cancelable: bool,
    pub is_detached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonalAccount {
    pub account: Account,
    pub free_token: String,
}

/// Per-contract problem that did not abort the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileWarning {
    pub contract_id: String,
    pub message: String,
}

/// key: contracts-merged-view -> grouped dashboard state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergedView {
    pub enterprise_contracts: BTreeMap<String, Vec<ContractView>>,
    pub personal_account: Option<PersonalAccount>,
    pub monthly_summary: MonthlySummary,
    pub previous_purchase_ids: PreviousPurchaseIds,
    pub payment_method_warning: bool,
    pub new_subscription_id: Option<String>,
    pub open_subscription: Option<String>,
    pub warnings: Vec<ReconcileWarning>,
}

struct ContractSnapshot {
    contract: Contract,
    token: String,
    machine_usage: MachineUsage,
    renewal: Option<RenewalView>,
    warning: Option<ReconcileWarning>,
}

struct AccountSnapshot {
    account: Account,
    classified: ClassifiedSubscriptions,
    contracts: Vec<ContractSnapshot>,
}

/// Lists the caller's accounts and reconciles all of them.
pub async fn reconcile(
    api: &dyn ContractsApi,
    options: &ReconcileOptions,
) -> ReconcileResult<MergedView> {
    let accounts = api.list_accounts().await?;
    reconcile_accounts(api, &accounts, options).await
}

/// Fetches everything the accounts need, failing fast on the first error, then merges.
pub async fn reconcile_accounts(
    api: &dyn ContractsApi,
    accounts: &[Account],
    options: &ReconcileOptions,
) -> ReconcileResult<MergedView> {
    let snapshots = try_join_all(
        accounts
            .iter()
            .map(|account| fetch_account(api, account, options)),
    )
    .await?;

    let view = assemble(snapshots, options)?;
    info!(
        accounts = accounts.len(),
        groups = view.enterprise_contracts.len(),
        warnings = view.warnings.len(),
        "reconciled contracts"
    );
    Ok(view)
}

async fn fetch_account(
    api: &dyn ContractsApi,
    account: &Account,
    options: &ReconcileOptions,
) -> ReconcileResult<AccountSnapshot> {
    let filters = SubscriptionFilters::default();
    let (contracts, classified) = try_join!(api.list_contracts(account), async {
        let subscriptions = api
            .list_subscriptions(&account.id, &options.marketplace, &filters)
            .await?;
        classify_subscriptions(api, &subscriptions).await
    })
    .map_err(|err| err.for_account(&account.id))?;
    debug!(
        account_id = %account.id,
        contracts = contracts.len(),
        "fetched account contracts"
    );

    let contracts = try_join_all(
        contracts
            .into_iter()
            .map(|contract| fetch_contract(api, contract, options.now)),
    )
    .await
    .map_err(|err| err.for_account(&account.id))?;

    Ok(AccountSnapshot {
        account: account.clone(),
        classified,
        contracts,
    })
}

async fn fetch_contract(
    api: &dyn ContractsApi,
    contract: Contract,
    now: DateTime<Utc>,
) -> ReconcileResult<ContractSnapshot> {
    let contract_id = contract.id().to_string();
    let (token, machine_usage) = try_join!(
        api.contract_token(&contract_id),
        machine_usage(api, &contract)
    )
    .map_err(|err| err.for_contract(&contract_id))?;

    let mut snapshot = ContractSnapshot {
        contract,
        token,
        machine_usage,
        renewal: None,
        warning: None,
    };
    if snapshot.contract.contract_info.is_free() {
        return Ok(snapshot);
    }

    let renewals = snapshot.contract.contract_info.renewals.as_deref();
    match evaluate_renewal(api, renewals, now).await {
        Ok(renewal) => snapshot.renewal = renewal,
        Err(err) if err.is_unauthorized() => return Err(err.for_contract(&contract_id)),
        Err(err) => {
            warn!(?err, %contract_id, "renewal evaluation failed; contract shown without renewal");
            snapshot.warning = Some(ReconcileWarning {
                contract_id: contract_id.clone(),
                message: err.to_string(),
            });
        }
    }
    Ok(snapshot)
}

struct Placement {
    group: String,
    view: ContractView,
}

fn assemble(
    snapshots: Vec<AccountSnapshot>,
    options: &ReconcileOptions,
) -> ReconcileResult<MergedView> {
    let mut merged = MergedView {
        open_subscription: options.open_subscription.clone(),
        ..MergedView::default()
    };
    let mut placements = Vec::new();
    let mut newest: Option<(DateTime<Utc>, String)> = None;

    for snapshot in snapshots {
        let AccountSnapshot {
            account,
            classified,
            contracts,
        } = snapshot;
        merged.monthly_summary.merge(classified.monthly_summary);
        merged
            .previous_purchase_ids
            .merge(&classified.previous_purchase_ids);
        merged.payment_method_warning |= classified.payment_method_warning;

        for contract in contracts {
            if let Some(warning) = contract.warning.clone() {
                merged.warnings.push(warning);
            }

            if contract.contract.contract_info.is_free() {
                if merged.personal_account.is_some() {
                    warn!(account_id = %account.id, "more than one free contract found");
                }
                merged.personal_account = Some(PersonalAccount {
                    account: account.clone(),
                    free_token: contract.token,
                });
                continue;
            }

            let view = annotate(contract, options.now)?;
            if newest
                .as_ref()
                .map_or(true, |(created_at, _)| view.created_at > *created_at)
            {
                newest = Some((view.created_at, view.source_contract_id.clone()));
            }

            place_by_period(view, &classified.yearly, &classified.monthly, &mut placements);
        }
    }

    merged.new_subscription_id = newest.map(|(_, contract_id)| contract_id);
    for placement in placements {
        merged
            .enterprise_contracts
            .entry(placement.group)
            .or_default()
            .push(placement.view);
    }
    for group in merged.enterprise_contracts.values_mut() {
        prioritize(
            group,
            options.open_subscription.as_deref(),
            merged.new_subscription_id.as_deref(),
        );
    }

    Ok(merged)
}

fn annotate(snapshot: ContractSnapshot, now: DateTime<Utc>) -> ReconcileResult<ContractView> {
    let ContractSnapshot {
        contract,
        token,
        machine_usage,
        renewal,
        ..
    } = snapshot;
    let info = &contract.contract_info;

    let mut entitlements = BTreeSet::new();
    let mut support_level = "-".to_string();
    for entitlement in &info.resource_entitlements {
        if entitlement.entitlement_type == "support" {
            if let Some(level) = &entitlement.affordances.support_level {
                support_level = level.clone();
            }
            continue;
        }
        entitlements.insert(entitlement.entitlement_type.clone());
    }

    let created_at = parse_timestamp("contract createdAt", &info.created_at)?;
    let effective_to = parse_timestamp("contract effectiveTo", &info.effective_to)?;
    let expired = effective_to < now;
    let days_till_expiry = whole_days_until(now, effective_to);

    Ok(ContractView {
        source_contract_id: info.id.clone(),
        account_name: contract.account_info.name.clone(),
        product_id: info.product_id()?.to_string(),
        token,
        machine_usage,
        entitlements,
        support_level,
        created_at,
        created_at_formatted: created_at.format(DISPLAY_DATE_FORMAT).to_string(),
        effective_to,
        effective_to_formatted: effective_to.format(DISPLAY_DATE_FORMAT).to_string(),
        status: if expired {
            ContractStatus::Expired
        } else {
            ContractStatus::Active
        },
        days_till_expiry,
        expiring: (0..=EXPIRING_WINDOW_DAYS).contains(&days_till_expiry),
        restart_date: expired.then(|| now - Duration::days(1)),
        renewal,
        period: Period::Unknown,
        price_per_unit: None,
        machine_count: None,
        is_cancelable: false,
        is_detached: false,
    })
}

/// Floor of the whole days from `now` to `until`; negative as soon as `until` has passed.
fn whole_days_until(now: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    let remaining = until - now;
    let days = remaining.num_days();
    if remaining < Duration::days(days) {
        days - 1
    } else {
        days
    }
}

/// Emits one copy per billing period that purchased the contract's product, or one detached copy.
fn place_by_period(
    view: ContractView,
    yearly: &BTreeMap<String, PurchasedProduct>,
    monthly: &BTreeMap<String, PurchasedProduct>,
    placements: &mut Vec<Placement>,
) {
    let yearly_purchase = yearly.get(&view.product_id);
    let monthly_purchase = monthly.get(&view.product_id);
    let group = view.account_name.clone();

    if yearly_purchase.is_none() && monthly_purchase.is_none() {
        placements.push(Placement {
            group,
            view: ContractView {
                is_detached: true,
                ..view
            },
        });
        return;
    }

    if let Some(purchase) = yearly_purchase {
        placements.push(Placement {
            group: group.clone(),
            view: ContractView {
                period: Period::Yearly,
                price_per_unit: Some(purchase.price.clone()),
                machine_count: Some(purchase.quantity),
                ..view.clone()
            },
        });
    }
    if let Some(purchase) = monthly_purchase {
        placements.push(Placement {
            group,
            view: ContractView {
                period: Period::Monthly,
                price_per_unit: Some(purchase.price.clone()),
                machine_count: Some(purchase.quantity),
                is_cancelable: true,
                ..view
            },
        });
    }
}

/// Stable sort: open and newest contracts first, everything else in encounter order.
fn prioritize(group: &mut [ContractView], open: Option<&str>, newest: Option<&str>) {
    group.sort_by_key(|view| {
        let id = Some(view.source_contract_id.as_str());
        let is_priority = id == open || id == newest;
        !is_priority
    });
}
