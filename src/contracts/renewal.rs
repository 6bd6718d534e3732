use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::RECENTLY_RENEWED_MINUTES;
use crate::error::{ReconcileError, ReconcileResult};

use super::api::ContractsApi;
use super::models::{parse_timestamp, Renewal, RenewalStatus};

/// key: contracts-renewal -> current renewal with eligibility
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewalView {
    pub id: String,
    pub status: RenewalStatus,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub actionable: bool,
    pub renewable: bool,
    /// Only set for `done` renewals.
    pub recently_renewed: Option<bool>,
}

/// Picks the earliest-starting renewal that is not closed. No I/O.
pub fn select_candidate(renewals: &[Renewal]) -> ReconcileResult<Option<&Renewal>> {
    let mut earliest: Option<(DateTime<Utc>, &Renewal)> = None;
    for renewal in renewals {
        if renewal.status == RenewalStatus::Closed {
            continue;
        }
        let start = parse_timestamp("renewal start", &renewal.start)?;
        if earliest.map_or(true, |(current, _)| start < current) {
            earliest = Some((start, renewal));
        }
    }
    Ok(earliest.map(|(_, renewal)| renewal))
}

/// Summaries lack invoice data, so a processing candidate is replaced by its full record.
pub async fn load_candidate_detail(
    api: &dyn ContractsApi,
    candidate: &Renewal,
) -> ReconcileResult<Renewal> {
    if candidate.status != RenewalStatus::Processing {
        return Ok(candidate.clone());
    }
    debug!(renewal_id = %candidate.id, "fetching processing renewal detail");
    api.renewal(&candidate.id).await
}

/// Applies the eligibility rules to a fully loaded renewal.
pub fn assess(renewal: &Renewal, now: DateTime<Utc>) -> ReconcileResult<RenewalView> {
    let start = parse_timestamp("renewal start", &renewal.start)?;
    let end = parse_timestamp("renewal end", &renewal.end)?;

    let recently_renewed = if renewal.status == RenewalStatus::Done {
        match renewal.last_modified.as_deref() {
            Some(raw) => {
                let modified = parse_timestamp("renewal lastModified", raw)?;
                Some(now - modified < Duration::minutes(RECENTLY_RENEWED_MINUTES))
            }
            None => Some(false),
        }
    } else {
        None
    };

    let actionable = renewal.actionable.unwrap_or(false);
    let mut view = RenewalView {
        id: renewal.id.clone(),
        status: renewal.status,
        start,
        end,
        actionable,
        renewable: false,
        recently_renewed,
    };

    if !actionable || now < start || now > end {
        return Ok(view);
    }

    view.renewable = match renewal.status {
        RenewalStatus::Pending => true,
        RenewalStatus::Processing => renewal
            .stripe_invoices
            .last()
            .map(|invoice| {
                matches!(
                    invoice.pi_status.as_str(),
                    "requires_payment_method" | "requires_action"
                ) && invoice.subscription_status == "incomplete"
            })
            .unwrap_or(false),
        _ => false,
    };
    Ok(view)
}

/// Selects, loads and assesses the current renewal of a contract.
pub async fn evaluate_renewal(
    api: &dyn ContractsApi,
    renewals: Option<&[Renewal]>,
    now: DateTime<Utc>,
) -> ReconcileResult<Option<RenewalView>> {
    let Some(candidate) = select_candidate(renewals.unwrap_or_default())? else {
        return Ok(None);
    };
    let renewal = load_candidate_detail(api, candidate).await?;
    assess(&renewal, now).map(Some)
}

/// Accepts a renewal only when it is currently renewable.
pub async fn accept_renewal(
    api: &dyn ContractsApi,
    renewal_id: &str,
    now: DateTime<Utc>,
) -> ReconcileResult<RenewalView> {
    let renewal = api.renewal(renewal_id).await?;
    let view = assess(&renewal, now)?;
    if !view.renewable {
        return Err(ReconcileError::RenewalNotRenewable {
            renewal_id: renewal_id.to_string(),
        });
    }

    api.accept_renewal(renewal_id).await?;
    info!(%renewal_id, "renewal accepted");
    Ok(view)
}
