use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("unauthorized: credential is stale")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("cannot cancel the last contract on the account")]
    LastContractCannotBeCancelled,
    #[error("remote failure (status {status:?}): {body}")]
    RemoteFailure { status: Option<u16>, body: String },
    #[error("data error: {0}")]
    DataError(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no active monthly subscription for account {account_id}")]
    NoActiveMonthlySubscription { account_id: String },
    #[error("renewal {renewal_id} is not renewable")]
    RenewalNotRenewable { renewal_id: String },
    #[error("account {account_id}: {source}")]
    Account {
        account_id: String,
        #[source]
        source: Box<ReconcileError>,
    },
    #[error("contract {contract_id}: {source}")]
    Contract {
        contract_id: String,
        #[source]
        source: Box<ReconcileError>,
    },
}

impl ReconcileError {
    pub fn data(message: impl Into<String>) -> Self {
        ReconcileError::DataError(message.into())
    }

    pub fn for_account(self, account_id: &str) -> Self {
        ReconcileError::Account {
            account_id: account_id.to_string(),
            source: Box::new(self),
        }
    }

    pub fn for_contract(self, contract_id: &str) -> Self {
        ReconcileError::Contract {
            contract_id: contract_id.to_string(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping account/contract context.
    pub fn root(&self) -> &ReconcileError {
        match self {
            ReconcileError::Account { source, .. } | ReconcileError::Contract { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.root(), ReconcileError::Unauthorized)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), ReconcileError::NotFound)
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_looks_through_entity_context() {
        let err = ReconcileError::Unauthorized
            .for_contract("cAAA")
            .for_account("aAAA");
        assert!(err.is_unauthorized());
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "account aAAA: contract cAAA: unauthorized: credential is stale"
        );
    }

    #[test]
    fn remote_failure_keeps_body() {
        let err = ReconcileError::RemoteFailure {
            status: Some(502),
            body: "{\"message\":\"upstream\"}".to_string(),
        };
        assert!(err.to_string().contains("upstream"));
        assert!(matches!(err.root(), ReconcileError::RemoteFailure { .. }));
    }
}
