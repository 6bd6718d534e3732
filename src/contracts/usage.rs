use std::fmt;

use serde::Serialize;

use crate::error::{ReconcileError, ReconcileResult};

use super::api::ContractsApi;
use super::models::{AttachedMachine, Contract};

/// key: contracts-machine-usage -> attached/allowed pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MachineUsage {
    pub attached: u64,
    pub allowed: u64,
}

impl MachineUsage {
    pub fn compute(allowances: &[u64], attached: &[AttachedMachine]) -> ReconcileResult<Self> {
        let allowed = allowances
            .iter()
            .try_fold(0u64, |total, value| total.checked_add(*value))
            .ok_or_else(|| ReconcileError::data("allowance total overflows"))?;
        Ok(Self {
            attached: attached.len() as u64,
            allowed,
        })
    }
}

impl fmt::Display for MachineUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.allowed > 0 {
            write!(f, "{}/{}", self.attached, self.allowed)
        } else {
            write!(f, "{}", self.attached)
        }
    }
}

/// Fetches the attached machines for `contract` and pairs them with its allowances.
pub async fn machine_usage(
    api: &dyn ContractsApi,
    contract: &Contract,
) -> ReconcileResult<MachineUsage> {
    let allowances: Vec<u64> = contract
        .contract_info
        .allowances
        .iter()
        .map(|allowance| allowance.value)
        .collect();
    let attached = api.attached_machines(contract.id()).await?;
    MachineUsage::compute(&allowances, &attached)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machines(count: usize) -> Vec<AttachedMachine> {
        (0..count)
            .map(|index| AttachedMachine {
                id: format!("m{index}"),
            })
            .collect()
    }

    #[test]
    fn sums_allowances_and_counts_machines() {
        let usage = MachineUsage::compute(&[5, 3], &machines(4)).unwrap();
        assert_eq!(usage, MachineUsage { attached: 4, allowed: 8 });
        assert_eq!(usage.to_string(), "4/8");
    }

    #[test]
    fn no_allowances_renders_attached_only() {
        let usage = MachineUsage::compute(&[], &machines(2)).unwrap();
        assert_eq!(usage, MachineUsage { attached: 2, allowed: 0 });
        assert_eq!(usage.to_string(), "2");
    }

    #[test]
    fn overflowing_allowances_are_a_data_error() {
        let err = MachineUsage::compute(&[u64::MAX, 1], &machines(0)).unwrap_err();
        assert!(matches!(err, ReconcileError::DataError(_)));
    }
}
