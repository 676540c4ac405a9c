//! Greedy input selection.
//!
//! One selector serves CKB capacity cells and BTC fee UTXOs: candidates are
//! taken in the order given until their value covers the target plus the fee
//! budget. xUDT asset cells are selected by amount in [`crate::ckb::collector`].

use crate::ckb::types::LiveCell;
use crate::error::{Error, Result};

/// Something with a spendable value (shannons or sats)
pub trait Valued {
    /// Value counted toward the target
    fn value(&self) -> u64;
}

impl Valued for LiveCell {
    fn value(&self) -> u64 {
        self.capacity()
    }
}

/// Hook deciding whether a candidate may be selected at all
pub trait CandidateFilter<T>: Send + Sync {
    /// Return false to skip the candidate
    fn accept(&self, candidate: &T) -> bool;
}

impl<T, F> CandidateFilter<T> for F
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn accept(&self, candidate: &T) -> bool {
        self(candidate)
    }
}

/// Result of a selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<T> {
    /// Selected candidates, in input order
    pub selected: Vec<T>,
    /// Total value of the selected candidates
    pub sum_value: u64,
}

impl<T> Selection<T> {
    /// Value left after covering `required`
    pub fn surplus(&self, required: u64) -> u64 {
        self.sum_value.saturating_sub(required)
    }
}

/// Select candidates, in order, until their value reaches `target + fee_budget`.
///
/// Candidates rejected by `filter` are skipped. Fails with
/// [`Error::InsufficientCapacity`] carrying the required and reachable totals
/// when the candidates run out first.
pub fn select_inputs<T: Valued + Clone>(
    available: &[T],
    target: u64,
    fee_budget: u64,
    filter: Option<&dyn CandidateFilter<T>>,
) -> Result<Selection<T>> {
    let required = target.checked_add(fee_budget).ok_or_else(|| Error::Overflow {
        operation: "selection target".into(),
    })?;

    let mut selected = Vec::new();
    let mut sum_value = 0u64;

    for candidate in available {
        if sum_value >= required {
            break;
        }
        if let Some(filter) = filter {
            if !filter.accept(candidate) {
                continue;
            }
        }
        sum_value = sum_value.saturating_add(candidate.value());
        selected.push(candidate.clone());
    }

    if sum_value < required {
        return Err(Error::InsufficientCapacity {
            required,
            available: sum_value,
        });
    }

    Ok(Selection { selected, sum_value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Coin(u64);

    impl Valued for Coin {
        fn value(&self) -> u64 {
            self.0
        }
    }

    fn coins(values: &[u64]) -> Vec<Coin> {
        values.iter().copied().map(Coin).collect()
    }

    #[test]
    fn test_stops_once_target_plus_fee_reached() {
        let available = coins(&[50, 30, 40, 100]);
        let selection = select_inputs(&available, 70, 5, None).unwrap();
        assert_eq!(selection.selected, coins(&[50, 30]));
        assert_eq!(selection.sum_value, 80);
        assert_eq!(selection.surplus(75), 5);
    }

    #[test]
    fn test_exhaustion_reports_totals() {
        let available = coins(&[10, 20]);
        let err = select_inputs(&available, 100, 1, None).unwrap_err();
        assert_eq!(err, Error::InsufficientCapacity { required: 101, available: 30 });
    }

    #[test]
    fn test_filter_skips_candidates() {
        let available = coins(&[546, 10_000, 20_000]);
        let not_dust = |c: &Coin| c.0 > 546;
        let selection = select_inputs(&available, 15_000, 0, Some(&not_dust)).unwrap();
        assert_eq!(selection.selected, coins(&[10_000, 20_000]));
    }

    #[test]
    fn test_zero_target_selects_nothing() {
        let selection = select_inputs(&coins(&[1, 2]), 0, 0, None).unwrap();
        assert!(selection.selected.is_empty());
        assert_eq!(selection.sum_value, 0);
    }

    proptest! {
        #[test]
        fn prop_selection_is_minimal_prefix(
            values in prop::collection::vec(1u64..1_000_000, 0..32),
            target in 0u64..5_000_000,
            fee in 0u64..10_000,
        ) {
            let available = coins(&values);
            match select_inputs(&available, target, fee, None) {
                Ok(selection) => {
                    let n = selection.selected.len();
                    prop_assert_eq!(&selection.selected[..], &available[..n]);
                    prop_assert!(selection.sum_value >= target + fee);
                    if n > 0 {
                        let before_last: u64 = values[..n - 1].iter().sum();
                        prop_assert!(before_last < target + fee);
                    }
                }
                Err(Error::InsufficientCapacity { required, available: reached }) => {
                    prop_assert_eq!(required, target + fee);
                    prop_assert_eq!(reached, values.iter().sum::<u64>());
                    prop_assert!(reached < required);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }
    }
}
