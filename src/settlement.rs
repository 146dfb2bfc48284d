use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::schemas::{CompanionName, ExpenseRecord};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CompanionSummary {
    pub paid: f64,
    pub owed: f64,
    pub net: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanRole {
    Payer,
    SplitMember,
}

/// A payer or split name referenced by a stored record but missing from the
/// current roster. Not an error: the roster can be cleared while expenses
/// stay behind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrphanedName {
    pub expense: String,
    pub name: CompanionName,
    pub role: OrphanRole,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Settlement {
    pub grand_total: f64,
    pub summary: HashMap<CompanionName, CompanionSummary>,
    pub orphans: Vec<OrphanedName>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordFault {
    NegativeAmount,
    NonFiniteAmount,
    EmptySplits,
}

impl fmt::Display for RecordFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RecordFault::NegativeAmount => "negative amount",
            RecordFault::NonFiniteAmount => "non-finite amount",
            RecordFault::EmptySplits => "empty split set",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
    #[error("invalid expense record {expense:?}: {fault}")]
    InvalidRecord { expense: String, fault: RecordFault },
}

/// Folds the expense records into a per-companion `{paid, owed, net}` summary
/// plus the grand total of all spend.
///
/// A record whose payer or split member is no longer in the roster still
/// counts towards `grand_total`, but the missing name gets no `paid`/`owed`
/// contribution and is reported in `orphans` instead.
///
/// A malformed record (negative or non-finite amount, or an empty split set)
/// rejects the whole computation, it is never silently skipped. The ingestion
/// handlers refuse to store such records, so hitting this on stored data means
/// the document was edited out of band.
///
/// Shares accumulate at full precision; `paid`, `owed` and `net` are rounded
/// independently to two decimals at the end, half up.
pub fn compute_settlement(
    companions: &[CompanionName],
    expenses: &[ExpenseRecord],
) -> Result<Settlement, SettlementError> {
    let mut summary: HashMap<CompanionName, CompanionSummary> = companions
        .iter()
        .map(|name| (name.clone(), CompanionSummary::default()))
        .collect();
    let mut grand_total = 0.0;
    let mut orphans = Vec::new();

    for expense in expenses {
        validate(expense)?;
        grand_total += expense.amount;

        match summary.get_mut(&expense.payer) {
            Some(entry) => entry.paid += expense.amount,
            None => orphans.push(OrphanedName {
                expense: expense.name.clone(),
                name: expense.payer.clone(),
                role: OrphanRole::Payer,
            }),
        }

        // The share is always amount over the full split set, even when some
        // of its members have left the roster.
        let share = expense.amount / expense.splits.len() as f64;
        for member in &expense.splits {
            match summary.get_mut(member) {
                Some(entry) => entry.owed += share,
                None => orphans.push(OrphanedName {
                    expense: expense.name.clone(),
                    name: member.clone(),
                    role: OrphanRole::SplitMember,
                }),
            }
        }
    }

    for entry in summary.values_mut() {
        entry.net = entry.paid - entry.owed;
        entry.paid = round_to_2_decimals(entry.paid);
        entry.owed = round_to_2_decimals(entry.owed);
        entry.net = round_to_2_decimals(entry.net);
    }

    Ok(Settlement {
        grand_total,
        summary,
        orphans,
    })
}

fn validate(expense: &ExpenseRecord) -> Result<(), SettlementError> {
    let fault = if !expense.amount.is_finite() {
        RecordFault::NonFiniteAmount
    } else if expense.amount < 0.0 {
        RecordFault::NegativeAmount
    } else if expense.splits.is_empty() {
        RecordFault::EmptySplits
    } else {
        return Ok(());
    };
    Err(SettlementError::InvalidRecord {
        expense: expense.name.clone(),
        fault,
    })
}

pub fn round_to_2_decimals(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use crate::schemas::Category;

    fn roster(names: &[&str]) -> Vec<CompanionName> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    fn record(name: &str, amount: f64, payer: &str, splits: &[&str]) -> ExpenseRecord {
        ExpenseRecord {
            id: name.to_owned(),
            name: name.to_owned(),
            date: "2025-11-27".to_owned(),
            category: Category::Food,
            amount,
            currency: Currency::Krw,
            entered_amount: None,
            payer: payer.to_owned(),
            splits: splits.iter().map(|split| (*split).to_owned()).collect(),
            per_person_share: None,
        }
    }

    #[test]
    fn empty_inputs_give_an_empty_settlement() {
        let settlement = compute_settlement(&[], &[]).unwrap();
        assert_eq!(settlement.grand_total, 0.0);
        assert!(settlement.summary.is_empty());
        assert!(settlement.orphans.is_empty());
    }

    #[test]
    fn single_payer_two_way_split() {
        let companions = roster(&["A", "B"]);
        let expenses = vec![record("dinner", 10000.0, "A", &["A", "B"])];

        let settlement = compute_settlement(&companions, &expenses).unwrap();

        assert_eq!(settlement.grand_total, 10000.0);
        let a = &settlement.summary["A"];
        assert_eq!((a.paid, a.owed, a.net), (10000.0, 5000.0, 5000.0));
        let b = &settlement.summary["B"];
        assert_eq!((b.paid, b.owed, b.net), (0.0, 5000.0, -5000.0));
        assert!(settlement.orphans.is_empty());
    }

    #[test]
    fn three_way_split_has_no_remainder() {
        let companions = roster(&["A", "B", "C"]);
        let expenses = vec![record("taxi", 3000.0, "B", &["A", "B", "C"])];

        let settlement = compute_settlement(&companions, &expenses).unwrap();

        for name in ["A", "B", "C"] {
            assert_eq!(settlement.summary[name].owed, 1000.0);
        }
        assert_eq!(settlement.summary["B"].net, 2000.0);
        assert_eq!(settlement.summary["A"].net, -1000.0);
        assert_eq!(settlement.summary["C"].net, -1000.0);
    }

    #[test]
    fn shares_are_exact_for_even_divisions() {
        let companions = roster(&["A", "B", "C"]);
        let expenses = vec![record("bbq", 9000.0, "A", &["A", "B", "C"])];

        let settlement = compute_settlement(&companions, &expenses).unwrap();

        for name in ["A", "B", "C"] {
            assert_eq!(settlement.summary[name].owed, 3000.0);
        }
    }

    #[test]
    fn unknown_payer_counts_toward_grand_total_only() {
        let companions = roster(&["A"]);
        let expenses = vec![record("ghost dinner", 7000.0, "Ghost", &["A"])];

        let settlement = compute_settlement(&companions, &expenses).unwrap();

        assert_eq!(settlement.grand_total, 7000.0);
        assert_eq!(settlement.summary["A"].paid, 0.0);
        assert_eq!(settlement.summary["A"].owed, 7000.0);
        assert_eq!(
            settlement.orphans,
            vec![OrphanedName {
                expense: "ghost dinner".to_owned(),
                name: "Ghost".to_owned(),
                role: OrphanRole::Payer,
            }]
        );
    }

    #[test]
    fn departed_split_members_keep_the_full_denominator() {
        let companions = roster(&["A", "B"]);
        let expenses = vec![record("lunch", 3000.0, "A", &["A", "B", "Ghost"])];

        let settlement = compute_settlement(&companions, &expenses).unwrap();

        // 3000 over three names, the ghost's share simply goes unclaimed.
        assert_eq!(settlement.summary["A"].owed, 1000.0);
        assert_eq!(settlement.summary["B"].owed, 1000.0);
        assert_eq!(
            settlement.orphans,
            vec![OrphanedName {
                expense: "lunch".to_owned(),
                name: "Ghost".to_owned(),
                role: OrphanRole::SplitMember,
            }]
        );
    }

    #[test]
    fn payer_outside_the_split_keeps_the_whole_amount_as_net() {
        let companions = roster(&["A", "B"]);
        let expenses = vec![record("treat", 4000.0, "A", &["B"])];

        let settlement = compute_settlement(&companions, &expenses).unwrap();

        assert_eq!(settlement.summary["A"].net, 4000.0);
        assert_eq!(settlement.summary["B"].net, -4000.0);
    }

    #[test]
    fn uneven_division_rounds_half_up_to_two_decimals() {
        let companions = roster(&["A", "B", "C"]);
        let expenses = vec![record("coffee", 100.0, "A", &["A", "B", "C"])];

        let settlement = compute_settlement(&companions, &expenses).unwrap();

        assert_eq!(settlement.summary["B"].owed, 33.33);
        assert_eq!(settlement.summary["A"].paid, 100.0);
        assert_eq!(settlement.summary["A"].owed, 33.33);
        assert_eq!(settlement.summary["A"].net, 66.67);
    }

    #[test]
    fn owed_accumulates_at_full_precision_before_rounding() {
        let companions = roster(&["A", "B", "C"]);
        // Three thirds of 100 re-assemble into a clean 100, not 99.99.
        let expenses = vec![
            record("one", 100.0, "A", &["A", "B", "C"]),
            record("two", 100.0, "A", &["A", "B", "C"]),
            record("three", 100.0, "A", &["A", "B", "C"]),
        ];

        let settlement = compute_settlement(&companions, &expenses).unwrap();

        assert_eq!(settlement.summary["B"].owed, 100.0);
    }

    #[test]
    fn negative_amount_is_rejected() {
        let companions = roster(&["A"]);
        let expenses = vec![record("refund", -500.0, "A", &["A"])];

        let err = compute_settlement(&companions, &expenses).unwrap_err();
        assert_eq!(
            err,
            SettlementError::InvalidRecord {
                expense: "refund".to_owned(),
                fault: RecordFault::NegativeAmount,
            }
        );
    }

    #[test]
    fn non_finite_amount_is_rejected() {
        let companions = roster(&["A"]);
        let expenses = vec![record("glitch", f64::NAN, "A", &["A"])];

        let err = compute_settlement(&companions, &expenses).unwrap_err();
        assert_eq!(
            err,
            SettlementError::InvalidRecord {
                expense: "glitch".to_owned(),
                fault: RecordFault::NonFiniteAmount,
            }
        );
    }

    #[test]
    fn empty_split_set_is_rejected_before_any_division() {
        let companions = roster(&["A"]);
        let expenses = vec![record("orphan cost", 1200.0, "A", &[])];

        let err = compute_settlement(&companions, &expenses).unwrap_err();
        assert_eq!(
            err,
            SettlementError::InvalidRecord {
                expense: "orphan cost".to_owned(),
                fault: RecordFault::EmptySplits,
            }
        );
    }

    #[test]
    fn one_bad_record_rejects_the_whole_computation() {
        let companions = roster(&["A", "B"]);
        let expenses = vec![
            record("fine", 1000.0, "A", &["A", "B"]),
            record("broken", 1000.0, "A", &[]),
        ];

        assert!(compute_settlement(&companions, &expenses).is_err());
    }

    #[test]
    fn stale_per_person_share_is_ignored() {
        let companions = roster(&["A", "B"]);
        let mut expense = record("dinner", 10000.0, "A", &["A", "B"]);
        expense.per_person_share = Some(999999.0);

        let settlement = compute_settlement(&companions, &[expense]).unwrap();

        assert_eq!(settlement.summary["B"].owed, 5000.0);
    }

    #[test]
    fn nets_conserve_when_everyone_is_in_the_roster() {
        let companions = roster(&["A", "B", "C", "D"]);
        let expenses = vec![
            record("hotel", 240000.0, "A", &["A", "B", "C", "D"]),
            record("dinner", 52700.0, "B", &["A", "B", "C"]),
            record("metro", 5500.0, "C", &["C", "D"]),
            record("snacks", 3100.0, "D", &["A", "B", "C", "D"]),
        ];

        let settlement = compute_settlement(&companions, &expenses).unwrap();

        let total_net: f64 = settlement.summary.values().map(|entry| entry.net).sum();
        assert!(total_net.abs() <= 0.01 * companions.len() as f64);
        assert!(settlement.orphans.is_empty());
    }

    #[test]
    fn identical_inputs_give_identical_settlements() {
        let companions = roster(&["A", "B", "C"]);
        let expenses = vec![
            record("one", 100.0, "A", &["A", "B", "C"]),
            record("two", 7777.0, "B", &["A", "C"]),
        ];

        let first = compute_settlement(&companions, &expenses).unwrap();
        let second = compute_settlement(&companions, &expenses).unwrap();
        assert_eq!(first, second);
    }
}
