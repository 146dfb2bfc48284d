use std::collections::HashMap;
use std::mem::swap;

use serde::Serialize;

use crate::schemas::{CompanionName, ExpenseRecord};
use crate::settlement::{round_to_2_decimals, Settlement};

#[derive(Clone, Debug)]
struct PersonalBalance {
    name: CompanionName,
    balance: f64,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
struct CompanionPair {
    first: CompanionName,
    second: CompanionName,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transfer {
    pub payer: CompanionName,
    pub receiver: CompanionName,
    pub amount: f64,
}

// The transfers that would be made if no simplification happens: one debt per
// payer/split-member pair. Names outside the settlement roster are skipped,
// consistent with how the engine treats orphans.
fn naive_transfers(expenses: &[ExpenseRecord], settlement: &Settlement) -> Vec<Transfer> {
    let mut pair_balances: HashMap<CompanionPair, f64> = HashMap::new();

    for expense in expenses {
        if expense.splits.is_empty() || !settlement.summary.contains_key(&expense.payer) {
            continue;
        }
        let share = expense.amount / expense.splits.len() as f64;
        for member in &expense.splits {
            if *member == expense.payer || !settlement.summary.contains_key(member) {
                continue;
            }
            let mut pair = CompanionPair {
                first: expense.payer.clone(),
                second: member.clone(),
            };
            let mut amount = share;

            // We use alphabetical order to ensure all the debts regarding the
            // same two companions end up stored in the same direction.
            if pair.first > pair.second {
                swap(&mut pair.first, &mut pair.second);
                amount = -amount;
            }

            *pair_balances.entry(pair).or_insert(0.0) += amount;
        }
    }

    let mut transfers = Vec::new();
    for (pair, balance) in pair_balances {
        let amount = round_to_2_decimals(balance.abs());
        if amount == 0.0 {
            continue;
        }
        // A positive balance means `second` still owes `first`.
        let mut payer = pair.second;
        let mut receiver = pair.first;
        if balance < 0.0 {
            swap(&mut payer, &mut receiver);
        }

        transfers.push(Transfer {
            payer,
            receiver,
            amount,
        });
    }

    transfers
}

// Greedily matches the largest debtor against the largest creditor, so most
// companions are done after a single transfer.
fn simplified_transfers(
    mut debtors: Vec<PersonalBalance>,
    mut creditors: Vec<PersonalBalance>,
) -> Vec<Transfer> {
    debtors.sort_by(|a, b| a.balance.total_cmp(&b.balance));
    creditors.sort_by(|a, b| a.balance.total_cmp(&b.balance));

    let mut transfers = Vec::new();

    while let (Some(debtor), Some(creditor)) = (debtors.last_mut(), creditors.last_mut()) {
        let mut transfer = Transfer {
            payer: debtor.name.clone(),
            receiver: creditor.name.clone(),
            amount: 0.0,
        };
        if creditor.balance == debtor.balance {
            transfer.amount = debtor.balance;
            debtors.pop();
            creditors.pop();
        } else if creditor.balance > debtor.balance {
            transfer.amount = debtor.balance;
            creditor.balance = round_to_2_decimals(creditor.balance - debtor.balance);
            debtors.pop();
        } else {
            transfer.amount = creditor.balance;
            debtor.balance = round_to_2_decimals(debtor.balance - creditor.balance);
            creditors.pop();
        }
        if transfer.amount > 0.0 {
            transfers.push(transfer);
        }
    }

    transfers
}

/// Turns a settlement into a concrete repayment plan. Debtors and creditors
/// come from the rounded per-companion nets; the plan with fewer transfers
/// wins, so the simplification can never make things worse than settling each
/// pairwise debt directly.
pub fn plan_transfers(expenses: &[ExpenseRecord], settlement: &Settlement) -> Vec<Transfer> {
    let mut debtors = Vec::new();
    let mut creditors = Vec::new();

    for (name, summary) in &settlement.summary {
        let person = PersonalBalance {
            name: name.clone(),
            balance: summary.net.abs(),
        };
        if summary.net < 0.0 {
            debtors.push(person);
        } else if summary.net > 0.0 {
            creditors.push(person);
        }
    }

    let naive = naive_transfers(expenses, settlement);
    let simplified = simplified_transfers(debtors, creditors);

    if simplified.len() < naive.len() {
        simplified
    } else {
        naive
    }
}
