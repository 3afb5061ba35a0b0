use std::collections::HashMap;

use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::schemas::{Expense, ItemId, Member, Trip};

/// Balances closer to zero than this are considered settled.
pub const SETTLED_TOLERANCE: f64 = 0.01;

#[derive(Clone, Debug, PartialEq)]
pub struct PersonalBalance {
    pub id: Member,
    pub balance: f64,
}

/// Net balance of every member, kept in member order. Positive means the
/// member is owed money, negative means the member owes it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Balance {
    people: Vec<PersonalBalance>,
    index: HashMap<Member, usize>,
}

impl Balance {
    fn with_members(members: &[Member]) -> Self {
        let mut balance = Balance::default();
        for member in members {
            if balance.index.contains_key(member) {
                continue;
            }
            balance.index.insert(member.clone(), balance.people.len());
            balance.people.push(PersonalBalance {
                id: member.clone(),
                balance: 0.0,
            });
        }
        balance
    }

    fn entry_mut(&mut self, member: &str) -> Option<&mut f64> {
        let position = *self.index.get(member)?;
        Some(&mut self.people[position].balance)
    }

    pub fn get(&self, member: &str) -> Option<f64> {
        self.index.get(member).map(|&i| self.people[i].balance)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PersonalBalance> {
        self.people.iter()
    }

    pub fn total(&self) -> f64 {
        self.people.iter().map(|p| p.balance).sum()
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.people.len()))?;
        for person in &self.people {
            map.serialize_entry(&person.id, &person.balance)?;
        }
        map.end()
    }
}

pub fn compute_balance(members: &[Member], expenses: &[Expense]) -> Balance {
    let mut balance = Balance::with_members(members);
    for expense in expenses {
        let amount = expense.amount.value();
        let receivers = expense.effective_beneficiaries(members);
        // Nobody to split among: the expense can't be distributed at all
        if receivers.is_empty() {
            continue;
        }
        let amount_per_receiver = amount / receivers.len() as f64;
        if let Some(payer) = balance.entry_mut(&expense.payer) {
            *payer += amount;
        }
        for receiver in receivers {
            if let Some(receiver) = balance.entry_mut(receiver) {
                *receiver -= amount_per_receiver;
            }
        }
    }
    balance
}

pub fn compute_balance_from_trip(trip: &Trip) -> Balance {
    compute_balance(&trip.members, &trip.expenses)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpenseShare {
    pub expense: ItemId,
    pub share: f64,
}

/// Display totals for the expense ledger, rounded to cents.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpenseSummary {
    pub total: f64,
    pub per_person: f64,
    pub count: usize,
    pub shares: Vec<ExpenseShare>,
}

pub fn summarize_expenses(members: &[Member], expenses: &[Expense]) -> ExpenseSummary {
    let total: f64 = expenses.iter().map(|e| e.amount.value()).sum();
    let shares = expenses
        .iter()
        .map(|expense| {
            let receivers = expense.effective_beneficiaries(members).len();
            let share = if receivers == 0 {
                0.0
            } else {
                expense.amount.value() / receivers as f64
            };
            ExpenseShare {
                expense: expense.id,
                share: round_to_2_decimals(share),
            }
        })
        .collect();
    ExpenseSummary {
        total: round_to_2_decimals(total),
        per_person: round_to_2_decimals(total / members.len().max(1) as f64),
        count: expenses.len(),
        shares,
    }
}

pub fn round_to_2_decimals(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::Amount;

    fn members(names: &[&str]) -> Vec<Member> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn expense(amount: f64, payer: &str, beneficiaries: &[&str]) -> Expense {
        Expense {
            amount: Amount::new(amount),
            payer: payer.to_string(),
            beneficiaries: members(beneficiaries),
            ..Expense::default()
        }
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("member should have a balance");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn payer_is_credited_and_beneficiaries_debited() {
        let balance = compute_balance(&members(&["A", "B"]), &[expense(100.0, "A", &["A", "B"])]);
        assert_close(balance.get("A"), 50.0);
        assert_close(balance.get("B"), -50.0);
    }

    #[test]
    fn empty_beneficiaries_split_among_all_members() {
        let balance = compute_balance(&members(&["A", "B", "C"]), &[expense(90.0, "A", &[])]);
        assert_close(balance.get("A"), 60.0);
        assert_close(balance.get("B"), -30.0);
        assert_close(balance.get("C"), -30.0);
    }

    #[test]
    fn no_expenses_means_everybody_is_even() {
        let balance = compute_balance(&members(&["A", "B", "C"]), &[]);
        assert_eq!(balance.iter().count(), 3);
        assert!(balance.iter().all(|p| p.balance == 0.0));
    }

    #[test]
    fn no_members_gives_empty_balance() {
        let balance = compute_balance(&[], &[expense(40.0, "A", &[])]);
        assert_eq!(balance.iter().count(), 0);
        assert_eq!(balance.get("A"), None);
    }

    #[test]
    fn unknown_people_are_ignored() {
        let balance = compute_balance(
            &members(&["A", "B"]),
            &[
                expense(30.0, "Zed", &["A", "B"]),
                expense(20.0, "A", &["A", "Ghost"]),
            ],
        );
        assert_close(balance.get("A"), -15.0 + 20.0 - 10.0);
        assert_close(balance.get("B"), -15.0);
        assert_eq!(balance.get("Zed"), None);
        assert_eq!(balance.get("Ghost"), None);
    }

    #[test]
    fn malformed_amounts_count_as_zero() {
        let expense: Expense = serde_json::from_value(serde_json::json!({
            "amount": "lots",
            "payer": "A",
            "beneficiaries": ["A", "B"],
        }))
        .unwrap();
        let balance = compute_balance(&members(&["A", "B"]), &[expense]);
        assert_eq!(balance.get("A"), Some(0.0));
        assert_eq!(balance.get("B"), Some(0.0));
    }

    #[test]
    fn duplicate_members_collapse() {
        let balance = compute_balance(&members(&["A", "B", "A"]), &[expense(10.0, "B", &["A"])]);
        assert_eq!(balance.iter().count(), 2);
        assert_close(balance.get("A"), -10.0);
    }

    #[test]
    fn balances_sum_to_zero() {
        let people = members(&["A", "B", "C", "D"]);
        let expenses = vec![
            expense(100.0, "A", &[]),
            expense(33.33, "B", &["A", "C", "D"]),
            expense(17.0, "C", &["D"]),
            expense(0.0, "D", &["A"]),
            expense(250.5, "D", &["A", "B"]),
        ];
        let balance = compute_balance(&people, &expenses);
        assert!(balance.total().abs() < SETTLED_TOLERANCE);
    }

    #[test]
    fn calculation_is_repeatable() {
        let people = members(&["A", "B", "C"]);
        let expenses = vec![expense(10.0, "A", &[]), expense(7.5, "C", &["B"])];
        assert_eq!(
            compute_balance(&people, &expenses),
            compute_balance(&people, &expenses)
        );
    }

    #[test]
    fn balance_serializes_in_member_order() {
        let balance = compute_balance(&members(&["Zoe", "Adam"]), &[expense(10.0, "Zoe", &[])]);
        let json = serde_json::to_string(&balance).unwrap();
        assert_eq!(json, r#"{"Zoe":5.0,"Adam":-5.0}"#);
    }

    #[test]
    fn summary_rounds_to_cents() {
        let people = members(&["A", "B", "C"]);
        let expenses = vec![expense(10.0, "A", &[]), expense(5.0, "B", &["B"])];
        let summary = summarize_expenses(&people, &expenses);
        assert_eq!(summary.total, 15.0);
        assert_eq!(summary.per_person, 5.0);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.shares[0].share, 3.33);
        assert_eq!(summary.shares[1].share, 5.0);
    }

    #[test]
    fn summary_without_members_does_not_divide_by_zero() {
        let summary = summarize_expenses(&[], &[expense(12.0, "A", &[])]);
        assert_eq!(summary.per_person, 12.0);
        assert_eq!(summary.shares[0].share, 0.0);
    }
}
