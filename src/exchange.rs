use crate::balance::{
    compute_balance_from_trip, summarize_expenses, Balance, ExpenseSummary, PersonalBalance,
    SETTLED_TOLERANCE,
};
use crate::schemas::{Member, Trip};
use serde::Serialize;

/// A single recommended payment from a debtor to a creditor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transfer {
    pub from: Member,
    pub to: Member,
    pub amount: f64,
}

/// Everything the expense view needs, computed from one snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct Settlement {
    pub balances: Balance,
    pub transfers: Vec<Transfer>,
    pub summary: ExpenseSummary,
}

// Greedy matching: the largest remaining debt always pays the largest
// remaining credit, so each step settles at least one of the two
pub fn settle(balance: &Balance) -> Vec<Transfer> {
    // Divide people into creditors and debtors, both holding positive amounts
    let mut creditors = Vec::new();
    let mut debtors = Vec::new();

    // Overflowed balances can't be paid back by anyone
    for person in balance.iter().filter(|p| p.balance.is_finite()) {
        if person.balance > SETTLED_TOLERANCE {
            creditors.push(person.clone());
        } else if person.balance < -SETTLED_TOLERANCE {
            debtors.push(PersonalBalance {
                id: person.id.clone(),
                balance: -person.balance,
            });
        }
    }

    // sort_by is stable, equal amounts keep member order
    creditors.sort_by(|a, b| b.balance.total_cmp(&a.balance));
    debtors.sort_by(|a, b| b.balance.total_cmp(&a.balance));

    let mut transfers = Vec::new();
    let (mut ci, mut di) = (0, 0);

    while ci < creditors.len() && di < debtors.len() {
        let creditor = &mut creditors[ci];
        let debtor = &mut debtors[di];

        let amount = creditor.balance.min(debtor.balance);
        if amount > SETTLED_TOLERANCE {
            transfers.push(Transfer {
                from: debtor.id.clone(),
                to: creditor.id.clone(),
                amount,
            });
        }
        creditor.balance -= amount;
        debtor.balance -= amount;

        if !(creditor.balance >= SETTLED_TOLERANCE) {
            ci += 1;
        }
        if !(debtor.balance >= SETTLED_TOLERANCE) {
            di += 1;
        }
    }
    transfers
}

pub fn settle_trip(trip: &Trip) -> Settlement {
    let balances = compute_balance_from_trip(trip);
    let transfers = settle(&balances);
    Settlement {
        transfers,
        summary: summarize_expenses(&trip.members, &trip.expenses),
        balances,
    }
}
