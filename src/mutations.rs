//! Every change a client can make to a trip, as a pure function from one
//! snapshot to the next. Nothing here touches the store; the controller
//! decides whether and where the result is written.

use serde::Deserialize;

use crate::error::{Result, TripError};
use crate::schemas::{
    Activity, Amount, Category, ChecklistItem, ChecklistKind, Day, Expense, Idea, IdeaKind, ItemId,
    Member, Trip, SKY,
};

/// Largest amount a single expense may carry. Sums of amounts this size
/// stay far from overflowing an `f64`.
pub const MAX_AMOUNT: f64 = 1e12;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    Join {
        name: String,
    },

    AddDay,
    RenameDay {
        day: ItemId,
        title: String,
    },
    RemoveDay {
        day: ItemId,
    },
    AddActivity {
        day: ItemId,
    },
    UpdateActivity {
        day: ItemId,
        activity: ItemId,
        #[serde(default)]
        time: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
    RemoveActivity {
        day: ItemId,
        activity: ItemId,
    },

    AddIdea {
        #[serde(default)]
        kind: IdeaKind,
    },
    EditIdea {
        idea: ItemId,
        text: String,
    },
    VoteIdea {
        idea: ItemId,
    },
    RemoveIdea {
        idea: ItemId,
    },

    AddExpense,
    UpdateExpense {
        expense: ItemId,
        changes: ExpenseChanges,
    },
    ToggleBeneficiary {
        expense: ItemId,
        member: Member,
    },
    ClearBeneficiaries {
        expense: ItemId,
    },
    SelectAllBeneficiaries {
        expense: ItemId,
    },
    RemoveExpense {
        expense: ItemId,
    },

    AddChecklistItem {
        list: ChecklistKind,
    },
    EditChecklistItem {
        list: ChecklistKind,
        item: ItemId,
        text: String,
    },
    ToggleChecklistItem {
        list: ChecklistKind,
        item: ItemId,
    },
    RemoveChecklistItem {
        list: ChecklistKind,
        item: ItemId,
    },
}

/// Fields of an expense to overwrite; absent fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExpenseChanges {
    pub description: Option<String>,
    pub category: Option<Category>,
    pub amount: Option<Amount>,
    pub payer: Option<Member>,
    pub beneficiaries: Option<Vec<Member>>,
}

/// Applies `mutation` on behalf of `actor` and returns the resulting trip.
/// The input snapshot is never modified.
pub fn apply(trip: &Trip, mutation: &Mutation, actor: &str) -> Result<Trip> {
    let mut next = trip.clone();
    match mutation {
        Mutation::Join { name } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(TripError::validation("member name cannot be empty"));
            }
            if !next.is_member(name) {
                next.members.push(name.to_string());
            }
        }

        Mutation::AddDay => {
            let day_id = next.allocate_id();
            let activity_id = next.allocate_id();
            next.days.push(Day {
                id: day_id,
                title: "New day".to_string(),
                activities: vec![new_activity(activity_id, "10:00")],
            });
        }
        Mutation::RenameDay { day, title } => {
            day_mut(&mut next, *day)?.title = title.clone();
        }
        Mutation::RemoveDay { day } => {
            let position = position_of(&next.days, *day, |d| d.id, "day")?;
            next.days.remove(position);
        }
        Mutation::AddActivity { day } => {
            let activity_id = next.allocate_id();
            day_mut(&mut next, *day)?
                .activities
                .push(new_activity(activity_id, "12:00"));
        }
        Mutation::UpdateActivity {
            day,
            activity,
            time,
            text,
        } => {
            let day = day_mut(&mut next, *day)?;
            let activity = day
                .activities
                .iter_mut()
                .find(|a| a.id == *activity)
                .ok_or_else(|| TripError::not_found("activity", *activity))?;
            if let Some(time) = time {
                activity.time = time.clone();
            }
            if let Some(text) = text {
                activity.text = text.clone();
            }
        }
        Mutation::RemoveActivity { day, activity } => {
            let day = day_mut(&mut next, *day)?;
            let position = position_of(&day.activities, *activity, |a| a.id, "activity")?;
            day.activities.remove(position);
        }

        Mutation::AddIdea { kind } => {
            let author = require_member_actor(&next, actor)?;
            let id = next.allocate_id();
            next.ideas.push(Idea {
                id,
                kind: *kind,
                text: String::new(),
                author,
                votes: 0,
                voters: vec![],
            });
        }
        Mutation::EditIdea { idea, text } => {
            idea_mut(&mut next, *idea)?.text = text.clone();
        }
        Mutation::VoteIdea { idea } => {
            let voter = require_member_actor(&next, actor)?;
            let idea = idea_mut(&mut next, *idea)?;
            if !idea.voters.contains(&voter) {
                idea.votes += 1;
                idea.voters.push(voter);
            }
        }
        Mutation::RemoveIdea { idea } => {
            let position = position_of(&next.ideas, *idea, |i| i.id, "idea")?;
            next.ideas.remove(position);
        }

        Mutation::AddExpense => {
            let payer = require_member_actor(&next, actor)?;
            let id = next.allocate_id();
            let beneficiaries = next.members.clone();
            next.expenses.push(Expense {
                id,
                description: String::new(),
                category: Category::Other,
                amount: Amount::new(0.0),
                payer,
                beneficiaries,
            });
        }
        Mutation::UpdateExpense { expense, changes } => {
            if let Some(amount) = changes.amount {
                if !amount.raw().is_finite() || amount.raw() < 0.0 {
                    return Err(TripError::validation("amount must be a non-negative number"));
                }
                if amount.raw() > MAX_AMOUNT {
                    return Err(TripError::validation(format!(
                        "amount must not exceed {MAX_AMOUNT}"
                    )));
                }
            }
            if let Some(payer) = &changes.payer {
                require_member(&next, payer)?;
            }
            if let Some(beneficiaries) = &changes.beneficiaries {
                for member in beneficiaries {
                    require_member(&next, member)?;
                }
            }

            let expense = expense_mut(&mut next, *expense)?;
            if let Some(description) = &changes.description {
                expense.description = description.clone();
            }
            if let Some(category) = changes.category {
                expense.category = category;
            }
            if let Some(amount) = changes.amount {
                expense.amount = amount;
            }
            if let Some(payer) = &changes.payer {
                expense.payer = payer.clone();
            }
            if let Some(beneficiaries) = &changes.beneficiaries {
                expense.beneficiaries = beneficiaries.clone();
            }
        }
        Mutation::ToggleBeneficiary { expense, member } => {
            require_member(&next, member)?;
            let expense = expense_mut(&mut next, *expense)?;
            match expense.beneficiaries.iter().position(|m| m == member) {
                Some(position) => {
                    expense.beneficiaries.remove(position);
                }
                None => expense.beneficiaries.push(member.clone()),
            }
        }
        Mutation::ClearBeneficiaries { expense } => {
            expense_mut(&mut next, *expense)?.beneficiaries.clear();
        }
        Mutation::SelectAllBeneficiaries { expense } => {
            let members = next.members.clone();
            expense_mut(&mut next, *expense)?.beneficiaries = members;
        }
        Mutation::RemoveExpense { expense } => {
            let position = position_of(&next.expenses, *expense, |e| e.id, "expense")?;
            next.expenses.remove(position);
        }

        Mutation::AddChecklistItem { list } => {
            let id = next.allocate_id();
            next.checklist_mut(*list).push(ChecklistItem::new(id, ""));
        }
        Mutation::EditChecklistItem { list, item, text } => {
            checklist_item_mut(&mut next, *list, *item)?.text = text.clone();
        }
        Mutation::ToggleChecklistItem { list, item } => {
            let item = checklist_item_mut(&mut next, *list, *item)?;
            item.done = !item.done;
        }
        Mutation::RemoveChecklistItem { list, item } => {
            let position = position_of(next.checklist(*list), *item, |i| i.id, "checklist item")?;
            next.checklist_mut(*list).remove(position);
        }
    }
    Ok(next)
}

fn new_activity(id: ItemId, time: &str) -> Activity {
    Activity {
        id,
        time: time.to_string(),
        text: String::new(),
        color: SKY.to_string(),
    }
}

fn require_actor(actor: &str) -> Result<Member> {
    let actor = actor.trim();
    if actor.is_empty() {
        Err(TripError::validation("this change needs an actor name"))
    } else {
        Ok(actor.to_string())
    }
}

/// The actor of a change that records their name (author, voter, payer)
/// must have joined the trip.
fn require_member_actor(trip: &Trip, actor: &str) -> Result<Member> {
    let actor = require_actor(actor)?;
    require_member(trip, &actor)?;
    Ok(actor)
}

fn require_member(trip: &Trip, name: &str) -> Result<()> {
    if trip.is_member(name) {
        Ok(())
    } else {
        Err(TripError::validation(format!("{name} is not a member of this trip")))
    }
}

fn position_of<T>(
    items: &[T],
    id: ItemId,
    id_of: impl Fn(&T) -> ItemId,
    kind: &'static str,
) -> Result<usize> {
    items
        .iter()
        .position(|item| id_of(item) == id)
        .ok_or_else(|| TripError::not_found(kind, id))
}

fn day_mut(trip: &mut Trip, id: ItemId) -> Result<&mut Day> {
    trip.days
        .iter_mut()
        .find(|d| d.id == id)
        .ok_or_else(|| TripError::not_found("day", id))
}

fn idea_mut(trip: &mut Trip, id: ItemId) -> Result<&mut Idea> {
    trip.ideas
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| TripError::not_found("idea", id))
}

fn expense_mut(trip: &mut Trip, id: ItemId) -> Result<&mut Expense> {
    trip.expenses
        .iter_mut()
        .find(|e| e.id == id)
        .ok_or_else(|| TripError::not_found("expense", id))
}

fn checklist_item_mut(
    trip: &mut Trip,
    list: ChecklistKind,
    id: ItemId,
) -> Result<&mut ChecklistItem> {
    trip.checklist_mut(list)
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| TripError::not_found("checklist item", id))
}
