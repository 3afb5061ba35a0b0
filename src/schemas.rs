use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub type Member = String;
pub type ItemId = u64;

pub const SKY: &str = "#4A7FA5";
pub const MOSS: &str = "#3D6B4F";
pub const SUNSET: &str = "#D4704A";

const FIRST_ITEM_ID: ItemId = 1000;

/// The whole shared state of one trip. Every field falls back to its default
/// when the stored document doesn't carry it yet.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Trip {
    pub id: String,
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
    pub next_id: ItemId,
    pub info: TripInfo,
    pub members: Vec<Member>,
    pub days: Vec<Day>,
    pub ideas: Vec<Idea>,
    pub expenses: Vec<Expense>,
    pub checklist: Vec<ChecklistItem>,
    #[serde(alias = "preList")]
    pub pre_list: Vec<ChecklistItem>,
}

impl Default for Trip {
    fn default() -> Self {
        Trip {
            id: String::new(),
            version: 0,
            updated_at: None,
            next_id: FIRST_ITEM_ID,
            info: TripInfo::default(),
            members: vec![],
            days: vec![],
            ideas: vec![],
            expenses: vec![],
            checklist: vec![],
            pre_list: vec![],
        }
    }
}

impl Trip {
    /// The document written the first time anybody opens a trip.
    pub fn seeded(id: &str, info: TripInfo) -> Self {
        let mut trip = Trip {
            id: id.to_string(),
            info,
            ..Trip::default()
        };

        let day_id = trip.allocate_id();
        let activities = [
            ("10:00", "Arrival at the airport", SKY),
            ("15:00", "Accommodation check-in", MOSS),
            ("20:00", "Welcome dinner", SUNSET),
        ]
        .into_iter()
        .map(|(time, text, color)| Activity {
            id: trip.allocate_id(),
            time: time.to_string(),
            text: text.to_string(),
            color: color.to_string(),
        })
        .collect();
        trip.days.push(Day {
            id: day_id,
            title: "Arrival".to_string(),
            activities,
        });

        for text in [
            "Passport / ID card",
            "Credit card",
            "Phone charger",
            "Plug adapter",
            "Sunscreen",
        ] {
            let item = ChecklistItem::new(trip.allocate_id(), text);
            trip.checklist.push(item);
        }
        for text in [
            "Book accommodation",
            "Buy travel insurance",
            "Exchange currency",
            "Visa (check requirements)",
        ] {
            let item = ChecklistItem::new(trip.allocate_id(), text);
            trip.pre_list.push(item);
        }
        trip
    }

    pub fn allocate_id(&mut self) -> ItemId {
        self.next_id += 1;
        self.next_id
    }

    pub fn is_member(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }

    pub fn checklist(&self, list: ChecklistKind) -> &Vec<ChecklistItem> {
        match list {
            ChecklistKind::Packing => &self.checklist,
            ChecklistKind::PreDeparture => &self.pre_list,
        }
    }

    pub fn checklist_mut(&mut self, list: ChecklistKind) -> &mut Vec<ChecklistItem> {
        match list {
            ChecklistKind::Packing => &mut self.checklist,
            ChecklistKind::PreDeparture => &mut self.pre_list,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TripInfo {
    pub name: String,
    pub destination: String,
    pub dates: String,
    pub group_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Day {
    pub id: ItemId,
    pub title: String,
    pub activities: Vec<Activity>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Activity {
    pub id: ItemId,
    pub time: String,
    pub text: String,
    pub color: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Idea {
    pub id: ItemId,
    #[serde(rename = "color")]
    pub kind: IdeaKind,
    pub text: String,
    pub author: Member,
    pub votes: u32,
    pub voters: Vec<Member>,
}

/// Idea cards are told apart by their color on the board.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String")]
pub enum IdeaKind {
    #[default]
    #[serde(rename = "yellow")]
    Idea,
    #[serde(rename = "green")]
    Restaurant,
    #[serde(rename = "blue")]
    Place,
    #[serde(rename = "pink")]
    Plan,
    #[serde(rename = "orange")]
    Lodging,
}

impl From<String> for IdeaKind {
    fn from(color: String) -> Self {
        match color.as_str() {
            "green" => IdeaKind::Restaurant,
            "blue" => IdeaKind::Place,
            "pink" => IdeaKind::Plan,
            "orange" => IdeaKind::Lodging,
            _ => IdeaKind::Idea,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Expense {
    pub id: ItemId,
    #[serde(alias = "desc")]
    pub description: String,
    #[serde(alias = "cat")]
    pub category: Category,
    pub amount: Amount,
    #[serde(alias = "paidBy")]
    pub payer: Member,
    /// Empty means the expense is split among every member of the trip.
    #[serde(alias = "splitWith")]
    pub beneficiaries: Vec<Member>,
}

impl Expense {
    /// Who shares this expense given the current member list.
    pub fn effective_beneficiaries<'a>(&'a self, members: &'a [Member]) -> &'a [Member] {
        if self.beneficiaries.is_empty() {
            members
        } else {
            &self.beneficiaries
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum Category {
    Food,
    Transport,
    Lodging,
    Leisure,
    #[default]
    Other,
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        match name.as_str() {
            "food" | "comida" => Category::Food,
            "transport" | "transporte" => Category::Transport,
            "lodging" | "alojamiento" => Category::Lodging,
            "leisure" | "ocio" => Category::Leisure,
            _ => Category::Other,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChecklistItem {
    pub id: ItemId,
    pub text: String,
    pub done: bool,
}

impl ChecklistItem {
    pub fn new(id: ItemId, text: &str) -> Self {
        ChecklistItem {
            id,
            text: text.to_string(),
            done: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum ChecklistKind {
    #[serde(rename = "checklist")]
    Packing,
    #[serde(rename = "pre_list", alias = "preList")]
    PreDeparture,
}

/// A user-entered money amount. Reading never fails: anything that isn't a
/// number (or a string starting with one) becomes zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Amount(f64);

impl Amount {
    pub fn new(value: f64) -> Self {
        Amount(value)
    }

    /// The amount usable in arithmetic: non-finite and negative values count as zero.
    pub fn value(self) -> f64 {
        if self.0.is_finite() && self.0 > 0.0 {
            self.0
        } else {
            0.0
        }
    }

    pub fn raw(self) -> f64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawAmount {
            Number(f64),
            Text(String),
            Other(serde::de::IgnoredAny),
        }

        let value = match RawAmount::deserialize(deserializer)? {
            RawAmount::Number(n) => n,
            RawAmount::Text(text) => parse_leading_number(&text).unwrap_or(0.0),
            RawAmount::Other(_) => 0.0,
        };
        Ok(Amount(value))
    }
}

/// Reads the longest numeric prefix of `text`, so "12.5€" gives 12.5.
fn parse_leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let mut seen_dot = false;
    let mut seen_digit = false;
    while let Some(&c) = bytes.get(end) {
        match c {
            b'0'..=b'9' => {
                seen_digit = true;
                end += 1;
            }
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }

    // Exponent only counts when digits follow it: "3e" is still 3
    if seen_digit && matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let digits = bytes[exp_end..].iter().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 {
            end = exp_end + digits;
        }
    }
    text[..end].parse().ok()
}
