use serde::{Deserialize, Serialize};

use crate::currency::Currency;

pub type CompanionName = String;

/// Roster member every trip starts with, and the one a cleared roster
/// falls back to.
pub const DEFAULT_COMPANION: &str = "Me";

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Trip {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub flights: Vec<Flight>,
    #[serde(default)]
    pub hotel: Option<Hotel>,
    pub companions: Vec<CompanionName>,
    pub expenses: Vec<ExpenseRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightDirection {
    Outbound,
    Return,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Flight {
    pub direction: FlightDirection,
    pub code: String,
    pub pnr: String,
    pub date: String,
    pub from: String,
    pub to: String,
    pub departure: String,
    pub arrival: String,
    pub terminal: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Hotel {
    pub name: String,
    pub address: String,
    pub local_address: String,
    pub phone: String,
    pub booking_ref: String,
    pub check_in: String,
    pub check_out: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Transport,
    Lodging,
    Activity,
    Shopping,
    Other,
}

/// One shared cost. `amount` is always in the settlement currency (KRW);
/// `entered_amount`/`currency` keep what the user actually typed for display.
/// Records are immutable once stored, deletion is the only mutation.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExpenseRecord {
    pub id: String,
    pub name: String,
    pub date: String,
    pub category: Category,
    pub amount: f64,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub entered_amount: Option<f64>,
    pub payer: CompanionName,
    pub splits: Vec<CompanionName>,
    /// Denormalized for display. The settlement engine recomputes the share
    /// from `amount` and `splits` and never reads this field.
    #[serde(default)]
    pub per_person_share: Option<f64>,
}
