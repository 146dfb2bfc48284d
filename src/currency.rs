use serde::{Deserialize, Serialize};

// Fixed rates, deliberately not fetched from anywhere. The dashboard settles
// everything in KRW and only needs rough figures for amounts entered in
// another currency.
const KRW_PER_TWD: f64 = 42.0;
const KRW_PER_JPY: f64 = 9.2;
const KRW_PER_USD: f64 = 1390.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Krw,
    Twd,
    Jpy,
    Usd,
}

impl Currency {
    /// Converts an entered amount into the settlement currency.
    pub fn to_krw(self, amount: f64) -> f64 {
        match self {
            Currency::Krw => amount,
            Currency::Twd => amount * KRW_PER_TWD,
            Currency::Jpy => amount * KRW_PER_JPY,
            Currency::Usd => amount * KRW_PER_USD,
        }
    }
}
