use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(format!("unknown direction {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub mentor_id: String,
    pub ea_id: String,
    pub direction: Direction,
    pub symbol: String,
    pub entry_price: Option<f64>,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub size: Option<f64>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A signal as submitted by a mentor, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSignal {
    pub ea_id: Option<String>,
    pub direction: Option<String>,
    pub symbol: Option<String>,
    #[serde(alias = "sl")]
    pub stop_loss: Option<f64>,
    #[serde(alias = "tp")]
    pub take_profit: Option<f64>,
    #[serde(alias = "entry")]
    pub entry_price: Option<f64>,
    #[serde(alias = "lot")]
    pub size: Option<f64>,
    pub comment: Option<String>,
}
