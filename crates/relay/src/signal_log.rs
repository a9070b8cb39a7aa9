use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use common::models::{Direction, NewSignal, Signal};
use common::{RelayError, RelayResult};

pub const MAX_SIGNALS: usize = 100;
pub const DEFAULT_EA: &str = "default";

/// A signal that passed validation and only lacks an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDraft {
    pub ea_id: String,
    pub direction: Direction,
    pub symbol: String,
    pub entry_price: Option<f64>,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub size: Option<f64>,
    pub comment: Option<String>,
}

impl SignalDraft {
    /// Missing required fields are reported first, all together, in a fixed
    /// order. Only a complete submission is then checked for malformed values.
    pub fn parse(input: NewSignal) -> RelayResult<Self> {
        let direction = non_blank(input.direction);
        let symbol = non_blank(input.symbol);

        let mut missing = Vec::new();
        if direction.is_none() {
            missing.push("direction");
        }
        if symbol.is_none() {
            missing.push("symbol");
        }
        if input.stop_loss.is_none() {
            missing.push("stop_loss");
        }
        if input.take_profit.is_none() {
            missing.push("take_profit");
        }
        let (Some(direction), Some(symbol), Some(stop_loss), Some(take_profit)) =
            (direction, symbol, input.stop_loss, input.take_profit)
        else {
            return Err(RelayError::validation(missing));
        };

        let mut malformed = Vec::new();
        let direction = direction.parse::<Direction>().ok();
        if direction.is_none() {
            malformed.push("direction");
        }
        if !stop_loss.is_finite() {
            malformed.push("stop_loss");
        }
        if !take_profit.is_finite() {
            malformed.push("take_profit");
        }
        if input.entry_price.is_some_and(|p| !p.is_finite()) {
            malformed.push("entry_price");
        }
        if input.size.is_some_and(|s| !(s.is_finite() && s > 0.0)) {
            malformed.push("size");
        }
        let Some(direction) = direction else {
            return Err(RelayError::validation(malformed));
        };
        if !malformed.is_empty() {
            return Err(RelayError::validation(malformed));
        }

        Ok(Self {
            ea_id: non_blank(input.ea_id).unwrap_or_else(|| DEFAULT_EA.to_string()),
            direction,
            symbol: symbol.to_uppercase(),
            entry_price: input.entry_price,
            stop_loss,
            take_profit,
            size: input.size,
            comment: non_blank(input.comment),
        })
    }
}

/// Bounded, newest-first history of signals.
///
/// Not synchronized on its own; `SignalFeed` owns it behind a lock.
pub struct SignalLog {
    entries: VecDeque<Signal>,
    capacity: usize,
    last_id: u64,
}

impl SignalLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SIGNALS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            last_id: 0,
        }
    }

    /// Reloads persisted history (newest first) and seeds the id sequence past it.
    pub fn restore(&mut self, signals: Vec<Signal>) {
        for signal in signals.into_iter().take(self.capacity) {
            if let Ok(id) = signal.id.parse::<u64>() {
                self.last_id = self.last_id.max(id);
            }
            self.entries.push_back(signal);
        }
    }

    pub fn append(&mut self, mentor_id: &str, draft: SignalDraft, now: DateTime<Utc>) -> Signal {
        let signal = Signal {
            id: self.next_id(now).to_string(),
            mentor_id: mentor_id.to_string(),
            ea_id: draft.ea_id,
            direction: draft.direction,
            symbol: draft.symbol,
            entry_price: draft.entry_price,
            stop_loss: draft.stop_loss,
            take_profit: draft.take_profit,
            size: draft.size,
            comment: draft.comment,
            created_at: now,
        };

        self.entries.push_front(signal.clone());
        self.entries.truncate(self.capacity);
        signal
    }

    /// Millisecond timestamp, bumped past the previous id when the clock
    /// stalls or steps back.
    fn next_id(&mut self, now: DateTime<Utc>) -> u64 {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let id = millis.max(self.last_id + 1);
        self.last_id = id;
        id
    }

    pub fn recent(&self, n: usize) -> Vec<Signal> {
        self.entries.iter().take(n).cloned().collect()
    }

    pub fn all(&self) -> Vec<Signal> {
        self.entries.iter().cloned().collect()
    }

    pub fn by_ea(&self, ea_id: &str) -> Vec<Signal> {
        self.entries
            .iter()
            .filter(|s| s.ea_id == ea_id)
            .cloned()
            .collect()
    }

    pub fn by_mentor(&self, mentor_id: &str) -> Vec<Signal> {
        self.entries
            .iter()
            .filter(|s| s.mentor_id == mentor_id)
            .cloned()
            .collect()
    }

    /// Signals issued after `after_id`, newest first.
    pub fn since(&self, after_id: &str) -> RelayResult<Vec<Signal>> {
        let after = after_id
            .trim()
            .parse::<u64>()
            .map_err(|_| RelayError::validation(["since"]))?;

        Ok(self
            .entries
            .iter()
            .take_while(|s| s.id.parse::<u64>().is_ok_and(|id| id > after))
            .cloned()
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SignalLog {
    fn default() -> Self {
        Self::new()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
