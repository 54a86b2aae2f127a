//! Threshold windows shared by sensor warnings and controller inputs.
//!
//! A window has an optional `above` and an optional `below` bound.  When both
//! are set and `above < below` the window is a band and a value must lie
//! strictly inside it.  Otherwise the bounds are independent triggers: the
//! value must be above `above` *or* below `below`.  A window with no bounds
//! never matches.

use serde::{Deserialize, Serialize};

use crate::sensors::{BAD_VALUE, Reading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Window {
    pub above: Option<Reading>,
    pub below: Option<Reading>,
}

impl Window {
    pub const NONE: Self = Self {
        above: None,
        below: None,
    };

    /// Matches readings `>= value`.
    pub const fn at_least(value: Reading) -> Self {
        Self {
            above: Some(value.saturating_sub(1)),
            below: None,
        }
    }

    /// Matches readings `<= value`.
    pub const fn at_most(value: Reading) -> Self {
        if value == Reading::MAX {
            // Every valid reading.
            return Self::above(BAD_VALUE);
        }
        Self {
            above: None,
            below: Some(value + 1),
        }
    }

    /// Matches readings strictly greater than `value`.
    pub const fn above(value: Reading) -> Self {
        Self {
            above: Some(value),
            below: None,
        }
    }

    /// Matches readings strictly less than `value`.
    pub const fn below(value: Reading) -> Self {
        Self {
            above: None,
            below: Some(value),
        }
    }

    /// Matches readings strictly between the two bounds.
    pub const fn between(low: Reading, high: Reading) -> Self {
        Self {
            above: Some(low),
            below: Some(high),
        }
    }

    pub const fn is_set(&self) -> bool {
        self.above.is_some() || self.below.is_some()
    }

    /// Evaluate `value` against the window.  The bad-value sentinel never
    /// matches.
    pub fn matches(&self, value: Reading) -> bool {
        if value == BAD_VALUE {
            return false;
        }
        let high = self.above.is_some_and(|a| value > a);
        let low = self.below.is_some_and(|b| value < b);
        match (self.above, self.below) {
            (Some(a), Some(b)) if a < b => high && low,
            _ => high || low,
        }
    }
}
