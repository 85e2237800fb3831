// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Vulnerability counts per severity.
//!
//! The same shape is used for stored rollups (never negative) and for
//! signed deltas between two rollups.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign, Neg, Sub};

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// One column of a statistics row.
#[derive(
    Display, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StatisticField {
    #[display("total")]
    Total,
    #[display("critical")]
    Critical,
    #[display("high")]
    High,
    #[display("medium")]
    Medium,
    #[display("low")]
    Low,
    #[display("unknown")]
    Unknown,
    #[display("info")]
    Info,
}

impl StatisticField {
    pub const ALL: [StatisticField; 7] = [
        StatisticField::Total,
        StatisticField::Critical,
        StatisticField::High,
        StatisticField::Medium,
        StatisticField::Low,
        StatisticField::Unknown,
        StatisticField::Info,
    ];
}

/// Total plus per-severity vulnerability counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub total: i64,
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
    pub unknown: i64,
    pub info: i64,
}

impl SeverityCounts {
    pub const ZERO: SeverityCounts = SeverityCounts {
        total: 0,
        critical: 0,
        high: 0,
        medium: 0,
        low: 0,
        unknown: 0,
        info: 0,
    };

    pub fn get(&self, field: StatisticField) -> i64 {
        match field {
            StatisticField::Total => self.total,
            StatisticField::Critical => self.critical,
            StatisticField::High => self.high,
            StatisticField::Medium => self.medium,
            StatisticField::Low => self.low,
            StatisticField::Unknown => self.unknown,
            StatisticField::Info => self.info,
        }
    }

    fn map(self, other: SeverityCounts, f: impl Fn(i64, i64) -> i64) -> SeverityCounts {
        SeverityCounts {
            total: f(self.total, other.total),
            critical: f(self.critical, other.critical),
            high: f(self.high, other.high),
            medium: f(self.medium, other.medium),
            low: f(self.low, other.low),
            unknown: f(self.unknown, other.unknown),
            info: f(self.info, other.info),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Multiply every field by `coefficient` (`-1` to retract a contribution).
    pub fn scaled(self, coefficient: i64) -> SeverityCounts {
        self.map(Self::ZERO, |v, _| v * coefficient)
    }

    /// `max(self + delta, 0)` per field, the rule stored rollups follow.
    pub fn floored_add(self, delta: SeverityCounts) -> SeverityCounts {
        self.map(delta, |v, d| (v + d).max(0))
    }

    /// Non-zero fields only, keyed by column name.
    pub fn changes(&self) -> BTreeMap<StatisticField, i64> {
        StatisticField::ALL
            .into_iter()
            .map(|field| (field, self.get(field)))
            .filter(|&(_, value)| value != 0)
            .collect()
    }
}

impl Add for SeverityCounts {
    type Output = SeverityCounts;

    fn add(self, rhs: SeverityCounts) -> SeverityCounts {
        self.map(rhs, |a, b| a + b)
    }
}

impl AddAssign for SeverityCounts {
    fn add_assign(&mut self, rhs: SeverityCounts) {
        *self = *self + rhs;
    }
}

impl Sub for SeverityCounts {
    type Output = SeverityCounts;

    fn sub(self, rhs: SeverityCounts) -> SeverityCounts {
        self.map(rhs, |a, b| a - b)
    }
}

impl Neg for SeverityCounts {
    type Output = SeverityCounts;

    fn neg(self) -> SeverityCounts {
        self.scaled(-1)
    }
}
