use std::fmt;
use std::ops::RangeInclusive;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::search::SearchProvider;

pub const MAX_RESULTS_RANGE: RangeInclusive<u8> = 5..=20;
pub const DEPTH_RANGE: RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    #[value(name = "24h")]
    #[serde(rename = "24h")]
    Day,
    Week,
    #[default]
    Month,
    Year,
    All,
}

impl TimeRange {
    /// Period name for provider date filters; `None` means unrestricted.
    pub fn period(self) -> Option<&'static str> {
        match self {
            TimeRange::Day => Some("day"),
            TimeRange::Week => Some("week"),
            TimeRange::Month => Some("month"),
            TimeRange::Year => Some("year"),
            TimeRange::All => None,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeRange::Day => "24h",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
            TimeRange::All => "all time",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    News,
    Academic,
    Blogs,
    Forums,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceType::News => "news",
            SourceType::Academic => "academic",
            SourceType::Blogs => "blogs",
            SourceType::Forums => "forums",
        })
    }
}

pub fn default_source_types() -> Vec<SourceType> {
    vec![SourceType::News, SourceType::Academic]
}

/// User-chosen knobs for one research run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub search_api: SearchProvider,
    pub max_results: u8,
    pub time_range: TimeRange,
    pub depth: u8,
    pub sources: Vec<SourceType>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            search_api: SearchProvider::default(),
            max_results: 10,
            time_range: TimeRange::default(),
            depth: 3,
            sources: default_source_types(),
        }
    }
}

impl SearchSettings {
    /// Clamps numeric fields into their documented ranges and dedupes source types.
    pub fn normalized(mut self) -> Self {
        let max_results = clamp_logged("max_results", self.max_results, &MAX_RESULTS_RANGE);
        let depth = clamp_logged("depth", self.depth, &DEPTH_RANGE);
        self.max_results = max_results;
        self.depth = depth;

        let mut seen = Vec::with_capacity(self.sources.len());
        for s in self.sources {
            if !seen.contains(&s) {
                seen.push(s);
            }
        }
        self.sources = seen;
        self
    }

    pub fn news_only(&self) -> bool {
        self.sources == [SourceType::News]
    }
}

fn clamp_logged(field: &str, value: u8, range: &RangeInclusive<u8>) -> u8 {
    let clamped = value.clamp(*range.start(), *range.end());
    if clamped != value {
        warn!(
            field,
            value,
            clamped,
            "setting outside {}..={}, clamped",
            range.start(),
            range.end()
        );
    }
    clamped
}
