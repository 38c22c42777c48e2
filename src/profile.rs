//! Capability table of the supported ET44/ET45 models and their rebrands.

use std::fmt;

use crate::proto::{ProtoError, Result};

/// Set of legal values for a numeric setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Stepped models: only these values, in published order.
    Discrete(&'static [u32]),
    /// Continuous models: every integer in `min..=max`.
    Bounded { min: u32, max: u32 },
}

impl Domain {
    pub fn contains(&self, value: u32) -> bool {
        match self {
            Domain::Discrete(values) => values.contains(&value),
            Domain::Bounded { min, max } => (*min..=*max).contains(&value),
        }
    }

    /// Number of legal values.
    pub fn len(&self) -> usize {
        match self {
            Domain::Discrete(values) => values.len(),
            Domain::Bounded { min, max } => (max.saturating_sub(*min) as usize) + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Domain::Discrete(values) if values.is_empty())
    }

    pub fn min(&self) -> u32 {
        match self {
            Domain::Discrete(values) => values.iter().copied().min().unwrap_or(0),
            Domain::Bounded { min, .. } => *min,
        }
    }

    pub fn max(&self) -> u32 {
        match self {
            Domain::Discrete(values) => values.iter().copied().max().unwrap_or(0),
            Domain::Bounded { max, .. } => *max,
        }
    }

    /// All legal values in ascending (or published) order.
    pub fn values(&self) -> Vec<u32> {
        match self {
            Domain::Discrete(values) => values.to_vec(),
            Domain::Bounded { min, max } => (*min..=*max).collect(),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Discrete(values) => {
                let values: Vec<String> = values.iter().map(u32::to_string).collect();
                write!(f, "({})", values.join(", "))
            }
            Domain::Bounded { min, max } => write!(f, "[{}, {}]", min, max),
        }
    }
}

/// Frequency (Hz) and voltage (mV) domains of one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub model: &'static str,
    pub frequency: Domain,
    pub voltage: Domain,
}

const FREQ_10K: &[u32] = &[100, 120, 200, 400, 800, 1000, 2000, 4000, 8000, 10000];
const FREQ_20K: &[u32] = &[
    100, 120, 200, 400, 800, 1000, 2000, 4000, 8000, 10000, 15000, 20000,
];
const FREQ_100K: &[u32] = &[
    100, 120, 200, 400, 800, 1000, 2000, 4000, 8000, 10000, 15000, 20000, 40000, 50000, 80000,
    100000,
];
const VOLT_STEPPED: &[u32] = &[100, 300, 600, 1000, 1500, 2000];
const VOLT_CONTINUOUS: Domain = Domain::Bounded { min: 10, max: 2000 };

const fn stepped(model: &'static str, frequency: &'static [u32]) -> Profile {
    Profile {
        model,
        frequency: Domain::Discrete(frequency),
        voltage: Domain::Discrete(VOLT_STEPPED),
    }
}

const fn continuous(model: &'static str, max_frequency: u32) -> Profile {
    Profile {
        model,
        frequency: Domain::Bounded {
            min: 10,
            max: max_frequency,
        },
        voltage: VOLT_CONTINUOUS,
    }
}

pub static PROFILES: &[Profile] = &[
    stepped("ET4401", FREQ_10K),
    stepped("ET4402", FREQ_20K),
    stepped("ET4410", FREQ_100K),
    continuous("ET4501", 10000),
    continuous("ET4502", 20000),
    continuous("ET4510", 100000),
    stepped("RuoShui 4090A", FREQ_10K),
    stepped("RuoShui 4090B", FREQ_20K),
    stepped("RuoShui 4090C", FREQ_100K),
    continuous("RuoShui 4091A", 10000),
    continuous("RuoShui 4091B", 20000),
    continuous("RuoShui 4091C", 100000),
];

/// Look up the capability profile of a model, ignoring case and
/// surrounding whitespace.
pub fn profile_for(model: &str) -> Result<&'static Profile> {
    let model = model.trim();
    PROFILES
        .iter()
        .find(|p| p.model.eq_ignore_ascii_case(model))
        .ok_or_else(|| ProtoError::UnsupportedModel(model.to_string()))
}
