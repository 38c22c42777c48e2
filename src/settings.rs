//! Symbolic instrument settings.
//!
//! Every setting has a canonical upper case token (what [`fmt::Display`]
//! prints and [`std::str::FromStr`] accepts, case-insensitively) and a wire
//! token, which is what the instrument expects or answers. The two differ
//! where the firmware abbreviates, e.g. `THETA` travels as `THR` and the
//! parallel circuit is sent as `PAL` but reported as `PALLEL`.

use std::{fmt, str::FromStr};

use crate::proto::{ProtoError, Result};

pub trait Setting: Sized + Copy + 'static {
    /// Human readable name used in error messages.
    const NAME: &'static str;
    /// All legal values, in the order they are listed to the user.
    const ALL: &'static [Self];

    fn token(&self) -> &'static str;

    /// Token sent to the instrument.
    fn wire(&self) -> &'static str {
        self.token()
    }

    /// Decode a (possibly abbreviated) instrument answer.
    fn from_wire(response: &str) -> Option<Self> {
        let response = response.trim().to_uppercase();
        Self::ALL
            .iter()
            .find(|s| s.wire() == response || s.token() == response)
            .copied()
    }

    fn allowed() -> String {
        let tokens: Vec<&str> = Self::ALL.iter().map(|s| s.token()).collect();
        format!("({})", tokens.join(" | "))
    }

    fn parse_setting(value: &str) -> Result<Self> {
        let normalized = value.trim().to_uppercase();
        Self::ALL
            .iter()
            .find(|s| s.token() == normalized)
            .copied()
            .ok_or_else(|| ProtoError::invalid(Self::NAME, value, Self::allowed()))
    }
}

/// Primary measurement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryMode {
    Auto,
    /// Resistance
    R,
    /// Capacitance
    C,
    /// Inductance
    L,
    /// Impedance
    Z,
    /// DC resistance
    Dcr,
    /// Electrolytic capacitance
    Ecap,
}

impl Setting for PrimaryMode {
    const NAME: &'static str = "primary mode";
    const ALL: &'static [Self] = &[
        Self::Auto,
        Self::R,
        Self::C,
        Self::L,
        Self::Z,
        Self::Dcr,
        Self::Ecap,
    ];

    fn token(&self) -> &'static str {
        match self {
            PrimaryMode::Auto => "AUTO",
            PrimaryMode::R => "R",
            PrimaryMode::C => "C",
            PrimaryMode::L => "L",
            PrimaryMode::Z => "Z",
            PrimaryMode::Dcr => "DCR",
            PrimaryMode::Ecap => "ECAP",
        }
    }
}

/// Secondary measurement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryMode {
    /// Reactance
    X,
    /// Dissipation factor
    D,
    /// Quality factor
    Q,
    /// Phase angle
    Theta,
    /// Equivalent series resistance
    Esr,
}

impl Setting for SecondaryMode {
    const NAME: &'static str = "secondary mode";
    const ALL: &'static [Self] = &[Self::X, Self::D, Self::Q, Self::Theta, Self::Esr];

    fn token(&self) -> &'static str {
        match self {
            SecondaryMode::X => "X",
            SecondaryMode::D => "D",
            SecondaryMode::Q => "Q",
            SecondaryMode::Theta => "THETA",
            SecondaryMode::Esr => "ESR",
        }
    }

    fn wire(&self) -> &'static str {
        match self {
            SecondaryMode::Theta => "THR",
            other => other.token(),
        }
    }
}

/// Equivalent circuit the instrument models the DUT with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Circuit {
    Series,
    Parallel,
}

impl Setting for Circuit {
    const NAME: &'static str = "equivalent circuit";
    const ALL: &'static [Self] = &[Self::Series, Self::Parallel];

    fn token(&self) -> &'static str {
        match self {
            Circuit::Series => "SER",
            Circuit::Parallel => "PAR",
        }
    }

    fn wire(&self) -> &'static str {
        match self {
            Circuit::Series => "SER",
            Circuit::Parallel => "PAL",
        }
    }

    fn from_wire(response: &str) -> Option<Self> {
        match response.trim().to_uppercase().as_str() {
            "SERIAL" | "SER" => Some(Circuit::Series),
            // Firmware spells it "PALLEL".
            "PALLEL" | "PARALLEL" | "PAL" | "PAR" => Some(Circuit::Parallel),
            _ => None,
        }
    }
}

/// Measurement speed: 2, 4 or 8 samples per second. Slower is more accurate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    Fast,
    Medium,
    Slow,
}

impl Setting for Speed {
    const NAME: &'static str = "speed";
    const ALL: &'static [Self] = &[Self::Fast, Self::Medium, Self::Slow];

    fn token(&self) -> &'static str {
        match self {
            Speed::Fast => "FAST",
            Speed::Medium => "MEDIUM",
            Speed::Slow => "SLOW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Internal,
    Manual,
    External,
}

impl Setting for TriggerSource {
    const NAME: &'static str = "trigger source";
    const ALL: &'static [Self] = &[Self::Internal, Self::Manual, Self::External];

    fn token(&self) -> &'static str {
        match self {
            TriggerSource::Internal => "INT",
            TriggerSource::Manual => "MAN",
            TriggerSource::External => "EXT",
        }
    }
}

/// Source output impedance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputImpedance {
    Ohm30,
    Ohm100,
}

impl Setting for OutputImpedance {
    const NAME: &'static str = "output impedance";
    const ALL: &'static [Self] = &[Self::Ohm30, Self::Ohm100];

    fn token(&self) -> &'static str {
        match self {
            OutputImpedance::Ohm30 => "30",
            OutputImpedance::Ohm100 => "100",
        }
    }

    fn wire(&self) -> &'static str {
        match self {
            OutputImpedance::Ohm30 => "1",
            OutputImpedance::Ohm100 => "0",
        }
    }

    fn from_wire(response: &str) -> Option<Self> {
        match response.trim() {
            "1" => Some(OutputImpedance::Ohm30),
            "0" => Some(OutputImpedance::Ohm100),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPage {
    Measurement,
    Compare,
    System,
}

impl Setting for DisplayPage {
    const NAME: &'static str = "display page";
    const ALL: &'static [Self] = &[Self::Measurement, Self::Compare, Self::System];

    fn token(&self) -> &'static str {
        match self {
            DisplayPage::Measurement => "MEAS",
            DisplayPage::Compare => "COMP",
            DisplayPage::System => "SYS",
        }
    }

    fn wire(&self) -> &'static str {
        match self {
            DisplayPage::System => "SYST",
            other => other.token(),
        }
    }

    fn from_wire(response: &str) -> Option<Self> {
        match response.trim().to_uppercase().as_str() {
            "MEASUREMENT" | "MEAS" => Some(DisplayPage::Measurement),
            "COMPSET" | "COMP" => Some(DisplayPage::Compare),
            // Some firmware revisions answer "STSTEM".
            "SYSTEM" | "STSTEM" | "SYST" | "SYS" => Some(DisplayPage::System),
            _ => None,
        }
    }
}

/// Min/max/average statistics mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Averaging {
    Min,
    Max,
    Avg,
    Off,
}

impl Setting for Averaging {
    const NAME: &'static str = "averaging mode";
    const ALL: &'static [Self] = &[Self::Min, Self::Max, Self::Avg, Self::Off];

    fn token(&self) -> &'static str {
        match self {
            Averaging::Min => "MIN",
            Averaging::Max => "MAX",
            Averaging::Avg => "AVG",
            Averaging::Off => "OFF",
        }
    }
}

/// Bias limits in mV, identical for every model.
pub const BIAS_MIN: u32 = 0;
pub const BIAS_MAX: u32 = 1500;

pub(crate) fn switch_wire(state: bool) -> &'static str {
    if state {
        "ON"
    } else {
        "OFF"
    }
}

pub(crate) fn switch_from_wire(response: &str) -> Option<bool> {
    match response.trim().to_uppercase().as_str() {
        "ON" | "1" => Some(true),
        "OFF" | "0" => Some(false),
        _ => None,
    }
}

macro_rules! setting_traits {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.token())
                }
            }

            impl FromStr for $ty {
                type Err = ProtoError;

                fn from_str(s: &str) -> Result<Self> {
                    Self::parse_setting(s)
                }
            }
        )*
    };
}

setting_traits!(
    PrimaryMode,
    SecondaryMode,
    Circuit,
    Speed,
    TriggerSource,
    OutputImpedance,
    DisplayPage,
    Averaging
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("theta".parse::<SecondaryMode>().unwrap(), SecondaryMode::Theta);
        assert_eq!("EsR".parse::<SecondaryMode>().unwrap(), SecondaryMode::Esr);
        assert_eq!("DcR".parse::<PrimaryMode>().unwrap(), PrimaryMode::Dcr);
        assert_eq!("PaR".parse::<Circuit>().unwrap(), Circuit::Parallel);
        assert_eq!("medium".parse::<Speed>().unwrap(), Speed::Medium);
        assert_eq!("sys".parse::<DisplayPage>().unwrap(), DisplayPage::System);
    }

    #[test]
    fn invalid_value_lists_legal_set() {
        match "CCC".parse::<PrimaryMode>() {
            Err(ProtoError::InvalidSetting { allowed, .. }) => {
                assert_eq!(allowed, "(AUTO | R | C | L | Z | DCR | ECAP)")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn abbreviations_decode_to_canonical() {
        assert_eq!(SecondaryMode::from_wire("THR"), Some(SecondaryMode::Theta));
        assert_eq!(Circuit::from_wire("PALLEL"), Some(Circuit::Parallel));
        assert_eq!(Circuit::from_wire("serial"), Some(Circuit::Series));
        assert_eq!(DisplayPage::from_wire("COMPSET"), Some(DisplayPage::Compare));
        assert_eq!(DisplayPage::from_wire("STSTEM"), Some(DisplayPage::System));
        assert_eq!(OutputImpedance::from_wire("1"), Some(OutputImpedance::Ohm30));
        assert_eq!(Speed::from_wire("bogus"), None);
    }

    #[test]
    fn display_prints_canonical_token() {
        assert_eq!(SecondaryMode::Theta.to_string(), "THETA");
        assert_eq!(SecondaryMode::Theta.wire(), "THR");
        assert_eq!(Circuit::Parallel.to_string(), "PAR");
        assert_eq!(DisplayPage::System.wire(), "SYST");
    }
}
