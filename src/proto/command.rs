use std::fmt;

use crate::settings::{
    switch_wire, Averaging, Circuit, DisplayPage, OutputImpedance, PrimaryMode, SecondaryMode,
    Setting, Speed, TriggerSource,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Id,
    Beep,
    Trigger,
    // Keyboard
    Lock,
    Unlock,
    Calibrate,
    Fetch,
    // Measurement modes
    SetPrimary(PrimaryMode),
    GetPrimary,
    SetSecondary(SecondaryMode),
    GetSecondary,
    SetCircuit(Circuit),
    GetCircuit,
    SetSpeed(Speed),
    GetSpeed,
    SetTriggerSource(TriggerSource),
    GetTriggerSource,
    SetOutputImpedance(OutputImpedance),
    GetOutputImpedance,
    // Source
    SetVoltage(u32),
    GetVoltage,
    SetBias(u32),
    GetBias,
    SetFrequency(u32),
    GetFrequency,
    // Relative / range / statistics
    SetRelative(bool),
    GetRelative,
    SetAutoRange(bool),
    GetAutoRange,
    SetAveraging(Averaging),
    GetAveraging,
    GetAveragedValue,
    SetDisplay(DisplayPage),
    GetDisplay,
    /// Any other command line, sent verbatim.
    Raw(String),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Id => f.write_str("*IDN?"),
            Command::Beep => f.write_str("SYST:BEEP"),
            Command::Trigger => f.write_str("*TRG"),
            Command::Lock => f.write_str("SYST:REMote"),
            Command::Unlock => f.write_str("SYST:LOCAL"),
            Command::Calibrate => f.write_str("CORR:EXEC"),
            Command::Fetch => f.write_str("FETCH?"),
            Command::SetPrimary(mode) => write!(f, "FUNC:IMP:A {}", mode.wire()),
            Command::GetPrimary => f.write_str("FUNC:IMP:A?"),
            Command::SetSecondary(mode) => write!(f, "FUNC:IMP:B {}", mode.wire()),
            Command::GetSecondary => f.write_str("FUNC:IMP:B?"),
            Command::SetCircuit(circuit) => write!(f, "FUNC:IMP:EQU {}", circuit.wire()),
            Command::GetCircuit => f.write_str("FUNC:IMP:EQU?"),
            Command::SetSpeed(speed) => write!(f, "APERture {}", speed.wire()),
            Command::GetSpeed => f.write_str("APERture?"),
            Command::SetTriggerSource(source) => write!(f, "SYSTEM:SOURCE {}", source.wire()),
            Command::GetTriggerSource => f.write_str("SYSTEM:SOURCE?"),
            Command::SetOutputImpedance(z) => write!(f, "OUT:RES {}", z.wire()),
            Command::GetOutputImpedance => f.write_str("OUT:RES?"),
            Command::SetVoltage(mv) => write!(f, "VOLT {}", mv),
            Command::GetVoltage => f.write_str("VOLT?"),
            Command::SetBias(mv) => write!(f, "BIAS:VOLT {}", mv),
            Command::GetBias => f.write_str("BIAS:VOLT?"),
            Command::SetFrequency(hz) => write!(f, "FREQ {}", hz),
            Command::GetFrequency => f.write_str("FREQ?"),
            Command::SetRelative(state) => write!(f, "FUNC:DEV:MODE {}", switch_wire(*state)),
            Command::GetRelative => f.write_str("FUNC:DEV:MODE?"),
            Command::SetAutoRange(state) => {
                write!(f, "FUNC:IMP:RANGE:AUTO {}", switch_wire(*state))
            }
            Command::GetAutoRange => f.write_str("FUNC:IMP:RANGE:AUTO?"),
            Command::SetAveraging(avg) => write!(f, "FUNC:COM {}", avg.wire()),
            Command::GetAveraging => f.write_str("FUNC:COM?"),
            Command::GetAveragedValue => f.write_str("FUNC:COMV?"),
            Command::SetDisplay(page) => write!(f, "DISP:PAGE {}", page.wire()),
            Command::GetDisplay => f.write_str("DISP:PAGE?"),
            Command::Raw(line) => f.write_str(line),
        }
    }
}

impl From<&str> for Command {
    fn from(line: &str) -> Self {
        Command::Raw(line.to_string())
    }
}

impl From<String> for Command {
    fn from(line: String) -> Self {
        Command::Raw(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviated_tokens_are_sent() {
        assert_eq!(
            Command::SetSecondary(SecondaryMode::Theta).to_string(),
            "FUNC:IMP:B THR"
        );
        assert_eq!(
            Command::SetCircuit(Circuit::Parallel).to_string(),
            "FUNC:IMP:EQU PAL"
        );
        assert_eq!(
            Command::SetDisplay(DisplayPage::System).to_string(),
            "DISP:PAGE SYST"
        );
        assert_eq!(
            Command::SetOutputImpedance(OutputImpedance::Ohm100).to_string(),
            "OUT:RES 0"
        );
    }

    #[test]
    fn numeric_arguments_are_integers() {
        assert_eq!(Command::SetVoltage(1000).to_string(), "VOLT 1000");
        assert_eq!(Command::SetBias(0).to_string(), "BIAS:VOLT 0");
        assert_eq!(Command::SetFrequency(100000).to_string(), "FREQ 100000");
        assert_eq!(Command::SetRelative(true).to_string(), "FUNC:DEV:MODE ON");
    }
}
