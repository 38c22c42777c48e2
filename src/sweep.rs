//! Frequency sweep: measure primary and secondary parameters at every
//! frequency a model supports (or a representative subset of them).

use chrono::{DateTime, Local};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::device::{Device, Options, Settings};
use crate::profile::Profile;
use crate::proto::ProtoError;
use crate::settings::{Circuit, PrimaryMode, SecondaryMode, Speed};

/// Frequencies visited on continuous models, up to 10 kHz.
pub const REPRESENTATIVE_FREQUENCIES: &[u32] = &[
    10, 15, 20, 30, 50, 80, //
    100, 150, 200, 300, 500, 800, //
    1000, 1500, 2000, 3000, 5000, 8000, 10000,
];

/// Appended group by group while the model supports every point of a group.
pub const EXTENDED_FREQUENCIES: &[&[u32]] = &[&[15000, 20000], &[30000, 50000, 80000, 100000]];

/// Domains with more points than this are not enumerated.
pub const DENSE_LIMIT: usize = 20;

/// Frequencies to visit for a model, in ascending (published) order.
pub fn frequencies(profile: &Profile) -> Vec<u32> {
    let domain = profile.frequency;
    if domain.len() <= DENSE_LIMIT {
        return domain.values();
    }

    let mut frequencies: Vec<u32> = REPRESENTATIVE_FREQUENCIES
        .iter()
        .copied()
        .filter(|f| domain.contains(*f))
        .collect();
    for group in EXTENDED_FREQUENCIES {
        if !group.iter().all(|f| domain.contains(*f)) {
            break;
        }
        frequencies.extend_from_slice(group);
    }
    frequencies
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepRequest {
    pub primary: PrimaryMode,
    /// Read in this order at every frequency.
    pub secondaries: Vec<SecondaryMode>,
    pub circuit: Circuit,
    /// Test signal level in mV.
    pub voltage: u32,
    /// DC bias in mV.
    pub bias: u32,
    pub speed: Speed,
    /// Wait after changing the frequency, before the first reading.
    pub settle: Duration,
}

impl SweepRequest {
    pub fn new(primary: PrimaryMode, secondaries: Vec<SecondaryMode>) -> Self {
        Self {
            primary,
            secondaries,
            circuit: Circuit::Series,
            voltage: 1000,
            bias: 0,
            speed: Speed::Slow,
            settle: Duration::from_secs(2),
        }
    }

    fn settings(&self) -> Settings {
        Settings {
            primary: Some(self.primary),
            circuit: Some(self.circuit),
            voltage: Some(self.voltage),
            bias: Some(self.bias),
            speed: Some(self.speed),
            ..Default::default()
        }
    }

    /// Column names: `f`, the primary parameter, then each secondary.
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["f".to_string(), self.primary.to_string()];
        header.extend(self.secondaries.iter().map(ToString::to_string));
        header
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub frequency_khz: f64,
    pub primary: f64,
    /// One value per requested secondary parameter, in request order.
    pub secondaries: Vec<f64>,
}

impl Row {
    pub fn values(&self) -> Vec<f64> {
        let mut values = vec![self.frequency_khz, self.primary];
        values.extend_from_slice(&self.secondaries);
        values
    }
}

#[derive(Debug, Clone)]
pub struct SweepResult {
    pub started: DateTime<Local>,
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

impl SweepResult {
    /// All values of one column, see [`SweepRequest::header`].
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.values().get(index).copied())
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Connection to instrument failed: {0}")]
    Connect(#[source] ProtoError),
    #[error("Unable to configure instrument: {0}")]
    Configure(#[source] ProtoError),
    #[error("Measurement at {frequency} Hz failed: {source}")]
    Measure {
        frequency: u32,
        #[source]
        source: ProtoError,
        /// Rows completed before the failure.
        partial: Box<SweepResult>,
    },
}

/// Connect to the instrument at `port`, sweep, and release the port.
pub async fn run(
    port: &str,
    options: Options,
    request: &SweepRequest,
) -> Result<SweepResult, SweepError> {
    let mut device = Device::new(port, options)
        .await
        .map_err(SweepError::Connect)?;
    let result = sweep(&mut device, request).await;
    if let Err(err) = device.close().await {
        warn!("closing {} failed: {}", port, err);
    }
    result
}

/// Configure `device` for `request` and measure at every frequency.
pub async fn sweep(device: &mut Device, request: &SweepRequest) -> Result<SweepResult, SweepError> {
    let mut result = SweepResult {
        started: Local::now(),
        header: request.header(),
        rows: Vec::new(),
    };

    device
        .apply(&request.settings())
        .await
        .map_err(SweepError::Configure)?;

    let frequencies = frequencies(device.profile());
    info!(
        model = device.profile().model,
        points = frequencies.len(),
        "sweep started"
    );

    for frequency in frequencies {
        match measure(device, request, frequency).await {
            Ok(row) => {
                debug!(frequency, primary = row.primary, "row complete");
                result.rows.push(row);
            }
            Err(source) => {
                return Err(SweepError::Measure {
                    frequency,
                    source,
                    partial: Box::new(result),
                })
            }
        }
    }

    info!(rows = result.rows.len(), "sweep finished");
    Ok(result)
}

async fn measure(
    device: &mut Device,
    request: &SweepRequest,
    frequency: u32,
) -> Result<Row, ProtoError> {
    device.set_frequency(frequency).await?;
    // No completion signal from the instrument, its averaging window
    // needs this long to follow the new frequency.
    tokio::time::sleep(request.settle).await;

    let mut secondaries = Vec::with_capacity(request.secondaries.len());
    for mode in &request.secondaries {
        device.set_secondary_mode(*mode).await?;
        secondaries.push(device.read().await?.secondary);
    }
    // Primary is read again after the last mode switch.
    let primary = device.read().await?.primary;

    Ok(Row {
        frequency_khz: frequency as f64 / 1000.0,
        primary,
        secondaries,
    })
}
