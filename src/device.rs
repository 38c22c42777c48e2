use futures::{SinkExt, StreamExt};
use std::ops::{Deref, DerefMut};
use std::{fmt, io, pin::Pin, time::Duration};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::Decoder;
use tracing::{debug, info, warn};

use crate::profile::{profile_for, Profile};
use crate::proto::{
    codec::ProtocolCodec,
    command::Command,
    response::{Ident, Reading, Response},
    ProtoError, Result,
};
use crate::settings::{
    switch_from_wire, Averaging, Circuit, DisplayPage, OutputImpedance, PrimaryMode,
    SecondaryMode, Setting, Speed, TriggerSource, BIAS_MAX, BIAS_MIN,
};
use crate::{DEFAULT_BAUDRATE, DEFAULT_TIMEOUT};

trait AsyncReadWrite<S>: futures::Sink<S> + futures::Stream {}

impl<T, S> AsyncReadWrite<S> for T where T: futures::Sink<S> + futures::Stream {}

#[allow(clippy::type_complexity)]
struct Connection {
    stream: Pin<
        Box<
            dyn AsyncReadWrite<
                    Command,
                    Error = io::Error,
                    Item = std::result::Result<Response, io::Error>,
                > + Send,
        >,
    >,
    timeout: Duration,
    delay: Duration,
}

impl Connection {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    async fn send(&mut self, command: Command) -> Result<()> {
        debug!(command = %command, "send");
        self.stream.send(command).await?;
        self.pause().await;
        Ok(())
    }

    async fn receive(&mut self, command: &str) -> Result<Response> {
        match tokio::time::timeout(self.timeout, self.stream.next()).await {
            Ok(Some(Ok(response))) => {
                debug!(command, response = %response, "receive");
                self.pause().await;
                Ok(response)
            }
            Ok(Some(Err(ioerr))) => Err(ioerr.into()),
            Ok(None) => Err(ProtoError::Abort),
            Err(_elapsed) => Err(ProtoError::Timeout {
                command: command.to_string(),
                timeout: self.timeout,
            }),
        }
    }

    async fn write(&mut self, command: Command) -> Result<()> {
        let line = command.to_string();
        self.send(command).await?;
        match self.receive(&line).await? {
            Response::Success => Ok(()),
            Response::UnknownCommand => Err(ProtoError::UnknownCommand(line)),
            Response::ExecutionError => Err(ProtoError::ExecutionFailed(line)),
            response => Err(ProtoError::Unexpected {
                command: line,
                response: response.to_string(),
            }),
        }
    }

    async fn collect(&mut self, command: Command, lines: usize) -> Result<Vec<Option<String>>> {
        let line = command.to_string();
        self.send(command).await?;
        let mut values = Vec::with_capacity(lines);
        for _ in 0..lines {
            match self.receive(&line).await? {
                Response::Payload(value) => values.push(Some(value)),
                Response::ReadError => {
                    warn!(command = %line, "Rcmd err, no value for this line");
                    values.push(None);
                }
                Response::UnknownCommand => return Err(ProtoError::UnknownCommand(line)),
                Response::ExecutionError => return Err(ProtoError::ExecutionFailed(line)),
                Response::Success => {
                    return Err(ProtoError::Unexpected {
                        command: line,
                        response: Response::Success.to_string(),
                    })
                }
            }
        }
        Ok(values)
    }

    async fn query_lines(
        &mut self,
        command: Command,
        lines: usize,
        timeout: Option<Duration>,
    ) -> Result<Vec<Option<String>>> {
        match timeout {
            Some(timeout) => {
                ScopedTimeout::new(self, timeout)
                    .collect(command, lines)
                    .await
            }
            None => self.collect(command, lines).await,
        }
    }

    /// Read and discard lines until none arrives within `wait`.
    async fn drain(&mut self, wait: Duration) -> Result<Vec<Response>> {
        let mut stale = Vec::new();
        loop {
            match tokio::time::timeout(wait, self.stream.next()).await {
                Ok(Some(Ok(response))) => {
                    warn!(response = %response, "discarding stale response");
                    stale.push(response);
                }
                Ok(Some(Err(ioerr))) => return Err(ioerr.into()),
                Ok(None) => return Err(ProtoError::Abort),
                Err(_elapsed) => return Ok(stale),
            }
        }
    }

    async fn query(&mut self, command: Command) -> Result<String> {
        let line = command.to_string();
        self.query_lines(command, 1, None)
            .await?
            .pop()
            .flatten()
            .ok_or(ProtoError::ReadFailed(line))
    }
}

/// Timeout override for the lifetime of the guard. The previous timeout is
/// restored on drop, which also covers a cancelled future.
struct ScopedTimeout<'a> {
    connection: &'a mut Connection,
    previous: Duration,
}

impl<'a> ScopedTimeout<'a> {
    fn new(connection: &'a mut Connection, timeout: Duration) -> Self {
        let previous = std::mem::replace(&mut connection.timeout, timeout);
        Self {
            connection,
            previous,
        }
    }
}

impl Deref for ScopedTimeout<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.connection
    }
}

impl DerefMut for ScopedTimeout<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection
    }
}

impl Drop for ScopedTimeout<'_> {
    fn drop(&mut self) {
        self.connection.timeout = self.previous;
    }
}

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct Options {
    /// Must match the baudrate configured on the instrument.
    pub baudrate: u32,
    /// Read timeout for each response line.
    pub timeout: Duration,
    /// Pause after every write and read.
    pub delay: Duration,
    /// Replaces the model reported by `*IDN?`, for rebranded units that
    /// identify themselves with an unexpected string.
    pub model: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            baudrate: DEFAULT_BAUDRATE,
            timeout: DEFAULT_TIMEOUT,
            delay: Duration::ZERO,
            model: None,
        }
    }
}

/// Setting values to apply at once, see [`Device::apply`].
/// `None` leaves the current instrument value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub primary: Option<PrimaryMode>,
    pub secondary: Option<SecondaryMode>,
    pub circuit: Option<Circuit>,
    pub speed: Option<Speed>,
    pub trigger_source: Option<TriggerSource>,
    pub output_impedance: Option<OutputImpedance>,
    pub frequency: Option<u32>,
    pub voltage: Option<u32>,
    pub bias: Option<u32>,
    pub relative: Option<bool>,
    pub auto_range: Option<bool>,
    pub averaging: Option<Averaging>,
    pub display: Option<DisplayPage>,
}

/// Current instrument configuration, as reported by the instrument.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub ident: Ident,
    pub profile: &'static Profile,
    pub primary: PrimaryMode,
    pub secondary: SecondaryMode,
    pub circuit: Circuit,
    pub speed: Speed,
    pub frequency: f64,
    pub voltage: f64,
    pub bias: f64,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model:          {}", self.ident.model)?;
        writeln!(f, "Serial:         {}", self.ident.serial)?;
        writeln!(f, "Firmware:       {}", self.ident.firmware)?;
        writeln!(f, "Hardware:       {}", self.ident.hardware)?;
        writeln!(f)?;
        writeln!(f, "Voltrange:      {} mV", self.profile.voltage)?;
        writeln!(f, "Freqrange:      {} Hz", self.profile.frequency)?;
        writeln!(f)?;
        writeln!(
            f,
            "mode:           {}, {}, {}",
            self.primary, self.secondary, self.circuit
        )?;
        writeln!(f, "speed:          {}", self.speed)?;
        writeln!(f, "freq:           {} Hz", self.frequency)?;
        writeln!(f, "voltage:        {} mV", self.voltage)?;
        write!(f, "bias:           {} mV", self.bias)
    }
}

/// ET44/ET45 LCR meter.
///
/// Nothing is cached: every getter queries the instrument, which may have
/// been changed from the front panel in the meantime.
pub struct Device {
    connection: Connection,
    ident: Ident,
    profile: &'static Profile,
}

impl Device {
    /// Open the serial port and identify the instrument.
    pub async fn new(com: impl AsRef<str>, options: Options) -> Result<Self> {
        let port_name = com.as_ref();
        let connection_failed = |source| ProtoError::ConnectionFailed {
            port: port_name.to_string(),
            source,
        };

        #[allow(unused_mut)]
        let mut port = tokio_serial::new(port_name, options.baudrate)
            .timeout(options.timeout)
            .open_native_async()
            .map_err(connection_failed)?;

        #[cfg(unix)]
        port.set_exclusive(false).map_err(connection_failed)?;

        info!(port = port_name, baudrate = options.baudrate, "serial port opened");
        Self::with_transport(port, options).await
    }

    /// Identify the instrument behind an already opened transport.
    pub async fn with_transport<T>(io: T, options: Options) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut connection = Connection {
            stream: Box::pin(ProtocolCodec.framed(io)),
            timeout: options.timeout,
            delay: options.delay,
        };

        let response = connection.query(Command::Id).await?;
        let mut ident = Ident::try_from(response.as_str())?;
        if let Some(model) = options.model {
            debug!(reported = %ident.model, model = %model, "model override");
            ident.model = model;
        }
        let profile = profile_for(&ident.model)?;
        info!(
            model = %ident.model,
            serial = %ident.serial,
            firmware = %ident.firmware,
            "instrument identified"
        );

        Ok(Self {
            connection,
            ident,
            profile,
        })
    }

    pub fn ident(&self) -> &Ident {
        &self.ident
    }

    pub fn profile(&self) -> &'static Profile {
        self.profile
    }

    pub fn timeout(&self) -> Duration {
        self.connection.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.connection.timeout = timeout;
    }

    /// Shut the transport down. Dropping the device releases it as well.
    pub async fn close(mut self) -> Result<()> {
        self.connection.stream.close().await?;
        Ok(())
    }

    // Raw access

    /// Send a command and expect `exec success`.
    pub async fn write(&mut self, command: impl Into<Command>) -> Result<()> {
        self.connection.write(command.into()).await
    }

    /// Send a command and return its single response line.
    pub async fn query(&mut self, command: impl Into<Command>) -> Result<String> {
        self.connection.query(command.into()).await
    }

    /// Send a command and collect `lines` response lines. Lines answered
    /// with `Rcmd err` are `None`. A `timeout` applies to this call only.
    pub async fn query_lines(
        &mut self,
        command: impl Into<Command>,
        lines: usize,
        timeout: Option<Duration>,
    ) -> Result<Vec<Option<String>>> {
        let command = command.into();
        if lines == 0 {
            return Err(ProtoError::invalid("response lines", lines, "1 or more"));
        }
        self.connection.query_lines(command, lines, timeout).await
    }

    /// Discard response lines left over from an unacknowledged command,
    /// such as the late answer to [`Device::calibrate`]. Returns once no
    /// line arrived within `wait`.
    pub async fn discard_pending(&mut self, wait: Duration) -> Result<Vec<String>> {
        let stale = self.connection.drain(wait).await?;
        Ok(stale.iter().map(ToString::to_string).collect())
    }

    async fn query_setting<S: Setting>(&mut self, command: Command) -> Result<S> {
        let line = command.to_string();
        let response = self.connection.query(command).await?;
        S::from_wire(&response).ok_or(ProtoError::Unexpected {
            command: line,
            response,
        })
    }

    async fn query_number(&mut self, command: Command) -> Result<f64> {
        let line = command.to_string();
        let response = self.connection.query(command).await?;
        response
            .trim()
            .parse::<f64>()
            .map_err(|_| ProtoError::Unexpected {
                command: line,
                response,
            })
    }

    async fn query_switch(&mut self, command: Command) -> Result<bool> {
        let line = command.to_string();
        let response = self.connection.query(command).await?;
        switch_from_wire(&response).ok_or(ProtoError::Unexpected {
            command: line,
            response,
        })
    }

    // Basics

    pub async fn identify(&mut self) -> Result<String> {
        self.connection.query(Command::Id).await
    }

    pub async fn beep(&mut self) -> Result<()> {
        self.connection.write(Command::Beep).await
    }

    pub async fn trigger(&mut self) -> Result<()> {
        self.connection.write(Command::Trigger).await
    }

    /// Lock the front panel keyboard.
    pub async fn lock(&mut self) -> Result<()> {
        self.connection.write(Command::Lock).await
    }

    pub async fn unlock(&mut self) -> Result<()> {
        self.connection.write(Command::Unlock).await
    }

    /// Run one open/short correction step. The instrument detects whether
    /// the probes are open or shorted; each of them needs two calls.
    ///
    /// No response is awaited. Some firmware answers once the correction
    /// cycle has finished; that late line would be taken as the answer to
    /// the next command, so call [`Device::discard_pending`] with a wait
    /// longer than the cycle before issuing further commands.
    pub async fn calibrate(&mut self) -> Result<()> {
        self.connection.send(Command::Calibrate).await
    }

    // Measurement modes

    pub async fn primary_mode(&mut self) -> Result<PrimaryMode> {
        self.query_setting(Command::GetPrimary).await
    }

    pub async fn set_primary_mode(&mut self, mode: PrimaryMode) -> Result<()> {
        self.connection.write(Command::SetPrimary(mode)).await
    }

    pub async fn secondary_mode(&mut self) -> Result<SecondaryMode> {
        self.query_setting(Command::GetSecondary).await
    }

    pub async fn set_secondary_mode(&mut self, mode: SecondaryMode) -> Result<()> {
        self.connection.write(Command::SetSecondary(mode)).await
    }

    pub async fn circuit(&mut self) -> Result<Circuit> {
        self.query_setting(Command::GetCircuit).await
    }

    pub async fn set_circuit(&mut self, circuit: Circuit) -> Result<()> {
        self.connection.write(Command::SetCircuit(circuit)).await
    }

    pub async fn speed(&mut self) -> Result<Speed> {
        self.query_setting(Command::GetSpeed).await
    }

    pub async fn set_speed(&mut self, speed: Speed) -> Result<()> {
        self.connection.write(Command::SetSpeed(speed)).await
    }

    pub async fn trigger_source(&mut self) -> Result<TriggerSource> {
        self.query_setting(Command::GetTriggerSource).await
    }

    pub async fn set_trigger_source(&mut self, source: TriggerSource) -> Result<()> {
        self.connection.write(Command::SetTriggerSource(source)).await
    }

    pub async fn output_impedance(&mut self) -> Result<OutputImpedance> {
        self.query_setting(Command::GetOutputImpedance).await
    }

    pub async fn set_output_impedance(&mut self, impedance: OutputImpedance) -> Result<()> {
        self.connection
            .write(Command::SetOutputImpedance(impedance))
            .await
    }

    // Voltage, bias and frequency

    /// Test signal level in mV.
    pub async fn voltage(&mut self) -> Result<f64> {
        self.query_number(Command::GetVoltage).await
    }

    pub async fn set_voltage(&mut self, millivolts: u32) -> Result<()> {
        let domain = self.profile.voltage;
        if !domain.contains(millivolts) {
            return Err(ProtoError::invalid(
                "voltage [mV]",
                millivolts,
                domain,
            ));
        }
        self.connection.write(Command::SetVoltage(millivolts)).await
    }

    /// DC bias in mV.
    pub async fn bias(&mut self) -> Result<f64> {
        self.query_number(Command::GetBias).await
    }

    pub async fn set_bias(&mut self, millivolts: u32) -> Result<()> {
        if !(BIAS_MIN..=BIAS_MAX).contains(&millivolts) {
            return Err(ProtoError::invalid(
                "bias [mV]",
                millivolts,
                format!("[{}, {}]", BIAS_MIN, BIAS_MAX),
            ));
        }
        self.connection.write(Command::SetBias(millivolts)).await
    }

    /// Measurement frequency in Hz.
    pub async fn frequency(&mut self) -> Result<f64> {
        self.query_number(Command::GetFrequency).await
    }

    pub async fn set_frequency(&mut self, hertz: u32) -> Result<()> {
        let domain = self.profile.frequency;
        if !domain.contains(hertz) {
            return Err(ProtoError::invalid("frequency [Hz]", hertz, domain));
        }
        self.connection.write(Command::SetFrequency(hertz)).await
    }

    // Relative mode, ranging, statistics, display

    pub async fn relative(&mut self) -> Result<bool> {
        self.query_switch(Command::GetRelative).await
    }

    pub async fn set_relative(&mut self, state: bool) -> Result<()> {
        self.connection.write(Command::SetRelative(state)).await
    }

    pub async fn auto_range(&mut self) -> Result<bool> {
        self.query_switch(Command::GetAutoRange).await
    }

    pub async fn set_auto_range(&mut self, state: bool) -> Result<()> {
        self.connection.write(Command::SetAutoRange(state)).await
    }

    pub async fn averaging(&mut self) -> Result<Averaging> {
        self.query_setting(Command::GetAveraging).await
    }

    pub async fn set_averaging(&mut self, mode: Averaging) -> Result<()> {
        self.connection.write(Command::SetAveraging(mode)).await
    }

    /// Min/max/average result as reported, `None` while averaging is off.
    pub async fn averaged_value(&mut self) -> Result<Option<String>> {
        let response = self.connection.query(Command::GetAveragedValue).await?;
        if response.eq_ignore_ascii_case("OFF") {
            Ok(None)
        } else {
            Ok(Some(response))
        }
    }

    pub async fn display_page(&mut self) -> Result<DisplayPage> {
        self.query_setting(Command::GetDisplay).await
    }

    pub async fn set_display_page(&mut self, page: DisplayPage) -> Result<()> {
        self.connection.write(Command::SetDisplay(page)).await
    }

    // Measurements

    /// Fetch the current primary and secondary values.
    pub async fn read(&mut self) -> Result<Reading> {
        let response = self.connection.query(Command::Fetch).await?;
        Reading::try_from(response.as_str())
    }

    /// Apply every setting present in `settings`, leaving the others as they
    /// are. Numeric values are checked against the capability profile before
    /// anything is sent.
    pub async fn apply(&mut self, settings: &Settings) -> Result<()> {
        if let Some(mv) = settings.voltage {
            if !self.profile.voltage.contains(mv) {
                return Err(ProtoError::invalid("voltage [mV]", mv, self.profile.voltage));
            }
        }
        if let Some(mv) = settings.bias {
            if !(BIAS_MIN..=BIAS_MAX).contains(&mv) {
                return Err(ProtoError::invalid(
                    "bias [mV]",
                    mv,
                    format!("[{}, {}]", BIAS_MIN, BIAS_MAX),
                ));
            }
        }
        if let Some(hz) = settings.frequency {
            if !self.profile.frequency.contains(hz) {
                return Err(ProtoError::invalid(
                    "frequency [Hz]",
                    hz,
                    self.profile.frequency,
                ));
            }
        }

        if let Some(mode) = settings.primary {
            self.set_primary_mode(mode).await?;
        }
        if let Some(mode) = settings.secondary {
            self.set_secondary_mode(mode).await?;
        }
        if let Some(circuit) = settings.circuit {
            self.set_circuit(circuit).await?;
        }
        if let Some(speed) = settings.speed {
            self.set_speed(speed).await?;
        }
        if let Some(source) = settings.trigger_source {
            self.set_trigger_source(source).await?;
        }
        if let Some(impedance) = settings.output_impedance {
            self.set_output_impedance(impedance).await?;
        }
        if let Some(hz) = settings.frequency {
            self.set_frequency(hz).await?;
        }
        if let Some(mv) = settings.voltage {
            self.set_voltage(mv).await?;
        }
        if let Some(mv) = settings.bias {
            self.set_bias(mv).await?;
        }
        if let Some(state) = settings.relative {
            self.set_relative(state).await?;
        }
        if let Some(state) = settings.auto_range {
            self.set_auto_range(state).await?;
        }
        if let Some(mode) = settings.averaging {
            self.set_averaging(mode).await?;
        }
        if let Some(page) = settings.display {
            self.set_display_page(page).await?;
        }
        Ok(())
    }

    /// Query the main settings.
    pub async fn snapshot(&mut self) -> Result<Snapshot> {
        Ok(Snapshot {
            ident: self.ident.clone(),
            profile: self.profile,
            primary: self.primary_mode().await?,
            secondary: self.secondary_mode().await?,
            circuit: self.circuit().await?,
            speed: self.speed().await?,
            frequency: self.frequency().await?,
            voltage: self.voltage().await?,
            bias: self.bias().await?,
        })
    }
}
