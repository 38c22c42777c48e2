//! Simulated instrument for tests.
//!
//! Written lines are interpreted like the real firmware would, including its
//! abbreviated answers, and the response is queued for reading. The state is
//! shared through [`FakeHandle`] so tests can inspect received commands or
//! script canned answers.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

pub(crate) struct FakeState {
    pub idn: String,
    pub mode_a: String,
    pub mode_b: String,
    pub equ: String,
    pub speed: String,
    pub source: String,
    pub out_res: String,
    pub volt: u32,
    pub bias: u32,
    pub freq: u32,
    pub rel: String,
    pub autorange: String,
    pub avg: String,
    pub page: String,
    /// Every line received, in order.
    pub received: Vec<String>,
    /// Canned answers consumed before the simulation is consulted.
    pub scripted: VecDeque<Vec<String>>,
    /// `FETCH?` requests answered so far.
    pub fetches: usize,
    /// Answer this `FETCH?` (1-based) with three fields instead of two.
    pub malformed_fetch: Option<usize>,
}

impl FakeState {
    fn new(idn: &str) -> Self {
        Self {
            idn: idn.to_string(),
            mode_a: "C".into(),
            mode_b: "D".into(),
            equ: "SERIAL".into(),
            speed: "MEDIUM".into(),
            source: "INT".into(),
            out_res: "0".into(),
            volt: 1000,
            bias: 0,
            freq: 1000,
            rel: "OFF".into(),
            autorange: "ON".into(),
            avg: "OFF".into(),
            page: "MEASUREMENT".into(),
            received: Vec::new(),
            scripted: VecDeque::new(),
            fetches: 0,
            malformed_fetch: None,
        }
    }

    /// Primary value depends on the frequency, secondary on the secondary
    /// mode, so tests can tell which state a reading was taken in.
    fn fetch(&mut self) -> String {
        self.fetches += 1;
        if self.malformed_fetch == Some(self.fetches) {
            return "1.0,2.0,3.0".into();
        }
        let secondary = match self.mode_b.as_str() {
            "X" => 1.0,
            "D" => 2.0,
            "Q" => 3.0,
            "THR" => 4.0,
            "ESR" => 5.0,
            _ => 0.0,
        };
        format!("{:e},{:e}", self.freq as f64 * 1e-9, secondary)
    }

    fn execute(&mut self, line: &str) -> Vec<String> {
        const OK: &str = "exec success";
        const ERR: &str = "execu err";

        fn pick(value: &str, legal: &[&str], target: &mut String) -> &'static str {
            if legal.contains(&value) {
                *target = value.to_string();
                OK
            } else {
                ERR
            }
        }

        let (cmd, arg) = match line.split_once(' ') {
            Some((cmd, arg)) => (cmd, Some(arg.trim())),
            None => (line, None),
        };

        let answer: String = match (cmd, arg) {
            ("*IDN?", None) => self.idn.clone(),
            ("SYST:BEEP" | "*TRG" | "SYST:REMote" | "SYST:LOCAL", None) => OK.into(),
            ("CORR:EXEC", None) => return Vec::new(),
            ("FETCH?", None) => self.fetch(),
            ("FUNC:IMP:A?", None) => self.mode_a.clone(),
            ("FUNC:IMP:A", Some(v)) => {
                pick(v, &["AUTO", "R", "C", "L", "Z", "DCR", "ECAP"], &mut self.mode_a).into()
            }
            ("FUNC:IMP:B?", None) => self.mode_b.clone(),
            ("FUNC:IMP:B", Some(v)) => pick(v, &["X", "D", "Q", "THR", "ESR"], &mut self.mode_b).into(),
            ("FUNC:IMP:EQU?", None) => self.equ.clone(),
            ("FUNC:IMP:EQU", Some("SER")) => {
                self.equ = "SERIAL".into();
                OK.into()
            }
            ("FUNC:IMP:EQU", Some("PAL")) => {
                self.equ = "PALLEL".into();
                OK.into()
            }
            ("APERture?", None) => self.speed.to_lowercase(),
            ("APERture", Some(v)) => pick(v, &["FAST", "MEDIUM", "SLOW"], &mut self.speed).into(),
            ("SYSTEM:SOURCE?", None) => self.source.clone(),
            ("SYSTEM:SOURCE", Some(v)) => pick(v, &["INT", "MAN", "EXT"], &mut self.source).into(),
            ("OUT:RES?", None) => self.out_res.clone(),
            ("OUT:RES", Some(v)) => pick(v, &["0", "1"], &mut self.out_res).into(),
            ("VOLT?", None) => format!("{}.000", self.volt),
            ("VOLT", Some(v)) => match v.parse() {
                Ok(v) => {
                    self.volt = v;
                    OK.into()
                }
                Err(_) => ERR.into(),
            },
            ("BIAS:VOLT?", None) => format!("{}", self.bias),
            ("BIAS:VOLT", Some(v)) => match v.parse() {
                Ok(v) => {
                    self.bias = v;
                    OK.into()
                }
                Err(_) => ERR.into(),
            },
            ("FREQ?", None) => format!("{:e}", self.freq as f64),
            ("FREQ", Some(v)) => match v.parse() {
                Ok(v) => {
                    self.freq = v;
                    OK.into()
                }
                Err(_) => ERR.into(),
            },
            ("FUNC:DEV:MODE?", None) => self.rel.clone(),
            ("FUNC:DEV:MODE", Some(v)) => pick(v, &["ON", "OFF"], &mut self.rel).into(),
            ("FUNC:IMP:RANGE:AUTO?", None) => self.autorange.clone(),
            ("FUNC:IMP:RANGE:AUTO", Some(v)) => pick(v, &["ON", "OFF"], &mut self.autorange).into(),
            ("FUNC:COM?", None) => self.avg.clone(),
            ("FUNC:COM", Some(v)) => pick(v, &["MIN", "MAX", "AVG", "OFF"], &mut self.avg).into(),
            ("FUNC:COMV?", None) if self.avg == "OFF" => "OFF".into(),
            ("FUNC:COMV?", None) => self.fetch(),
            ("DISP:PAGE?", None) => self.page.clone(),
            ("DISP:PAGE", Some(v)) => {
                let page = match v {
                    "MEAS" => "MEASUREMENT",
                    "COMP" => "COMPSET",
                    "SYST" => "SYSTEM",
                    _ => return vec![ERR.into()],
                };
                self.page = page.into();
                OK.into()
            }
            _ => "cmd err".into(),
        };
        vec![answer]
    }
}

/// Test side view of a [`FakeInstrument`].
#[derive(Clone)]
pub(crate) struct FakeHandle(Arc<Mutex<FakeState>>);

impl FakeHandle {
    pub(crate) fn state(&self) -> MutexGuard<'_, FakeState> {
        self.0.lock().expect("fake state poisoned")
    }

    pub(crate) fn received(&self) -> Vec<String> {
        self.state().received.clone()
    }

    /// Queue canned response lines for the next received command.
    pub(crate) fn script(&self, lines: &[&str]) {
        self.state()
            .scripted
            .push_back(lines.iter().map(|s| s.to_string()).collect());
    }

    /// Number of received commands starting with `prefix`.
    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.state()
            .received
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

pub(crate) struct FakeInstrument {
    state: Arc<Mutex<FakeState>>,
    input: Vec<u8>,
    output: VecDeque<u8>,
    waker: Option<Waker>,
}

impl FakeInstrument {
    pub(crate) fn new(idn: &str) -> (Self, FakeHandle) {
        let state = Arc::new(Mutex::new(FakeState::new(idn)));
        let fake = Self {
            state: state.clone(),
            input: Vec::new(),
            output: VecDeque::new(),
            waker: None,
        };
        (fake, FakeHandle(state))
    }

    fn process_lines(&mut self) {
        while let Some(n) = self.input.windows(2).position(|w| w == b"\r\n") {
            let line: Vec<u8> = self.input.drain(..n + 2).take(n).collect();
            let line = String::from_utf8_lossy(&line).to_string();
            let mut state = self.state.lock().expect("fake state poisoned");
            state.received.push(line.clone());
            let answer = match state.scripted.pop_front() {
                Some(lines) => lines,
                None => state.execute(&line),
            };
            for l in answer {
                self.output.extend(l.as_bytes());
                self.output.extend(b"\r\n");
            }
        }
        if !self.output.is_empty() {
            if let Some(waker) = self.waker.take() {
                waker.wake();
            }
        }
    }
}

impl tokio::io::AsyncRead for FakeInstrument {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.output.is_empty() {
            // Silent instrument: the reader runs into its timeout.
            self.waker = Some(cx.waker().clone());
            return Poll::Pending;
        }
        let n = buf.remaining().min(self.output.len());
        let chunk: Vec<u8> = self.output.drain(..n).collect();
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

impl tokio::io::AsyncWrite for FakeInstrument {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::result::Result<usize, std::io::Error>> {
        self.input.extend_from_slice(buf);
        self.process_lines();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<std::result::Result<(), std::io::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<std::result::Result<(), std::io::Error>> {
        Poll::Ready(Ok(()))
    }
}
