//!
//! This library provides communication with ET44/ET45 series LCR meters
//! and their RuoShui 4090/4091 rebrands.
//!
//! <br>
//!
//! # Details
//!
//! - The instrument is connected by its USB CDC serial port and speaks a
//!   line based SCPI dialect (`\r\n` terminated in both directions).
//!
//! - Basic setup and connection
//!
//!   ```no_run
//!   use et44ctrl::{device::Options, settings::SecondaryMode, Device};
//!   #[tokio::main]
//!   async fn main() -> et44ctrl::Result<()> {
//!       let mut device = Device::new("/dev/ttyACM0", Options::default()).await?;
//!       eprintln!("Connected to: {}\n", device.ident().model);
//!       device.set_secondary_mode("theta".parse()?).await?;
//!       assert_eq!(device.secondary_mode().await?, SecondaryMode::Theta);
//!       let reading = device.read().await?;
//!       println!("{} / {}", reading.primary, reading.secondary);
//!       Ok(())
//!   }
//!   ```
//!
//! # Supported devices
//!
//!  * ET4401, ET4402, ET4410 (stepped frequencies)
//!  * ET4501, ET4502, ET4510 (continuous frequencies)
//!  * RuoShui 4090A/B/C, 4091A/B/C
//!

use std::time::Duration;

pub mod device;
pub mod eng;
pub mod logging;
pub mod profile;
pub mod proto;
pub mod settings;
pub mod sweep;

pub use device::Device;
pub use proto::Result;

#[cfg(unix)]
pub const DEFAULT_TTY: &str = "/dev/ttyACM0";
#[cfg(windows)]
pub const DEFAULT_TTY: &str = "COM1";

/// Factory default baudrate of the ET44/ET45 series.
pub const DEFAULT_BAUDRATE: u32 = 9600;

/// Read timeout for one response line.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);
