use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{0}' is not a spidev device path of the form /dev/spidevB.C")]
    BadDevicePath(String),
    #[error("bad IRQ status value '{0}'")]
    BadIrqStatus(String),
}

/// The spidev mode bits (linux/spi/spidev.h)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub clock_phase: bool,
    pub clock_polarity: bool,
    pub lsb_first: bool,
    pub cs_high: bool,
    pub loopback: bool,
    pub three_wire: bool,
    pub no_cs: bool,
    pub ready: bool,
}

/// Bus parameters, fixed for the life of the process
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    pub device: String,
    pub clock_hz: u32,
    pub bits_per_word: u8,
    pub delay_us: u16,
    pub mode: ModeFlags,
}

impl BusConfig {
    /// The TRF7960 samples on the falling clock edge, so clock phase is always
    /// set whatever was requested
    pub fn new(
        device: String,
        clock_hz: u32,
        bits_per_word: u8,
        delay_us: u16,
        mode: ModeFlags,
    ) -> BusConfig {
        BusConfig {
            device,
            clock_hz,
            bits_per_word,
            delay_us,
            mode: ModeFlags {
                clock_phase: true,
                ..mode
            },
        }
    }

    /// Bus and chip select numbers from a `/dev/spidevB.C` path
    pub fn spidev_address(&self) -> Result<(u8, u8), ConfigError> {
        let bad = || ConfigError::BadDevicePath(self.device.clone());
        let suffix = self
            .device
            .strip_prefix("/dev/spidev")
            .ok_or_else(bad)?;
        let (bus, chip_select) = suffix.split_once('.').ok_or_else(bad)?;

        Ok((
            bus.parse().map_err(|_| bad())?,
            chip_select.parse().map_err(|_| bad())?,
        ))
    }
}

/// Accepts `0x40`, `0X40` or `64`
pub fn parse_irq_status(s: &str) -> Result<u8, ConfigError> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };

    parsed.map_err(|_| ConfigError::BadIrqStatus(s.to_string()))
}

/// Protocol timing and the knobs of the inventory loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Number of IRQ line polls allowed while waiting for the tag response
    pub irq_poll_budget: u32,
    /// Length of one of those polls, so the budget spans a tag response
    pub irq_poll_slice: Duration,
    pub inter_round_delay: Duration,
    /// Extra pause after the stream trigger tag was seen
    pub trigger_cooldown: Duration,
    /// Settle time after switching the chip to ISO15693
    pub iso_settle_delay: Duration,
    /// IRQ status expected once the tag response has been received. The chip
    /// reports end of RX (0x40) here; an older build of this tool compared
    /// against end of TX (0x80). Only a diagnostic is emitted on mismatch.
    pub expected_rx_irq_status: u8,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            irq_poll_budget: 1000,
            irq_poll_slice: Duration::from_micros(50),
            inter_round_delay: Duration::from_millis(500),
            trigger_cooldown: Duration::from_secs(1),
            iso_settle_delay: Duration::from_millis(1),
            expected_rx_irq_status: crate::register::IRQ_END_OF_RX,
        }
    }
}
