use crate::config::BusConfig;
use rppal::spi::{BitOrder, Bus, Mode, Polarity, Segment, SlaveSelect, Spi};
use std::error::Error;

type Result<T> = std::result::Result<T, Box<dyn Error>>;

/// A configured synchronous serial link to the reader chip
pub trait BusSession {
    /// Full duplex exchange of `tx.len()` bytes. Returns the number of bytes
    /// actually transferred.
    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<usize>;
}

/// spidev session through rppal
pub struct RppalBus {
    spi: Spi,
    config: BusConfig,
}

impl RppalBus {
    pub fn open(config: &BusConfig) -> Result<RppalBus> {
        let (bus, chip_select) = config.spidev_address()?;
        let bus = match bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            3 => Bus::Spi3,
            4 => Bus::Spi4,
            5 => Bus::Spi5,
            6 => Bus::Spi6,
            _ => return Err(format!("SPI bus {} is not supported", bus).into()),
        };
        let slave_select = match chip_select {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            _ => return Err(format!("chip select {} is not supported", chip_select).into()),
        };
        let mode = match (config.mode.clock_polarity, config.mode.clock_phase) {
            (false, false) => Mode::Mode0,
            (false, true) => Mode::Mode1,
            (true, false) => Mode::Mode2,
            (true, true) => Mode::Mode3,
        };

        let spi = Spi::new(bus, slave_select, config.clock_hz, mode)?;

        spi.set_bits_per_word(config.bits_per_word)?;
        spi.set_bit_order(if config.mode.lsb_first {
            BitOrder::LsbFirst
        } else {
            BitOrder::MsbFirst
        })?;
        spi.set_ss_polarity(if config.mode.cs_high {
            Polarity::ActiveHigh
        } else {
            Polarity::ActiveLow
        })?;

        Ok(RppalBus {
            spi,
            config: config.clone(),
        })
    }

    /// spidev mode flags that rppal has no setter for
    pub fn unsupported_flags(config: &BusConfig) -> Vec<&'static str> {
        let mode = &config.mode;

        [
            (mode.loopback, "loop"),
            (mode.three_wire, "3wire"),
            (mode.no_cs, "no-cs"),
            (mode.ready, "ready"),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| name)
        .collect()
    }
}

impl BusSession for RppalBus {
    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<usize> {
        if self.config.delay_us == 0 {
            // Transfer will only receive as much as was sent
            return Ok(self.spi.transfer(rx, tx)?);
        }

        // A post transfer delay needs a segment; the ioctl transfers it whole or fails
        let len = tx.len();
        let mut segment = Segment::new(rx, tx);

        segment.set_delay(self.config.delay_us);
        segment.set_clock_speed(self.config.clock_hz);
        segment.set_bits_per_word(self.config.bits_per_word);
        self.spi.transfer_segments(&[segment])?;

        Ok(len)
    }
}
