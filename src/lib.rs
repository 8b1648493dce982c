mod bus;
mod classifier;
mod codec;
mod config;
mod inventory;
mod log_macros;
#[cfg(test)]
mod mock;
mod register;
mod signal;
mod trf7960;
mod uid;

pub use crate::bus::{BusSession, RppalBus};
pub use crate::classifier::{
    Dispatcher, KnownTagTable, Launcher, ProcessLauncher, TagAction, KNOWN_TAGS,
};
pub use crate::codec::{CommandFrame, FifoStatus};
pub use crate::config::{BusConfig, ConfigError, ModeFlags, ReaderConfig};
pub use crate::inventory::{InventoryRound, InventoryStateMachine, RoundOutcome, RoundState};
pub use crate::signal::{IrqPin, SignalSource, StatusIndicator, StatusLed};
pub use crate::trf7960::{Trf7960, Trf7960Error};
pub use crate::uid::Uid;

use clap::{Parser, ValueEnum};
use config::parse_irq_status;
use core::fmt::Arguments;
use rppal::gpio::Gpio;
use std::error::Error;
use std::ffi::OsString;
use std::path::PathBuf;
use std::{thread, time};

const DEFAULT_STREAM_PROGRAM: &str = "/home/root/BBB_SPI/boneCV-master/streamVideoRTP";

pub trait Trf7960Log {
    fn output(self: &Self, args: Arguments);
    fn warning(self: &Self, args: Arguments);
    fn error(self: &Self, args: Arguments);
    fn debug(self: &Self, args: Arguments);
    fn use_color(self: &Self, _enabled: bool) {}
}

/// Drops protocol diagnostics unless running verbose
struct VerbosityFilter<'a> {
    log: &'a dyn Trf7960Log,
    verbose: bool,
}

impl Trf7960Log for VerbosityFilter<'_> {
    fn output(self: &Self, args: Arguments) {
        self.log.output(args);
    }
    fn warning(self: &Self, args: Arguments) {
        self.log.warning(args);
    }
    fn error(self: &Self, args: Arguments) {
        self.log.error(args);
    }
    fn debug(self: &Self, args: Arguments) {
        if self.verbose {
            self.log.debug(args);
        }
    }
}

pub struct Trf7960Tool<'a> {
    log: &'a dyn Trf7960Log,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[repr(u8)]
enum BcmPin {
    Pin1 = 1,
    Pin2,
    Pin3,
    Pin4,
    Pin5,
    Pin6,
    Pin7,
    Pin8,
    Pin9,
    Pin10,
    Pin11,
    Pin12,
    Pin13,
    Pin14,
    Pin15,
    Pin16,
    Pin17,
    Pin18,
    Pin19,
    Pin20,
    Pin21,
    Pin22,
    Pin23,
    Pin24,
    Pin25,
    Pin26,
    Pin27,
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// Disable colors in output
    #[arg(long = "no-color", short = 'n', env = "NO_CLI_COLOR")]
    no_color: bool,
    /// Print protocol diagnostics (IRQ status, FIFO counts, RSSI)
    #[arg(long = "verbose", short = 'v')]
    verbose: bool,
    /// spidev device to use
    #[arg(long = "device", short = 'D', default_value = "/dev/spidev1.0")]
    device: String,
    /// Max speed (Hz)
    #[arg(long = "speed", short = 's', default_value_t = 3_000_000)]
    speed: u32,
    /// Delay after each transfer (usec)
    #[arg(long = "delay", short = 'd', default_value_t = 0)]
    delay: u16,
    /// Bits per word
    #[arg(long = "bpw", short = 'b', default_value_t = 8)]
    bits_per_word: u8,
    /// Loopback
    #[arg(long = "loop", short = 'l')]
    loopback: bool,
    /// Clock phase (always on for the TRF7960)
    #[arg(long = "cpha", short = 'H')]
    cpha: bool,
    /// Clock polarity
    #[arg(long = "cpol", short = 'O')]
    cpol: bool,
    /// Least significant bit first
    #[arg(long = "lsb", short = 'L')]
    lsb: bool,
    /// Chip select active high
    #[arg(long = "cs-high", short = 'C')]
    cs_high: bool,
    /// SI/SO signals shared
    #[arg(long = "3wire", short = '3')]
    three_wire: bool,
    /// No chip select
    #[arg(long = "no-cs", short = 'N')]
    no_cs: bool,
    /// Slave pulls low to pause
    #[arg(long = "ready", short = 'R')]
    ready: bool,
    /// Reader enable pin, driven high
    #[arg(long = "enable", short = 'e')]
    enable_pin: BcmPin,
    /// Reader IRQ pin
    #[arg(long = "irq", short = 'i')]
    irq_pin: BcmPin,
    /// Status LED pin, lit while waiting for a tag
    #[arg(long = "led")]
    led_pin: Option<BcmPin>,
    #[arg(long = "high", short = '1')]
    high_pins: Vec<BcmPin>,
    #[arg(long = "low", short = '0')]
    low_pins: Vec<BcmPin>,
    /// Program started when the stream tag is seen
    #[arg(long = "stream-program", default_value = DEFAULT_STREAM_PROGRAM)]
    stream_program: PathBuf,
    /// Script that loads the SPI device tree overlay, run before opening the device
    #[arg(long = "overlay-script")]
    overlay_script: Option<PathBuf>,
    /// File holding the last UID read
    #[arg(long = "uid-log", default_value = "uid.txt")]
    uid_log: PathBuf,
    /// IRQ status expected after the tag response
    #[arg(long = "rx-irq-status", default_value = "0x40", value_parser = parse_irq_status)]
    rx_irq_status: u8,
}

impl<'a> Trf7960Tool<'a> {
    pub fn new(log: &'a dyn Trf7960Log) -> Trf7960Tool<'a> {
        Trf7960Tool { log }
    }

    pub fn run(
        self: &mut Self,
        args: impl IntoIterator<Item = OsString>,
    ) -> Result<(), Box<dyn Error>> {
        // Kept whole; the stream program gets the same argument vector
        let args: Vec<OsString> = args.into_iter().collect();
        let cli = match Cli::try_parse_from(args.clone()) {
            Ok(m) => m,
            Err(err) => {
                output!(self.log, "{}", err.to_string());
                return Ok(());
            }
        };

        self.log.use_color(!cli.no_color);

        let log = VerbosityFilter {
            log: self.log,
            verbose: cli.verbose,
        };
        let gpio = Gpio::new()?;
        let mut enable_pin = gpio.get(cli.enable_pin as u8)?.into_output();

        enable_pin.set_reset_on_drop(false);
        enable_pin.set_low();
        thread::sleep(time::Duration::from_millis(100));

        for bcm_pin in cli.low_pins {
            let mut pin = gpio.get(bcm_pin as u8)?.into_output();

            pin.set_reset_on_drop(false);
            pin.set_low();
        }

        for bcm_pin in cli.high_pins {
            let mut pin = gpio.get(bcm_pin as u8)?.into_output();

            pin.set_reset_on_drop(false);
            pin.set_high();
        }

        enable_pin.set_high();
        thread::sleep(time::Duration::from_millis(50));

        let mut launcher = ProcessLauncher;

        if let Some(script) = &cli.overlay_script {
            if let Err(err) = launcher.launch(script, &args) {
                warning!(log, "unable to run {}: {}", script.display(), err);
            }

            // Give the overlay time to create the spidev node
            thread::sleep(time::Duration::from_millis(250));
        }

        let bus_config = BusConfig::new(
            cli.device,
            cli.speed,
            cli.bits_per_word,
            cli.delay,
            ModeFlags {
                clock_phase: cli.cpha,
                clock_polarity: cli.cpol,
                lsb_first: cli.lsb,
                cs_high: cli.cs_high,
                loopback: cli.loopback,
                three_wire: cli.three_wire,
                no_cs: cli.no_cs,
                ready: cli.ready,
            },
        );

        for flag in RppalBus::unsupported_flags(&bus_config) {
            warning!(log, "--{} is not supported by this SPI backend, ignoring", flag);
        }

        let bus = RppalBus::open(&bus_config)?;
        let irq = IrqPin::new(&gpio, cli.irq_pin as u8)?;
        let led = StatusLed::new(&gpio, cli.led_pin.map(|pin| pin as u8))?;
        let dispatcher = Dispatcher::new(
            &log,
            KNOWN_TAGS,
            launcher,
            cli.stream_program,
            args,
            cli.uid_log,
        );
        let config = ReaderConfig {
            expected_rx_irq_status: cli.rx_irq_status,
            ..ReaderConfig::default()
        };

        output!(
            log,
            "Reading ISO15693 tags on {} at {} Hz",
            bus_config.device,
            bus_config.clock_hz
        );

        InventoryStateMachine::new(&log, config, Trf7960::new(bus), irq, led, dispatcher).run()
    }
}
