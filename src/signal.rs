use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use std::error::Error;
use std::thread;
use std::time::Duration;

type Result<T> = std::result::Result<T, Box<dyn Error>>;

// How long one blocking edge wait lasts before the line level is checked again
const EDGE_WAIT_SLICE: Duration = Duration::from_millis(100);

/// Level of the reader's interrupt request line
pub trait SignalSource {
    fn is_asserted(&mut self) -> Result<bool>;

    /// Blocks until the line is asserted, with no upper bound
    fn wait_asserted(&mut self) -> Result<()> {
        while !self.is_asserted()? {
            thread::yield_now();
        }

        Ok(())
    }

    /// One bounded poll: whether the line is asserted now or within `slice`
    fn poll_asserted(&mut self, slice: Duration) -> Result<bool> {
        if self.is_asserted()? {
            return Ok(true);
        }

        thread::sleep(slice);
        self.is_asserted()
    }
}

/// The TRF7960 IRQ output on a GPIO input, sensitive to the rising edge
pub struct IrqPin {
    pin: InputPin,
}

impl IrqPin {
    pub fn new(gpio: &Gpio, bcm_pin: u8) -> Result<IrqPin> {
        let mut pin = gpio.get(bcm_pin)?.into_input();

        pin.set_interrupt(Trigger::RisingEdge)?;

        Ok(IrqPin { pin })
    }
}

impl SignalSource for IrqPin {
    fn is_asserted(&mut self) -> Result<bool> {
        Ok(self.pin.is_high())
    }

    // The line stays high until IRQ status is read, so the level is the truth
    // and the edge only wakes us up. A stale edge just costs one more level check.
    fn wait_asserted(&mut self) -> Result<()> {
        while !self.pin.is_high() {
            self.pin.poll_interrupt(false, Some(EDGE_WAIT_SLICE))?;
        }

        Ok(())
    }

    // A register read takes well under a microsecond, so each poll blocks on
    // the edge for up to `slice` to give the poll budget a time base
    fn poll_asserted(&mut self, slice: Duration) -> Result<bool> {
        if self.pin.is_high() {
            return Ok(true);
        }

        self.pin.poll_interrupt(false, Some(slice))?;

        Ok(self.pin.is_high())
    }
}

/// Round progress indicator
pub trait StatusIndicator {
    fn set(&mut self, on: bool);
}

/// Optional LED; without a pin this is a no-op
pub struct StatusLed {
    pin: Option<OutputPin>,
}

impl StatusLed {
    pub fn new(gpio: &Gpio, bcm_pin: Option<u8>) -> Result<StatusLed> {
        let pin = match bcm_pin {
            Some(bcm_pin) => {
                let mut pin = gpio.get(bcm_pin)?.into_output();

                pin.set_reset_on_drop(false);
                pin.set_low();
                Some(pin)
            }
            None => None,
        };

        Ok(StatusLed { pin })
    }
}

impl StatusIndicator for StatusLed {
    fn set(&mut self, on: bool) {
        if let Some(pin) = self.pin.as_mut() {
            if on {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
    }
}

impl StatusIndicator for () {
    fn set(&mut self, _on: bool) {}
}
