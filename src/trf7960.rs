use crate::bus::BusSession;
use crate::codec::{self, CommandFrame, FifoStatus, INVENTORY_RESPONSE_LEN};
use crate::uid::Uid;
use thiserror::Error;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Trf7960Error {
    #[error("incomplete bus transfer: sent {expected} bytes, {actual} transferred")]
    ShortTransfer { expected: usize, actual: usize },
}

/// TRF7960 operations, one bus exchange each
pub struct Trf7960<B: BusSession> {
    bus: B,
}

impl<B: BusSession> Trf7960<B> {
    pub fn new(bus: B) -> Trf7960<B> {
        Trf7960 { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// A short transfer means the bus itself is unusable; there is no
    /// recovering from it at the protocol level
    fn execute(&mut self, mut frame: CommandFrame) -> Result<CommandFrame> {
        let expected = frame.len();
        let (tx, rx) = frame.buffers_mut();
        let actual = self.bus.exchange(tx, rx)?;

        if actual < expected {
            return Err(Box::new(Trf7960Error::ShortTransfer { expected, actual }));
        }

        Ok(frame)
    }

    pub fn soft_reset(&mut self) -> Result<()> {
        self.execute(codec::soft_reset())?;
        Ok(())
    }

    pub fn enter_idle(&mut self) -> Result<()> {
        self.execute(codec::enter_idle())?;
        Ok(())
    }

    pub fn configure_iso15693(&mut self) -> Result<()> {
        self.execute(codec::configure_iso15693())?;
        Ok(())
    }

    pub fn set_system_clock(&mut self) -> Result<()> {
        self.execute(codec::set_system_clock_default())?;
        Ok(())
    }

    pub fn set_no_response_wait_time(&mut self) -> Result<()> {
        self.execute(codec::set_no_response_wait_time_default())?;
        Ok(())
    }

    pub fn read_irq_status(&mut self) -> Result<u8> {
        let frame = self.execute(codec::read_irq_status())?;

        Ok(codec::decode_irq_status(&frame))
    }

    pub fn drain_irq_status(&mut self) -> Result<()> {
        self.execute(codec::drain_irq_status())?;
        Ok(())
    }

    pub fn start_inventory(&mut self) -> Result<()> {
        self.execute(codec::start_single_slot_inventory())?;
        Ok(())
    }

    pub fn reset_fifo(&mut self) -> Result<()> {
        self.execute(codec::reset_fifo())?;
        Ok(())
    }

    pub fn read_fifo_status(&mut self) -> Result<FifoStatus> {
        let frame = self.execute(codec::read_fifo_status())?;

        Ok(codec::decode_fifo_status(&frame))
    }

    pub fn read_inventory_uid(&mut self) -> Result<Uid> {
        let frame = self.execute(codec::read_fifo(INVENTORY_RESPONSE_LEN))?;

        Ok(codec::decode_inventory_uid(&frame))
    }

    pub fn read_rssi(&mut self) -> Result<u8> {
        let frame = self.execute(codec::read_rssi())?;

        Ok(codec::decode_rssi(&frame))
    }

    pub fn block_receiver(&mut self) -> Result<()> {
        self.execute(codec::block_receiver())?;
        Ok(())
    }

    pub fn turn_off_transmitter(&mut self) -> Result<()> {
        self.execute(codec::turn_off_transmitter())?;
        Ok(())
    }
}
