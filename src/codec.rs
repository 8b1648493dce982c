//! Byte frames for the small fixed vocabulary of TRF7960 operations used by an
//! ISO15693 single slot inventory. Nothing here does any I/O; frames are handed
//! to the [`Trf7960`](crate::Trf7960) driver which exchanges them over the bus.

use crate::register::*;
use crate::uid::{Uid, UID_LEN};

/// Number of FIFO bytes in a good single slot inventory response: flags,
/// DSFID and the 8 UID bytes
pub const INVENTORY_RESPONSE_LEN: usize = 2 + UID_LEN;

// Chip Status Control: RF output active, full output power, 3.3V supply
const CHIP_STATUS_RF_ON: u8 = 0x21;
// Chip Status Control: RF output off, 3.3V supply
const CHIP_STATUS_RF_OFF: u8 = 0x01;
// ISO Control: ISO15693 high bit rate, 26.48 kbps, one subcarrier, 1 out of 4
const ISO_CONTROL_15693_HIGH_RATE: u8 = 0x02;
// The continuous write from Chip Status Control runs on into the ISO14443 TX
// options, high bit rate options and TX timer registers
const ISO_CONTROL_TRAILER: [u8; 4] = [0x00, 0x00, 0xc1, 0xbb];
// Modulator and SYS_CLK Control: SYS_CLK 6.78MHz, OOK 100% modulation
const SYS_CLK_6_78_MHZ: u8 = 0x21;
// RX No Response Wait Time: 19 * 37.76us
const NO_RESPONSE_WAIT_TIME: u8 = 0x13;

/// One bus exchange: the bytes to send and an equal length receive buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandFrame {
    tx: Vec<u8>,
    rx: Vec<u8>,
}

impl CommandFrame {
    pub fn new(tx: Vec<u8>) -> CommandFrame {
        let rx = vec![0u8; tx.len()];

        CommandFrame { tx, rx }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn tx(&self) -> &[u8] {
        &self.tx
    }

    pub fn rx(&self) -> &[u8] {
        &self.rx
    }

    /// Split borrow for the bus session: (transmit, receive)
    pub fn buffers_mut(&mut self) -> (&[u8], &mut [u8]) {
        (&self.tx, &mut self.rx)
    }
}

fn direct(command: DirectCommand) -> CommandFrame {
    CommandFrame::new(vec![command.into()])
}

fn write_single(reg: Register, value: u8) -> CommandFrame {
    CommandFrame::new(vec![reg.write_address(), value])
}

fn read_single(reg: Register) -> CommandFrame {
    CommandFrame::new(vec![reg.read_address(), 0])
}

/// The register value of a single read sits in the second byte, after the address
fn single_reply(frame: &CommandFrame) -> u8 {
    assert_eq!(frame.rx().len(), 2, "single register read is 2 bytes");
    frame.rx()[1]
}

pub fn soft_reset() -> CommandFrame {
    direct(DirectCommand::SoftwareInit)
}

pub fn enter_idle() -> CommandFrame {
    direct(DirectCommand::Idle)
}

/// Continuous write of Chip Status Control and ISO Control (plus the registers
/// the write runs on into)
pub fn configure_chip_status_and_iso(chip_status: u8, iso_control: u8) -> CommandFrame {
    let mut tx = vec![
        Register::ChipStatusControl.continuous_write_address(),
        chip_status,
        iso_control,
    ];

    tx.extend_from_slice(&ISO_CONTROL_TRAILER);

    CommandFrame::new(tx)
}

/// Chip status and ISO control for RF on, ISO15693 high data rate
pub fn configure_iso15693() -> CommandFrame {
    configure_chip_status_and_iso(CHIP_STATUS_RF_ON, ISO_CONTROL_15693_HIGH_RATE)
}

pub fn set_system_clock(value: u8) -> CommandFrame {
    write_single(Register::ModulatorSysClkControl, value)
}

pub fn set_system_clock_default() -> CommandFrame {
    set_system_clock(SYS_CLK_6_78_MHZ)
}

pub fn set_no_response_wait_time(value: u8) -> CommandFrame {
    write_single(Register::RxNoResponseWaitTime, value)
}

pub fn set_no_response_wait_time_default() -> CommandFrame {
    set_no_response_wait_time(NO_RESPONSE_WAIT_TIME)
}

/// Continuous read of IRQ Status. Reading it also clears the IRQ line.
pub fn read_irq_status() -> CommandFrame {
    CommandFrame::new(vec![Register::IrqStatus.continuous_read_address(), 0, 0])
}

pub fn decode_irq_status(frame: &CommandFrame) -> u8 {
    assert_eq!(frame.rx().len(), 3, "IRQ status read is 3 bytes");
    frame.rx()[1]
}

/// Single register read of IRQ Status, used to drain the register at cleanup
pub fn drain_irq_status() -> CommandFrame {
    read_single(Register::IrqStatus)
}

/// Reset FIFO, then transmit `flags, command, payload` with CRC. The TX length
/// is 12 bits: bits 11-4 in TX Length Byte 1, bits 3-0 in the high nibble of
/// TX Length Byte 2.
pub fn start_inventory_transmit(flags: u8, command: u8, payload: &[u8]) -> CommandFrame {
    let tx_len = 2 + payload.len() as u16;

    assert!(tx_len <= 0x0fff, "TX length exceeds 12 bits");

    let mut tx = vec![
        DirectCommand::ResetFifo.into(),
        DirectCommand::TransmitWithCrc.into(),
        Register::TxLengthByte1.continuous_write_address(),
        (tx_len >> 4) as u8,
        ((tx_len & 0x0f) << 4) as u8,
        flags,
        command,
    ];

    tx.extend_from_slice(payload);

    CommandFrame::new(tx)
}

/// ISO15693 Inventory, one slot, high data rate, zero length mask
pub fn start_single_slot_inventory() -> CommandFrame {
    start_inventory_transmit(
        ISO15693_FLAG_ONE_SLOT | ISO15693_FLAG_INVENTORY | ISO15693_FLAG_HIGH_DATA_RATE,
        ISO15693_INVENTORY,
        &[0x00],
    )
}

pub fn read_fifo_status() -> CommandFrame {
    read_single(Register::FifoStatus)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FifoStatus {
    pub byte_count: u8,
    pub overflow: bool,
}

pub fn decode_fifo_status(frame: &CommandFrame) -> FifoStatus {
    let value = single_reply(frame);

    FifoStatus {
        byte_count: value & 0x7f,
        overflow: value & 0x80 != 0,
    }
}

/// Continuous FIFO read of `count` bytes, preceded by the address byte
pub fn read_fifo(count: usize) -> CommandFrame {
    let mut tx = vec![0u8; count + 1];

    tx[0] = Register::Fifo.continuous_read_address();

    CommandFrame::new(tx)
}

/// Pulls the UID out of an inventory response read with
/// `read_fifo(INVENTORY_RESPONSE_LEN)`. The tag sends the UID least significant
/// byte first, so it comes off the end of the reply in reverse.
pub fn decode_inventory_uid(frame: &CommandFrame) -> Uid {
    let reply = frame.rx();

    assert_eq!(reply.len(), INVENTORY_RESPONSE_LEN + 1, "inventory FIFO read is 11 bytes");

    let mut bytes = [0u8; UID_LEN];

    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = reply[INVENTORY_RESPONSE_LEN - i];
    }

    Uid::new(bytes)
}

pub fn read_rssi() -> CommandFrame {
    read_single(Register::RssiLevels)
}

pub fn decode_rssi(frame: &CommandFrame) -> u8 {
    single_reply(frame)
}

pub fn reset_fifo() -> CommandFrame {
    direct(DirectCommand::ResetFifo)
}

pub fn block_receiver() -> CommandFrame {
    direct(DirectCommand::BlockReceiver)
}

pub fn turn_off_transmitter() -> CommandFrame {
    write_single(Register::ChipStatusControl, CHIP_STATUS_RF_OFF)
}
