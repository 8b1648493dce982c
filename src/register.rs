// TRF7960 address/command byte layout (datasheet section 6.13, "Address/Command Word"):
//   B7   - 0 = register address, 1 = direct command
//   B6   - 0 = write, 1 = read
//   B5   - 0 = single access, 1 = continuous (auto-increment) access
//   B4-0 - register address or command code
const COMMAND_BIT: u8 = 0x80;
const READ_BIT: u8 = 0x40;
const CONTINUOUS_BIT: u8 = 0x20;
const ADDRESS_MASK: u8 = 0x1f;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    ChipStatusControl = 0x00,
    RxNoResponseWaitTime = 0x07,
    ModulatorSysClkControl = 0x09,
    IrqStatus = 0x0c,
    RssiLevels = 0x0f,
    FifoStatus = 0x1c,
    TxLengthByte1 = 0x1d,
    Fifo = 0x1f,
}

impl Register {
    pub fn write_address(self) -> u8 {
        self as u8 & ADDRESS_MASK
    }

    pub fn continuous_write_address(self) -> u8 {
        self.write_address() | CONTINUOUS_BIT
    }

    pub fn read_address(self) -> u8 {
        self.write_address() | READ_BIT
    }

    pub fn continuous_read_address(self) -> u8 {
        self.read_address() | CONTINUOUS_BIT
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DirectCommand {
    Idle = 0x00,
    SoftwareInit = 0x03,
    ResetFifo = 0x0f,
    TransmitWithCrc = 0x11,
    BlockReceiver = 0x16,
}

impl From<DirectCommand> for u8 {
    fn from(command: DirectCommand) -> u8 {
        COMMAND_BIT | (command as u8 & ADDRESS_MASK)
    }
}

// ISO15693 request flags (ISO/IEC 15693-3, table 3 and 5)
pub const ISO15693_FLAG_HIGH_DATA_RATE: u8 = 0x02;
pub const ISO15693_FLAG_INVENTORY: u8 = 0x04;
pub const ISO15693_FLAG_ONE_SLOT: u8 = 0x20;
pub const ISO15693_INVENTORY: u8 = 0x01;

// IRQ status register bits (datasheet table 6-24)
pub const IRQ_END_OF_TX: u8 = 0x80;
pub const IRQ_END_OF_RX: u8 = 0x40;
