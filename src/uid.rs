use std::fmt;

pub const UID_LEN: usize = 8;

/// ISO15693 unique identifier, most significant byte first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Uid([u8; UID_LEN]);

impl Uid {
    pub const fn new(bytes: [u8; UID_LEN]) -> Uid {
        Uid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; UID_LEN] {
        &self.0
    }
}

/// Uppercase hex, two digits per byte, no separator (the uid log format)
impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{:02X}", byte)?;
        }

        Ok(())
    }
}
