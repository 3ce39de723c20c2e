//! Fixed-width 20-byte contract/account identifier.

use core::fmt;

/// A fixed-width 20-byte identifier for a contract or externally-owned
/// account.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const LEN: usize = 20;

    pub const fn zero() -> Self {
        Address([0u8; 20])
    }

    pub fn from_slice(data: &[u8]) -> Self {
        let mut inner = [0u8; 20];
        let len = data.len().min(20);
        inner[20 - len..].copy_from_slice(&data[data.len() - len..]);
        Address(inner)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex_encode(&self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}
