//! Delay reply sent back for every report.

use std::time::Duration;

use crate::errors::{ProtocolError, Result};

/// One `i32`: microseconds the reporter should sleep, or 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reply {
    delay_micros: i32,
}

impl Reply {
    /// Size of a serialized reply.
    pub const SIZE: usize = 4;

    /// Reply for END events and for every rejected report.
    pub const ZERO: Self = Self { delay_micros: 0 };

    /// Reply carrying `delay`, saturating at `i32::MAX` microseconds.
    #[must_use]
    pub fn from_delay(delay: Duration) -> Self {
        let micros = i32::try_from(delay.as_micros()).unwrap_or(i32::MAX);
        Self { delay_micros: micros }
    }

    /// Raw microsecond value.
    #[must_use]
    pub fn delay_micros(&self) -> i32 {
        self.delay_micros
    }

    /// Delay as a duration. Negative wire values read as zero.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_micros(u64::try_from(self.delay_micros).unwrap_or(0))
    }

    /// Parse a reply from the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; Self::SIZE] = bytes
            .get(..Self::SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(ProtocolError::ReplyTooShort { expected: Self::SIZE, actual: bytes.len() })?;

        Ok(Self { delay_micros: i32::from_ne_bytes(raw) })
    }

    /// Serialize to wire bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        self.delay_micros.to_ne_bytes()
    }
}
