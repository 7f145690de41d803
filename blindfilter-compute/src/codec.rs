//! Wire encoding of backend results.
//!
//! Match result: 4-byte big-endian score followed by one bool byte.
//! Decryption result: a single bool byte. Bool bytes must be 0 or 1.

use crate::error::{ComputeError, ComputeResult};
use std::fmt;

/// Size of an encoded [`MatchOutcome`].
pub const MATCH_RESULT_LEN: usize = 5;

/// Size of an encoded [`Decision`].
pub const DECISION_RESULT_LEN: usize = 1;

/// Minimum score for a block rule to count as a match, on a 0-100 scale.
pub const MIN_MATCH_SCORE: u32 = 80;

/// What the backend computed for a match request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub match_score: u32,
    pub should_block: bool,
}

impl MatchOutcome {
    /// Encodes the outcome as raw result bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MATCH_RESULT_LEN);
        out.extend_from_slice(&self.match_score.to_be_bytes());
        out.push(u8::from(self.should_block));
        out
    }

    /// Decodes raw result bytes.
    pub fn decode(raw: &[u8]) -> ComputeResult<Self> {
        let raw: &[u8; MATCH_RESULT_LEN] = raw.try_into().map_err(|_| {
            ComputeError::Codec(format!(
                "match result must be {MATCH_RESULT_LEN} bytes, got {}",
                raw.len()
            ))
        })?;
        let [a, b, c, d, flag] = *raw;
        Ok(Self {
            match_score: u32::from_be_bytes([a, b, c, d]),
            should_block: decode_bool(flag)?,
        })
    }
}

/// The revealed block/allow decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Block,
    Allow,
}

impl Decision {
    /// True for [`Decision::Block`].
    pub fn should_block(&self) -> bool {
        matches!(self, Self::Block)
    }

    /// Encodes the decision as raw result bytes.
    pub fn encode(&self) -> Vec<u8> {
        vec![u8::from(self.should_block())]
    }

    /// Decodes raw result bytes.
    pub fn decode(raw: &[u8]) -> ComputeResult<Self> {
        match raw {
            [flag] => Ok(Self::from(decode_bool(*flag)?)),
            _ => Err(ComputeError::Codec(format!(
                "decision must be {DECISION_RESULT_LEN} byte, got {}",
                raw.len()
            ))),
        }
    }
}

impl From<bool> for Decision {
    fn from(block: bool) -> Self {
        if block { Self::Block } else { Self::Allow }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Allow => write!(f, "allow"),
        }
    }
}

pub(crate) fn decode_bool(byte: u8) -> ComputeResult<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ComputeError::Codec(format!("invalid bool byte {other:#04x}"))),
    }
}
