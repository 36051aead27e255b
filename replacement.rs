//! Replacement patterns written over file content before deletion.
//!
//! A [`ReplacementSource`] fills a scratch buffer with the bytes that will
//! overwrite the next chunk of a file. Sources are shared across every
//! concurrently running erase job, so they must be `Send + Sync` and keep no
//! per-call state.
//!
//! ## Patterns
//!
//! - [`ZeroFill`]: every byte set to `0x00`
//! - [`CryptoRandomFill`]: bytes from the operating system CSPRNG via `OsRng`

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Fills a buffer with a replacement pattern.
pub trait ReplacementSource: Send + Sync {
    /// Overwrite every byte of `buffer` with the pattern.
    fn fill(&self, buffer: &mut [u8]);

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// All-zero pattern.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroFill;

impl ReplacementSource for ZeroFill {
    fn fill(&self, buffer: &mut [u8]) {
        buffer.fill(0);
    }

    fn name(&self) -> &'static str {
        "zeros"
    }
}

/// Cryptographically secure random pattern. No seeding, each call differs.
#[derive(Debug, Default, Clone, Copy)]
pub struct CryptoRandomFill;

impl ReplacementSource for CryptoRandomFill {
    fn fill(&self, buffer: &mut [u8]) {
        OsRng.fill_bytes(buffer);
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Pattern selector used by config and CLI.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillPattern {
    #[default]
    Zeros,
    Random,
}

impl FillPattern {
    /// Build the shared source for this pattern.
    pub fn source(self) -> Arc<dyn ReplacementSource> {
        match self {
            Self::Zeros => Arc::new(ZeroFill),
            Self::Random => Arc::new(CryptoRandomFill),
        }
    }
}

impl fmt::Display for FillPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zeros => write!(f, "zeros"),
            Self::Random => write!(f, "random"),
        }
    }
}

impl FromStr for FillPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zeros" | "zero" => Ok(Self::Zeros),
            "random" => Ok(Self::Random),
            other => Err(format!("unknown fill pattern '{}' (expected zeros or random)", other)),
        }
    }
}
