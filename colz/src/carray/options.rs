use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use colz_array::Scalar;
use colz_error::{ColzResult, colz_bail};
use serde::{Deserialize, Serialize};

/// How chunks are compressed.
///
/// Attached to a column when it is created. A column is recompressed only by copying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompressionParams {
    level: u8,
    shuffle: bool,
}

impl CompressionParams {
    pub const MAX_LEVEL: u8 = 9;

    pub fn new(level: u8, shuffle: bool) -> ColzResult<Self> {
        if level > Self::MAX_LEVEL {
            colz_bail!(
                "compression level must be between 0 and {}, got {level}",
                Self::MAX_LEVEL
            );
        }
        Ok(Self { level, shuffle })
    }

    /// Level `0` stores chunks uncompressed.
    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }
}

impl Default for CompressionParams {
    fn default() -> Self {
        Self {
            level: 5,
            shuffle: true,
        }
    }
}

impl Display for CompressionParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cparams(level={}, shuffle={})", self.level, self.shuffle)
    }
}

/// How a persisted column or table is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// Existing data, no mutation.
    Read,
    /// Replace whatever exists at the root.
    Write,
    /// Open existing data for appending, or create it.
    #[default]
    Append,
}

impl OpenMode {
    pub fn is_writable(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

impl Display for OpenMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenMode::Read => write!(f, "r"),
            OpenMode::Write => write!(f, "w"),
            OpenMode::Append => write!(f, "a"),
        }
    }
}

/// Construction parameters for a [`Column`](crate::Column).
///
/// Unset fields fall back to the process [`Config`](crate::Config) (compression) or are
/// derived from the data (chunk length).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnOptions {
    pub cparams: Option<CompressionParams>,
    pub chunklen: Option<usize>,
    pub expectedlen: Option<usize>,
    pub dflt: Option<Scalar>,
    pub root: Option<PathBuf>,
    pub mode: OpenMode,
}

impl ColumnOptions {
    pub fn with_cparams(mut self, cparams: CompressionParams) -> Self {
        self.cparams = Some(cparams);
        self
    }

    pub fn with_chunklen(mut self, chunklen: usize) -> Self {
        self.chunklen = Some(chunklen);
        self
    }

    pub fn with_expectedlen(mut self, expectedlen: usize) -> Self {
        self.expectedlen = Some(expectedlen);
        self
    }

    pub fn with_dflt(mut self, dflt: impl Into<Scalar>) -> Self {
        self.dflt = Some(dflt.into());
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }
}
