//! Bridge mode between the node and edge fusion outputs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MdlError;
use crate::FUSED_CHANNELS;

/// How node-view and edge-view features are joined before the prediction heads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bridge {
    /// Channel concatenation; heads see `2 * FUSED_CHANNELS` channels.
    #[default]
    Concat,
    /// Edge features reduced by a 1x1 conv and added to node features;
    /// heads see `FUSED_CHANNELS` channels.
    Sum,
}

impl Bridge {
    /// Input width of the node/edge prediction heads for this mode.
    #[must_use]
    pub const fn head_in_channels(self) -> usize {
        match self {
            Self::Concat => 2 * FUSED_CHANNELS,
            Self::Sum => FUSED_CHANNELS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Concat => "concat",
            Self::Sum => "sum",
        }
    }
}

impl FromStr for Bridge {
    type Err = MdlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "concat" => Ok(Self::Concat),
            "sum" => Ok(Self::Sum),
            other => Err(MdlError::InvalidBridge(other.to_string())),
        }
    }
}

impl fmt::Display for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
