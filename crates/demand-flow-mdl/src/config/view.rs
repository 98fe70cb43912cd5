//! Per-view, per-granularity input configuration.

use serde::{Deserialize, Serialize};

/// Shape of one temporal granularity (closeness, period or trend) of one view.
///
/// Serialized as a 4-element array `[len_seq, nb_flow, map_height, map_width]`;
/// a TOML array of any other length, shorter or longer, fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "(usize, usize, usize, usize)")]
pub struct ViewConf {
    /// Number of stacked time steps.
    pub len_seq: usize,
    /// Channels per time step (2 for node flow, `2*h*w` for transitions).
    pub nb_flow: usize,
    /// Grid height.
    pub map_height: usize,
    /// Grid width.
    pub map_width: usize,
}

impl ViewConf {
    /// Create a view configuration.
    pub const fn new(len_seq: usize, nb_flow: usize, map_height: usize, map_width: usize) -> Self {
        Self {
            len_seq,
            nb_flow,
            map_height,
            map_width,
        }
    }

    /// Channel count after flattening time and flow axes.
    #[inline]
    #[must_use]
    pub fn stacked_channels(&self) -> usize {
        self.len_seq * self.nb_flow
    }

    /// Grid size as `(height, width)`.
    #[inline]
    #[must_use]
    pub fn grid(&self) -> (usize, usize) {
        (self.map_height, self.map_width)
    }

    /// Expected per-sample input dims `[len_seq, nb_flow, h, w]`.
    pub fn sample_dims(&self) -> [usize; 4] {
        [self.len_seq, self.nb_flow, self.map_height, self.map_width]
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.len_seq == 0 || self.nb_flow == 0 || self.map_height == 0 || self.map_width == 0 {
            return Err(format!(
                "all entries must be > 0, got {:?}",
                self.sample_dims()
            ));
        }
        Ok(())
    }
}

impl From<(usize, usize, usize, usize)> for ViewConf {
    fn from((len_seq, nb_flow, map_height, map_width): (usize, usize, usize, usize)) -> Self {
        Self::new(len_seq, nb_flow, map_height, map_width)
    }
}

impl TryFrom<Vec<usize>> for ViewConf {
    type Error = String;

    fn try_from(values: Vec<usize>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            &[len_seq, nb_flow, map_height, map_width] => {
                Ok(Self::new(len_seq, nb_flow, map_height, map_width))
            }
            other => Err(format!(
                "view tuple needs 4 entries [len_seq, nb_flow, map_height, map_width], got {}: {:?}",
                other.len(),
                other
            )),
        }
    }
}

impl From<ViewConf> for (usize, usize, usize, usize) {
    fn from(c: ViewConf) -> Self {
        (c.len_seq, c.nb_flow, c.map_height, c.map_width)
    }
}

/// Closeness, period and trend configurations of one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTriad {
    pub closeness: ViewConf,
    pub period: ViewConf,
    pub trend: ViewConf,
}

impl ViewTriad {
    /// Grid size shared by all three granularities (taken from closeness).
    pub fn grid(&self) -> (usize, usize) {
        self.closeness.grid()
    }
}

/// Which view a spatial feature extractor serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Per-cell aggregate flow; 64-wide hidden layers, no embedding.
    Node,
    /// Per-cell-pair transitions; 1x1 embedding then 128-wide hidden layers.
    Edge,
}

impl ViewKind {
    /// Hidden width of the residual towers.
    #[must_use]
    pub const fn hidden_channels(self) -> usize {
        match self {
            Self::Node => 64,
            Self::Edge => 128,
        }
    }
}
