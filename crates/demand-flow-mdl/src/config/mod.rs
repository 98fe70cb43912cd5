//! Model configuration.
//!
//! `MdlConfig` is the single immutable description a model is built from.
//! It is validated once, at construction; nothing in the forward path
//! re-checks configuration.
//!
//! # TOML Structure
//!
//! ```toml
//! node_conf  = [3, 2, 8, 8]
//! node_pconf = [1, 2, 8, 8]
//! node_tconf = [1, 2, 8, 8]
//! edge_conf  = [3, 128, 8, 8]
//! edge_pconf = [1, 128, 8, 8]
//! edge_tconf = [1, 128, 8, 8]
//! embed_dim = 16
//! bridge = "sum"
//! external_dim = 28
//! nb_residual_unit = 2
//! ```
//!
//! Each view entry is `[len_seq, nb_flow, map_height, map_width]`.
//!
//! # Design Principles
//!
//! - **FAIL FAST**: wrong tuple arity, unknown bridge, or inconsistent grids
//!   are errors at load/construction time
//! - **EXPLICIT GATING STATE**: omitting `external_dim` (or setting it to 0)
//!   builds a model whose external gating is a logged no-op

mod bridge;
mod view;

pub use bridge::Bridge;
pub use view::{ViewConf, ViewKind, ViewTriad};

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MdlError, MdlResult};

fn default_nb_residual_unit() -> usize {
    2
}

/// Root configuration of the multi-view model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdlConfig {
    /// Node view, closeness granularity.
    pub node_conf: ViewConf,
    /// Node view, period granularity.
    pub node_pconf: ViewConf,
    /// Node view, trend granularity.
    pub node_tconf: ViewConf,
    /// Edge view, closeness granularity.
    pub edge_conf: ViewConf,
    /// Edge view, period granularity.
    pub edge_pconf: ViewConf,
    /// Edge view, trend granularity.
    pub edge_tconf: ViewConf,
    /// Width of the 1x1 embedding applied to edge inputs.
    pub embed_dim: usize,
    /// Node/edge bridge mode.
    #[serde(default)]
    pub bridge: Bridge,
    /// External covariate width. `None` or `Some(0)` disables gating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_dim: Option<usize>,
    /// Residual blocks per stack.
    #[serde(default = "default_nb_residual_unit")]
    pub nb_residual_unit: usize,
}

impl Default for MdlConfig {
    /// 8x8 grid, (3, 1, 1) steps, embedding 16, concat bridge, no external covariates.
    fn default() -> Self {
        Self::for_grid(8, 8, (3, 1, 1))
    }
}

impl MdlConfig {
    /// Build a configuration for an `h x w` grid with 2 node flows and
    /// `2*h*w` transition channels, using `(closeness, period, trend)` lengths.
    pub fn for_grid(h: usize, w: usize, lens: (usize, usize, usize)) -> Self {
        let edge_flow = 2 * h * w;
        Self {
            node_conf: ViewConf::new(lens.0, 2, h, w),
            node_pconf: ViewConf::new(lens.1, 2, h, w),
            node_tconf: ViewConf::new(lens.2, 2, h, w),
            edge_conf: ViewConf::new(lens.0, edge_flow, h, w),
            edge_pconf: ViewConf::new(lens.1, edge_flow, h, w),
            edge_tconf: ViewConf::new(lens.2, edge_flow, h, w),
            embed_dim: 16,
            bridge: Bridge::default(),
            external_dim: None,
            nb_residual_unit: default_nb_residual_unit(),
        }
    }

    /// Set the bridge mode.
    #[must_use]
    pub fn with_bridge(mut self, bridge: Bridge) -> Self {
        self.bridge = bridge;
        self
    }

    /// Set the external covariate width.
    #[must_use]
    pub fn with_external_dim(mut self, external_dim: Option<usize>) -> Self {
        self.external_dim = external_dim;
        self
    }

    /// Node view triad.
    pub fn node_triad(&self) -> ViewTriad {
        ViewTriad {
            closeness: self.node_conf,
            period: self.node_pconf,
            trend: self.node_tconf,
        }
    }

    /// Edge view triad.
    pub fn edge_triad(&self) -> ViewTriad {
        ViewTriad {
            closeness: self.edge_conf,
            period: self.edge_pconf,
            trend: self.edge_tconf,
        }
    }

    /// Grid `(height, width)` shared by every view.
    pub fn grid(&self) -> (usize, usize) {
        self.node_conf.grid()
    }

    /// External covariate width when gating is active.
    pub fn active_external_dim(&self) -> Option<usize> {
        self.external_dim.filter(|&d| d > 0)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// - `MdlError::ConfigError` if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> MdlResult<Self> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path).map_err(|e| {
            MdlError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&contents).map_err(|e| {
            MdlError::config(format!(
                "Failed to parse TOML in '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> MdlResult<Self> {
        toml::from_str(toml).map_err(|e| MdlError::config(format!("Failed to parse TOML: {}", e)))
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml_string(&self) -> MdlResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| MdlError::config(format!("Failed to serialize to TOML: {}", e)))
    }

    /// Validate the configuration, returning the first problem found.
    ///
    /// # Errors
    /// - `MdlError::ConfigError` naming the offending field
    pub fn validate(&self) -> MdlResult<()> {
        let views = [
            ("node_conf", &self.node_conf),
            ("node_pconf", &self.node_pconf),
            ("node_tconf", &self.node_tconf),
            ("edge_conf", &self.edge_conf),
            ("edge_pconf", &self.edge_pconf),
            ("edge_tconf", &self.edge_tconf),
        ];

        for (name, conf) in views {
            conf.validate()
                .map_err(|e| MdlError::config(format!("[{}] {}", name, e)))?;
        }

        let grid = self.grid();
        for (name, conf) in views {
            if conf.grid() != grid {
                return Err(MdlError::config(format!(
                    "[{}] grid {:?} differs from node_conf grid {:?}",
                    name,
                    conf.grid(),
                    grid
                )));
            }
        }

        let transitions = 2 * grid.0 * grid.1;
        for (name, conf) in &views[3..] {
            if conf.nb_flow != transitions {
                return Err(MdlError::config(format!(
                    "[{}] nb_flow must be 2*h*w = {} (outgoing then incoming transitions), got {}",
                    name, transitions, conf.nb_flow
                )));
            }
        }

        if self.embed_dim == 0 {
            return Err(MdlError::config("[embed_dim] must be > 0"));
        }
        if self.nb_residual_unit == 0 {
            return Err(MdlError::config("[nb_residual_unit] must be > 0"));
        }

        Ok(())
    }

    /// Apply environment variable overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `MDL_EMBED_DIM` | `embed_dim` |
    /// | `MDL_BRIDGE` | `bridge` |
    /// | `MDL_EXTERNAL_DIM` | `external_dim` |
    /// | `MDL_NB_RESIDUAL_UNIT` | `nb_residual_unit` |
    ///
    /// Unparseable values are ignored; `validate()` still runs at construction.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = env::var("MDL_EMBED_DIM") {
            if let Ok(n) = val.parse::<usize>() {
                self.embed_dim = n;
            }
        }
        if let Ok(val) = env::var("MDL_BRIDGE") {
            if let Ok(b) = val.parse::<Bridge>() {
                self.bridge = b;
            }
        }
        if let Ok(val) = env::var("MDL_EXTERNAL_DIM") {
            if let Ok(n) = val.parse::<usize>() {
                self.external_dim = Some(n);
            }
        }
        if let Ok(val) = env::var("MDL_NB_RESIDUAL_UNIT") {
            if let Ok(n) = val.parse::<usize>() {
                self.nb_residual_unit = n;
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
node_conf  = [3, 2, 4, 4]
node_pconf = [1, 2, 4, 4]
node_tconf = [1, 2, 4, 4]
edge_conf  = [3, 32, 4, 4]
edge_pconf = [1, 32, 4, 4]
edge_tconf = [1, 32, 4, 4]
embed_dim = 8
bridge = "sum"
external_dim = 5
"#;

    #[test]
    fn test_default_config_valid() {
        let config = MdlConfig::default();
        config.validate().expect("defaults should be valid");
        assert_eq!(config.grid(), (8, 8));
        assert_eq!(config.edge_conf.nb_flow, 128);
        assert_eq!(config.active_external_dim(), None);
    }

    #[test]
    fn test_parse_sample() {
        let config = MdlConfig::from_toml_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.bridge, Bridge::Sum);
        assert_eq!(config.external_dim, Some(5));
        assert_eq!(config.nb_residual_unit, 2);
        assert_eq!(config.edge_triad().closeness, ViewConf::new(3, 32, 4, 4));
    }

    #[test]
    fn test_wrong_arity_rejected() {
        for tuple in ["[3, 2, 4]", "[3, 2, 4, 4, 99]", "[]"] {
            let line = format!("node_conf  = {}", tuple);
            let toml = SAMPLE.replace("node_conf  = [3, 2, 4, 4]", &line);
            let err = MdlConfig::from_toml_str(&toml).unwrap_err();
            assert!(matches!(err, MdlError::ConfigError { .. }), "{} accepted", tuple);
            assert!(err.to_string().contains("4 entries"), "got: {}", err);
        }
    }

    #[test]
    fn test_unknown_bridge_rejected() {
        let toml = SAMPLE.replace("\"sum\"", "\"cross\"");
        assert!(MdlConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_grid_mismatch_rejected() {
        let mut config = MdlConfig::default();
        config.node_pconf = ViewConf::new(1, 2, 8, 7);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("node_pconf"), "got: {}", err);
    }

    #[test]
    fn test_edge_flow_channels_checked() {
        let mut config = MdlConfig::default();
        config.edge_tconf = ViewConf::new(1, 64, 8, 8);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("edge_tconf"), "got: {}", err);
    }

    #[test]
    fn test_zero_embed_dim_rejected() {
        let mut config = MdlConfig::default();
        config.embed_dim = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = MdlConfig::default()
            .with_bridge(Bridge::Sum)
            .with_external_dim(Some(12));
        let text = config.to_toml_string().unwrap();
        assert_eq!(MdlConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mdl.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = MdlConfig::from_file(&path).unwrap();
        assert_eq!(config.embed_dim, 8);

        let missing = MdlConfig::from_file(dir.path().join("nope.toml"));
        assert!(missing.is_err());
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("MDL_NB_RESIDUAL_UNIT", "3");
        env::set_var("MDL_BRIDGE", "not-a-bridge");
        let config = MdlConfig::default().with_env_overrides();
        env::remove_var("MDL_NB_RESIDUAL_UNIT");
        env::remove_var("MDL_BRIDGE");

        assert_eq!(config.nb_residual_unit, 3);
        assert_eq!(config.bridge, Bridge::Concat);
    }
}
