use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    /// Copies of each result buffer the renderer keeps in flight.
    pub buffers_in_flight: usize,
    pub evaluate_every_n_ticks: u64,
    pub fade_duration_s: f32,
    /// Extra screen space reserved around a road name, in pixels.
    pub road_label_screen_spacing: f32,
    pub max_projection_points: usize,
    pub max_transforms: usize,
    pub max_road_tiles: usize,
    pub grid_cluster_size: f32,
    pub grid_cell_count: usize,
    pub glyph_cell_size: f32,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            buffers_in_flight: 3,
            evaluate_every_n_ticks: 10,
            fade_duration_s: 0.5,
            road_label_screen_spacing: 4.0,
            max_projection_points: 65_536,
            max_transforms: 512,
            max_road_tiles: 256,
            grid_cluster_size: 50.0,
            grid_cell_count: 300,
            glyph_cell_size: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "labels config parse error: {msg}"),
            ConfigError::Invalid { field, reason } => {
                write!(f, "invalid labels config: {field} {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl LabelsConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: LabelsConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });

        if self.buffers_in_flight == 0 {
            return invalid("buffers_in_flight", "must be at least 1");
        }
        if self.evaluate_every_n_ticks == 0 {
            return invalid("evaluate_every_n_ticks", "must be at least 1");
        }
        if !self.fade_duration_s.is_finite() || self.fade_duration_s < 0.0 {
            return invalid("fade_duration_s", "must be a non-negative number");
        }
        if !self.road_label_screen_spacing.is_finite() {
            return invalid("road_label_screen_spacing", "must be finite");
        }
        if self.max_projection_points == 0 {
            return invalid("max_projection_points", "must be at least 1");
        }
        if self.max_transforms == 0 {
            return invalid("max_transforms", "must be at least 1");
        }
        if self.max_road_tiles == 0 {
            return invalid("max_road_tiles", "must be at least 1");
        }
        if !(self.grid_cluster_size.is_finite() && self.grid_cluster_size > 0.0) {
            return invalid("grid_cluster_size", "must be positive");
        }
        if self.grid_cell_count == 0 {
            return invalid("grid_cell_count", "must be at least 1");
        }
        if !(self.glyph_cell_size.is_finite() && self.glyph_cell_size > 0.0) {
            return invalid("glyph_cell_size", "must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, LabelsConfig};
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(LabelsConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            LabelsConfig::from_json_str(r#"{ "fade_duration_s": 0.25, "max_road_tiles": 8 }"#)
                .unwrap();
        assert_eq!(
            config,
            LabelsConfig {
                fade_duration_s: 0.25,
                max_road_tiles: 8,
                ..LabelsConfig::default()
            }
        );
    }

    #[test]
    fn rejects_zero_buffers() {
        let err = LabelsConfig::from_json_str(r#"{ "buffers_in_flight": 0 }"#).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                field: "buffers_in_flight",
                reason: "must be at least 1"
            }
        );
    }

    #[test]
    fn rejects_zero_road_tiles() {
        let err = LabelsConfig::from_json_str(r#"{ "max_road_tiles": 0 }"#).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                field: "max_road_tiles",
                reason: "must be at least 1"
            }
        );
    }

    #[test]
    fn reports_parse_errors() {
        let err = LabelsConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("labels config parse error"));
    }
}
