use serde::{Deserialize, Serialize};
use treeline_types::{AnimationStyle, RowAnimation};

use crate::error::ControllerResult;

/// What to do with a reconciliation submitted while a background diff is
/// still in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Keep the newest request in a single pending slot and start it once the
    /// in-flight job lands. An older pending request is discarded.
    #[default]
    Queue,
    /// Discard the request and log a warning.
    Drop,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Animation used by `submit_reload` and `submit_update`.
    pub animation: RowAnimation,
    /// Style used for rows inserted or removed by expand and collapse.
    pub expand_collapse: AnimationStyle,
    /// Row height reported for rows that have not been displayed yet.
    pub estimated_row_height: f64,
    pub overlap: OverlapPolicy,
    /// Whether `submit_reload` and `submit_update` diff in the background.
    pub concurrent: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            animation: RowAnimation::AUTOMATIC,
            expand_collapse: AnimationStyle::Fade,
            estimated_row_height: 44.0,
            overlap: OverlapPolicy::Queue,
            concurrent: false,
        }
    }
}

impl ControllerConfig {
    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml(text: &str) -> ControllerResult<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ControllerConfig::default();
        assert_eq!(c.animation, RowAnimation::AUTOMATIC);
        assert_eq!(c.expand_collapse, AnimationStyle::Fade);
        assert_eq!(c.estimated_row_height, 44.0);
        assert_eq!(c.overlap, OverlapPolicy::Queue);
        assert!(!c.concurrent);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ControllerConfig::from_toml(
            r#"
            expand_collapse = "middle"
            overlap = "drop"
            concurrent = true

            [animation]
            insertion = "left"
            deletion = "right"
            update = "none"
            "#,
        )
        .unwrap();
        assert_eq!(c.expand_collapse, AnimationStyle::Middle);
        assert_eq!(c.overlap, OverlapPolicy::Drop);
        assert!(c.concurrent);
        assert_eq!(c.animation.insertion, AnimationStyle::Left);
        assert_eq!(c.animation.update, AnimationStyle::None);
        assert_eq!(c.estimated_row_height, 44.0);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = ControllerConfig::from_toml("overlap = \"sometimes\"").unwrap_err();
        assert!(matches!(err, crate::error::ControllerError::Config(_)));
    }
}
