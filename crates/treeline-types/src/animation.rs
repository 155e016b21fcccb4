use std::fmt;

use serde::{Deserialize, Serialize};

/// Visual style token attached to a single kind of list operation.
///
/// The controller never interprets these beyond [`AnimationStyle::None`];
/// they are forwarded to the host view untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationStyle {
    /// No animation.
    None,
    /// Let the host pick.
    #[default]
    Automatic,
    Fade,
    Right,
    Left,
    Top,
    Bottom,
    Middle,
}

impl fmt::Display for AnimationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Automatic => "automatic",
            Self::Fade => "fade",
            Self::Right => "right",
            Self::Left => "left",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Middle => "middle",
        };
        f.write_str(name)
    }
}

/// Animation configuration for one reconciliation.
///
/// [`RowAnimation::NONE`] has a special meaning: the controller skips diffing
/// entirely and asks the view for a synchronous full reload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowAnimation {
    /// Style for inserted rows and sections.
    pub insertion: AnimationStyle,
    /// Style for deleted rows and sections.
    pub deletion: AnimationStyle,
    /// Style for rows reloaded in place.
    pub update: AnimationStyle,
}

impl RowAnimation {
    pub const NONE: Self = Self::uniform(AnimationStyle::None);
    pub const AUTOMATIC: Self = Self::uniform(AnimationStyle::Automatic);
    pub const FADE: Self = Self::uniform(AnimationStyle::Fade);
    pub const RIGHT: Self = Self::uniform(AnimationStyle::Right);
    pub const LEFT: Self = Self::uniform(AnimationStyle::Left);
    pub const TOP: Self = Self::uniform(AnimationStyle::Top);
    pub const BOTTOM: Self = Self::uniform(AnimationStyle::Bottom);
    pub const MIDDLE: Self = Self::uniform(AnimationStyle::Middle);

    /// Create an animation with distinct per-operation styles.
    pub const fn new(
        insertion: AnimationStyle,
        deletion: AnimationStyle,
        update: AnimationStyle,
    ) -> Self {
        Self {
            insertion,
            deletion,
            update,
        }
    }

    /// The same style for every operation kind.
    pub const fn uniform(style: AnimationStyle) -> Self {
        Self::new(style, style, style)
    }

    /// Returns `true` if this is [`RowAnimation::NONE`], i.e. the caller asked
    /// for an instant full reload instead of an animated batch.
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl Default for RowAnimation {
    fn default() -> Self {
        Self::AUTOMATIC
    }
}

impl From<AnimationStyle> for RowAnimation {
    fn from(style: AnimationStyle) -> Self {
        Self::uniform(style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_only_the_uniform_none() {
        assert!(RowAnimation::NONE.is_none());
        assert!(!RowAnimation::FADE.is_none());
        let mixed = RowAnimation::new(
            AnimationStyle::None,
            AnimationStyle::Fade,
            AnimationStyle::None,
        );
        assert!(!mixed.is_none());
    }

    #[test]
    fn from_style_is_uniform() {
        let anim = RowAnimation::from(AnimationStyle::Left);
        assert_eq!(anim, RowAnimation::LEFT);
        assert_eq!(anim.update, AnimationStyle::Left);
    }

    #[test]
    fn style_serde_is_snake_case() {
        let json = serde_json::to_string(&AnimationStyle::Fade).unwrap();
        assert_eq!(json, "\"fade\"");
        let back: AnimationStyle = serde_json::from_str("\"middle\"").unwrap();
        assert_eq!(back, AnimationStyle::Middle);
        assert_eq!(AnimationStyle::Bottom.to_string(), "bottom");
    }
}
