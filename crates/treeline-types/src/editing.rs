use serde::{Deserialize, Serialize};

/// Editing affordance shown for a row while the list is in editing mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditingStyle {
    #[default]
    None,
    Delete,
    Insert,
}

/// Visual weight of a swipe action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowActionStyle {
    #[default]
    Normal,
    Destructive,
}

/// A swipe/edit action offered for a row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowAction {
    /// Stable identifier reported back when the action is triggered.
    pub identifier: String,
    /// User-facing title.
    pub title: String,
    pub style: RowActionStyle,
}

impl RowAction {
    /// A normal-weight action.
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            style: RowActionStyle::Normal,
        }
    }

    /// A destructive action (usually rendered in red).
    pub fn destructive(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            style: RowActionStyle::Destructive,
            ..Self::new(identifier, title)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_inert() {
        assert_eq!(EditingStyle::default(), EditingStyle::None);
        assert_eq!(RowActionStyle::default(), RowActionStyle::Normal);
    }

    #[test]
    fn destructive_action() {
        let action = RowAction::destructive("delete", "Delete");
        assert_eq!(action.style, RowActionStyle::Destructive);
        assert_eq!(action.identifier, "delete");
        assert_eq!(RowAction::new("a", "A").style, RowActionStyle::Normal);
    }
}
