//! Outbound boundary: the list view the controller drives.

use serde::{Deserialize, Serialize};
use treeline_tree::AnyItem;
use treeline_types::{AnimationStyle, IndexPath};

/// One structural or content change for the host list view.
///
/// Within a [`ViewBatch`], deletions and move sources are expressed in
/// pre-batch coordinates; insertions, move destinations and reloads in
/// post-batch coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ViewCommand {
    InsertSections {
        sections: Vec<usize>,
        animation: AnimationStyle,
    },
    DeleteSections {
        sections: Vec<usize>,
        animation: AnimationStyle,
    },
    MoveSection {
        from: usize,
        to: usize,
    },
    InsertRows {
        rows: Vec<IndexPath>,
        animation: AnimationStyle,
    },
    DeleteRows {
        rows: Vec<IndexPath>,
        animation: AnimationStyle,
    },
    MoveRow {
        from: IndexPath,
        to: IndexPath,
    },
    ReloadRows {
        rows: Vec<IndexPath>,
        animation: AnimationStyle,
    },
}

/// Commands applied by the view as one atomic update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewBatch {
    pub commands: Vec<ViewCommand>,
}

impl ViewBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn push(&mut self, command: ViewCommand) {
        self.commands.push(command);
    }

    /// Push a row insertion unless `rows` is empty.
    pub fn insert_rows(&mut self, rows: Vec<IndexPath>, animation: AnimationStyle) {
        if !rows.is_empty() {
            self.push(ViewCommand::InsertRows { rows, animation });
        }
    }

    /// Push a row deletion unless `rows` is empty.
    pub fn delete_rows(&mut self, rows: Vec<IndexPath>, animation: AnimationStyle) {
        if !rows.is_empty() {
            self.push(ViewCommand::DeleteRows { rows, animation });
        }
    }

    /// Push a row reload unless `rows` is empty.
    pub fn reload_rows(&mut self, rows: Vec<IndexPath>, animation: AnimationStyle) {
        if !rows.is_empty() {
            self.push(ViewCommand::ReloadRows { rows, animation });
        }
    }
}

/// Read access to the controller's rows, as they stand after a batch.
pub trait RowSource {
    fn number_of_sections(&self) -> usize;
    fn number_of_rows(&self, section: usize) -> usize;
    fn item_at(&self, index_path: IndexPath) -> Option<AnyItem>;
}

/// The host list widget.
///
/// The controller owns the row data; the view only renders it. A drag
/// preview is never considered applied: after a drop the controller issues
/// the authoritative [`ViewCommand::MoveRow`]s for the whole moved block.
pub trait ListView {
    /// Rendered cell type handed to the delegate for configuration.
    type Cell;

    /// Discard everything and re-read `source`.
    fn reload_data(&mut self, source: &dyn RowSource);

    /// Apply `batch` atomically. `source` already reflects the result.
    fn perform_batch(&mut self, batch: &ViewBatch, source: &dyn RowSource);

    /// A cell for the given template, ready to be configured.
    fn dequeue_cell(&mut self, identifier: &str, index_path: IndexPath) -> Self::Cell;

    /// The on-screen cell at `index_path`, if any.
    fn visible_cell(&self, _index_path: IndexPath) -> Option<&Self::Cell> {
        None
    }

    fn select_row(&mut self, _index_path: IndexPath) {}

    fn deselect_row(&mut self, _index_path: IndexPath) {}

    fn selected_rows(&self) -> Vec<IndexPath> {
        Vec::new()
    }

    /// Selection is ignored for expand/collapse while editing.
    fn is_editing(&self) -> bool {
        false
    }
}
