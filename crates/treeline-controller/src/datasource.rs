//! Inbound boundary: the questions and events a list view forwards to the
//! controller.

use tracing::trace;
use treeline_tree::AnyItem;
use treeline_types::{EditingStyle, IndexPath, RowAction};

use crate::controller::TreeController;
use crate::error::{ControllerError, ControllerResult};
use crate::view::ListView;

impl<V: ListView> TreeController<V> {
    fn row_item(&self, index_path: IndexPath) -> ControllerResult<AnyItem> {
        self.rows
            .get(index_path)
            .cloned()
            .ok_or(ControllerError::RowOutOfBounds(index_path))
    }

    pub fn number_of_sections(&self) -> usize {
        self.rows.len()
    }

    pub fn number_of_rows(&self, section: usize) -> usize {
        self.rows.section(section).map_or(0, <[AnyItem]>::len)
    }

    /// Dequeue a cell for the row's template and let the delegate fill it.
    pub fn cell_for_row(&mut self, index_path: IndexPath) -> ControllerResult<V::Cell> {
        let item = self.row_item(index_path)?;
        let identifier = self
            .row_state(index_path)
            .and_then(|state| state.cell_identifier)
            .ok_or_else(|| ControllerError::ItemNotFound(format!("{:?}", item.key())))?;
        let mut cell = self.view.dequeue_cell(&identifier, index_path);
        self.delegate.configure(&mut cell, &item);
        Ok(cell)
    }

    /// Toggle expansion (unless the view is editing), then report the
    /// selection.
    pub fn did_select_row(&mut self, index_path: IndexPath) -> ControllerResult<()> {
        self.ensure_ready()?;
        let item = self.row_item(index_path)?;
        if !self.view.is_editing() {
            self.toggle_row(index_path)?;
        }
        self.delegate.did_select(&item);
        Ok(())
    }

    pub fn did_deselect_row(&mut self, index_path: IndexPath) -> ControllerResult<()> {
        let item = self.row_item(index_path)?;
        self.delegate.did_deselect(&item);
        Ok(())
    }

    pub fn accessory_button_tapped(&mut self, index_path: IndexPath) -> ControllerResult<()> {
        let item = self.row_item(index_path)?;
        self.delegate.accessory_tapped(&item);
        Ok(())
    }

    pub fn can_edit_row(&self, index_path: IndexPath) -> bool {
        self.rows
            .get(index_path)
            .is_some_and(|item| self.delegate.can_edit(item))
    }

    pub fn editing_style(&self, index_path: IndexPath) -> EditingStyle {
        self.rows
            .get(index_path)
            .map_or(EditingStyle::None, |item| self.delegate.editing_style(item))
    }

    pub fn edit_actions(&self, index_path: IndexPath) -> Option<Vec<RowAction>> {
        self.rows
            .get(index_path)
            .and_then(|item| self.delegate.edit_actions(item))
    }

    pub fn commit_edit(&mut self, style: EditingStyle, index_path: IndexPath) -> ControllerResult<()> {
        let item = self.row_item(index_path)?;
        self.delegate.commit_edit(style, &item);
        Ok(())
    }

    /// Remember the rendered height of a row about to be shown.
    pub fn will_display_row(&mut self, index_path: IndexPath, height: f64) -> ControllerResult<()> {
        let item = self.row_item(index_path)?;
        let id = self.node_of(&item)?;
        self.arena.set_estimated_row_height(id, height)?;
        self.background.record_row_height(index_path, height);
        trace!(%index_path, height, "row height recorded");
        Ok(())
    }

    /// Last recorded height of the row, or the configured estimate.
    pub fn estimated_row_height(&self, index_path: IndexPath) -> f64 {
        self.row_state(index_path)
            .and_then(|state| state.estimated_row_height)
            .unwrap_or(self.config.estimated_row_height)
    }

    pub fn indentation_level_for_row(&self, index_path: IndexPath) -> usize {
        self.row_state(index_path).map_or(0, |state| state.indentation)
    }
}
