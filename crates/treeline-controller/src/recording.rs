//! An in-memory [`ListView`] that replays every batch against a mirror of
//! its rows and reports where the mirror disagrees with the controller.
//!
//! Useful for headless hosts and for tests.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::warn;
use treeline_tree::AnyItem;
use treeline_types::IndexPath;

use crate::view::{ListView, RowSource, ViewBatch, ViewCommand};

/// Cell handed out by [`RecordingListView`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RecordedCell {
    pub identifier: String,
    pub index_path: IndexPath,
    /// Filled by the delegate.
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct RecordingListView {
    mirror: Vec<Vec<AnyItem>>,
    commands: Vec<ViewCommand>,
    batches: usize,
    full_reloads: usize,
    dequeued: usize,
    selected: BTreeSet<IndexPath>,
    editing: bool,
    inconsistencies: Vec<String>,
}

impl RecordingListView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows as the view believes them to be.
    pub fn mirror(&self) -> &[Vec<AnyItem>] {
        &self.mirror
    }

    /// Every command received since the last [`RecordingListView::take_commands`].
    pub fn commands(&self) -> &[ViewCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<ViewCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn full_reloads(&self) -> usize {
        self.full_reloads
    }

    pub fn dequeued(&self) -> usize {
        self.dequeued
    }

    /// Descriptions of every point where a replayed batch did not produce
    /// the rows the controller reported.
    pub fn inconsistencies(&self) -> &[String] {
        &self.inconsistencies
    }

    pub fn set_editing(&mut self, editing: bool) {
        self.editing = editing;
    }

    fn read_all(source: &dyn RowSource) -> Vec<Vec<AnyItem>> {
        (0..source.number_of_sections())
            .map(|section| {
                (0..source.number_of_rows(section))
                    .filter_map(|row| source.item_at(IndexPath::new(section, row)))
                    .collect()
            })
            .collect()
    }

    fn read_section(source: &dyn RowSource, section: usize) -> Vec<AnyItem> {
        (0..source.number_of_rows(section))
            .filter_map(|row| source.item_at(IndexPath::new(section, row)))
            .collect()
    }

    fn replay(&mut self, batch: &ViewBatch, source: &dyn RowSource) {
        let mut deleted_sections = BTreeSet::<usize>::new();
        let mut inserted_sections = BTreeSet::<usize>::new();
        let mut section_moves = BTreeMap::new();
        let mut removed_rows: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let mut placed_rows: BTreeMap<usize, BTreeMap<usize, Option<IndexPath>>> = BTreeMap::new();
        let mut reloads = Vec::new();

        for command in &batch.commands {
            match command {
                ViewCommand::DeleteSections { sections, .. } => deleted_sections.extend(sections),
                ViewCommand::InsertSections { sections, .. } => inserted_sections.extend(sections),
                ViewCommand::MoveSection { from, to } => {
                    section_moves.insert(*to, *from);
                }
                ViewCommand::DeleteRows { rows, .. } => {
                    for path in rows {
                        removed_rows.entry(path.section).or_default().insert(path.row);
                    }
                }
                ViewCommand::InsertRows { rows, .. } => {
                    for path in rows {
                        placed_rows.entry(path.section).or_default().insert(path.row, None);
                    }
                }
                ViewCommand::MoveRow { from, to } => {
                    removed_rows.entry(from.section).or_default().insert(from.row);
                    placed_rows
                        .entry(to.section)
                        .or_default()
                        .insert(to.row, Some(*from));
                }
                ViewCommand::ReloadRows { rows, .. } => reloads.extend(rows.iter().copied()),
            }
        }

        // Items leaving their old position, keyed by old coordinates.
        let mut lifted: BTreeMap<IndexPath, AnyItem> = BTreeMap::new();
        let mut remaining: Vec<Vec<AnyItem>> = Vec::with_capacity(self.mirror.len());
        for (section, rows) in self.mirror.iter().enumerate() {
            let removed = removed_rows.get(&section);
            let mut kept = Vec::with_capacity(rows.len());
            for (row, item) in rows.iter().enumerate() {
                if removed.is_some_and(|r| r.contains(&row)) {
                    lifted.insert(IndexPath::new(section, row), item.clone());
                } else {
                    kept.push(item.clone());
                }
            }
            remaining.push(kept);
        }

        let moved_sources: BTreeSet<usize> = section_moves.values().copied().collect();
        let mut leftovers = remaining
            .iter()
            .enumerate()
            .filter(|(s, _)| !deleted_sections.contains(s) && !moved_sources.contains(s))
            .map(|(_, rows)| rows.clone());

        let mut next = Vec::with_capacity(source.number_of_sections());
        for section in 0..source.number_of_sections() {
            let rows = if let Some(&from) = section_moves.get(&section) {
                remaining.get(from).cloned().unwrap_or_default()
            } else if inserted_sections.contains(&section) {
                Self::read_section(source, section)
            } else {
                leftovers.next().unwrap_or_default()
            };
            next.push(rows);
        }

        for (section, placements) in placed_rows {
            let Some(rows) = next.get_mut(section) else {
                self.report(format!("rows placed into missing section {section}"));
                continue;
            };
            for (row, from) in placements {
                let item = match from {
                    Some(from) => lifted.remove(&from),
                    None => source.item_at(IndexPath::new(section, row)),
                };
                match item {
                    Some(item) if row <= rows.len() => rows.insert(row, item),
                    _ => self.report(format!("cannot place row {}", IndexPath::new(section, row))),
                }
            }
        }

        for path in reloads {
            match (next.get_mut(path.section), source.item_at(path)) {
                (Some(rows), Some(item)) if path.row < rows.len() => rows[path.row] = item,
                _ => self.report(format!("cannot reload row {path}")),
            }
        }

        self.mirror = next;
        self.verify(source);
    }

    fn verify(&mut self, source: &dyn RowSource) {
        let expected = Self::read_all(source);
        let mut problems = Vec::new();
        if expected.len() != self.mirror.len() {
            problems.push(format!(
                "section count {} after batch, source has {}",
                self.mirror.len(),
                expected.len()
            ));
        }
        for (section, (mirror, expected)) in self.mirror.iter().zip(&expected).enumerate() {
            if mirror.len() != expected.len() {
                problems.push(format!(
                    "section {section} has {} rows after batch, source has {}",
                    mirror.len(),
                    expected.len()
                ));
            } else if let Some(row) = mirror.iter().zip(expected).position(|(a, b)| a != b) {
                problems.push(format!("row {} differs from source", IndexPath::new(section, row)));
            }
        }
        for message in problems {
            self.report(message);
        }
    }

    fn report(&mut self, message: String) {
        warn!(%message, "view out of sync");
        self.inconsistencies.push(message);
    }
}

impl ListView for RecordingListView {
    type Cell = RecordedCell;

    fn reload_data(&mut self, source: &dyn RowSource) {
        self.full_reloads += 1;
        self.mirror = Self::read_all(source);
        self.selected.clear();
    }

    fn perform_batch(&mut self, batch: &ViewBatch, source: &dyn RowSource) {
        self.batches += 1;
        self.commands.extend(batch.commands.iter().cloned());
        self.replay(batch, source);
    }

    fn dequeue_cell(&mut self, identifier: &str, index_path: IndexPath) -> RecordedCell {
        self.dequeued += 1;
        RecordedCell {
            identifier: identifier.to_string(),
            index_path,
            text: None,
        }
    }

    fn select_row(&mut self, index_path: IndexPath) {
        self.selected.insert(index_path);
    }

    fn deselect_row(&mut self, index_path: IndexPath) {
        self.selected.remove(&index_path);
    }

    fn selected_rows(&self) -> Vec<IndexPath> {
        self.selected.iter().copied().collect()
    }

    fn is_editing(&self) -> bool {
        self.editing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::Rows;
    use treeline_types::AnimationStyle;

    fn section(texts: &[&str]) -> Vec<AnyItem> {
        texts.iter().map(|t| AnyItem::new(t.to_string())).collect()
    }

    #[test]
    fn replays_deletes_inserts_and_moves() {
        let mut view = RecordingListView::new();
        view.reload_data(&Rows::new(vec![section(&["a", "b", "c", "d"])]));

        let after = Rows::new(vec![section(&["d", "a", "x", "c"])]);
        let mut batch = ViewBatch::new();
        batch.delete_rows(vec![IndexPath::new(0, 1)], AnimationStyle::Fade);
        batch.insert_rows(vec![IndexPath::new(0, 2)], AnimationStyle::Fade);
        batch.push(ViewCommand::MoveRow {
            from: IndexPath::new(0, 3),
            to: IndexPath::new(0, 0),
        });
        view.perform_batch(&batch, &after);

        assert!(view.inconsistencies().is_empty(), "{:?}", view.inconsistencies());
        assert_eq!(view.mirror(), after.sections());
        assert_eq!(view.commands().len(), 3);
    }

    #[test]
    fn replays_section_changes() {
        let mut view = RecordingListView::new();
        view.reload_data(&Rows::new(vec![section(&["a"]), section(&["b"])]));

        let after = Rows::new(vec![section(&["b"]), section(&["n"])]);
        let mut batch = ViewBatch::new();
        batch.push(ViewCommand::DeleteSections {
            sections: vec![0],
            animation: AnimationStyle::Fade,
        });
        batch.push(ViewCommand::InsertSections {
            sections: vec![1],
            animation: AnimationStyle::Fade,
        });
        view.perform_batch(&batch, &after);

        assert!(view.inconsistencies().is_empty(), "{:?}", view.inconsistencies());
        assert_eq!(view.mirror(), after.sections());
    }

    #[test]
    fn missing_commands_are_reported() {
        let mut view = RecordingListView::new();
        view.reload_data(&Rows::new(vec![section(&["a"])]));
        view.perform_batch(&ViewBatch::new(), &Rows::new(vec![section(&["a", "b"])]));
        assert_eq!(view.inconsistencies().len(), 1);
    }

    #[test]
    fn selection_and_editing() {
        let mut view = RecordingListView::new();
        view.select_row(IndexPath::new(0, 2));
        view.select_row(IndexPath::new(0, 1));
        assert_eq!(
            view.selected_rows(),
            vec![IndexPath::new(0, 1), IndexPath::new(0, 2)]
        );
        view.deselect_row(IndexPath::new(0, 1));
        assert_eq!(view.selected_rows(), vec![IndexPath::new(0, 2)]);
        assert!(!view.is_editing());
        view.set_editing(true);
        assert!(view.is_editing());
    }
}
