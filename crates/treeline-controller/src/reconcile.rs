//! Pure planning: turn before/after row snapshots into view batches.
//!
//! Nothing here touches the arena or the view, so the same planning code
//! serves the synchronous path and the background diff worker.

use std::collections::HashSet;

use serde::Serialize;
use tracing::trace;
use treeline_diff::Diff;
use treeline_tree::{AnyItem, DiffKey};
use treeline_types::{IndexPath, RowAnimation};

use crate::view::{ViewBatch, ViewCommand};

/// Section identities and their flattened rows at one point in time.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub section_keys: Vec<DiffKey>,
    pub rows: Vec<Vec<AnyItem>>,
}

impl Snapshot {
    fn rows_of(&self, section: usize) -> &[AnyItem] {
        self.rows.get(section).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Row diff for one section that survived the reload.
#[derive(Clone, Debug)]
pub struct SectionRows {
    /// Section index before the reload.
    pub before: usize,
    /// Section index after the reload.
    pub after: usize,
    pub diff: Diff,
}

/// Everything a whole-content reload must tell the view.
#[derive(Clone, Debug, Default)]
pub struct ReloadPlan {
    pub sections: Diff,
    pub rows: Vec<SectionRows>,
    /// Identities that left the tree and whose nodes may be freed.
    pub evicted: Vec<DiffKey>,
}

pub fn plan_reload(old: &Snapshot, new: &Snapshot) -> ReloadPlan {
    let sections = Diff::new(&old.section_keys, &new.section_keys);

    let mut removed: HashSet<DiffKey> = HashSet::new();
    for &section in &sections.deletions {
        if let Some(key) = old.section_keys.get(section) {
            removed.insert(key.clone());
        }
        removed.extend(old.rows_of(section).iter().map(AnyItem::key));
    }

    let mut rows = Vec::with_capacity(sections.indices_map.len());
    for &(before, after) in &sections.indices_map {
        let old_rows = old.rows_of(before);
        let diff = Diff::new(old_rows, new.rows_of(after));
        removed.extend(diff.deletions.iter().map(|&r| old_rows[r].key()));
        rows.push(SectionRows {
            before,
            after,
            diff,
        });
    }

    if !removed.is_empty() {
        let present: HashSet<DiffKey> = new
            .section_keys
            .iter()
            .cloned()
            .chain(new.rows.iter().flatten().map(AnyItem::key))
            .collect();
        removed.retain(|key| !present.contains(key));
    }

    trace!(
        sections = %sections,
        diffed = rows.len(),
        evicted = removed.len(),
        "reload planned"
    );
    ReloadPlan {
        sections,
        rows,
        evicted: removed.into_iter().collect(),
    }
}

impl ReloadPlan {
    /// Section and row structure changes, applied as one batch.
    pub fn structural_batch(&self, animation: RowAnimation) -> ViewBatch {
        let mut batch = ViewBatch::new();
        if !self.sections.deletions.is_empty() {
            batch.push(ViewCommand::DeleteSections {
                sections: self.sections.deletions.iter().copied().collect(),
                animation: animation.deletion,
            });
        }
        if !self.sections.insertions.is_empty() {
            batch.push(ViewCommand::InsertSections {
                sections: self.sections.insertions.iter().copied().collect(),
                animation: animation.insertion,
            });
        }
        for &(from, to) in &self.sections.moves {
            batch.push(ViewCommand::MoveSection { from, to });
        }
        for section in &self.rows {
            push_row_changes(&mut batch, &section.diff, section.before, section.after, animation);
        }
        batch
    }

    /// Content refreshes for rows whose value changed, applied after the
    /// structural batch.
    pub fn reload_batch(&self, animation: RowAnimation) -> ViewBatch {
        let rows = self
            .rows
            .iter()
            .flat_map(|section| {
                section
                    .diff
                    .updates
                    .iter()
                    .map(move |&(_, row)| IndexPath::new(section.after, row))
            })
            .collect();
        let mut batch = ViewBatch::new();
        batch.reload_rows(rows, animation.update);
        batch
    }
}

fn push_row_changes(
    batch: &mut ViewBatch,
    diff: &Diff,
    before: usize,
    after: usize,
    animation: RowAnimation,
) {
    batch.delete_rows(
        diff.deletions.iter().map(|&r| IndexPath::new(before, r)).collect(),
        animation.deletion,
    );
    batch.insert_rows(
        diff.insertions.iter().map(|&r| IndexPath::new(after, r)).collect(),
        animation.insertion,
    );
    for &(from, to) in &diff.moves {
        batch.push(ViewCommand::MoveRow {
            from: IndexPath::new(before, from),
            to: IndexPath::new(after, to),
        });
    }
}

/// Everything a single-item update must tell the view. Indices in `diff`
/// are already section-relative.
#[derive(Clone, Debug)]
pub struct SubtreePlan {
    pub section: usize,
    pub diff: Diff,
    pub evicted: Vec<DiffKey>,
}

/// Diff the rows an item's subtree used to occupy, starting at row `start`,
/// against its fresh projection.
pub fn plan_subtree(section: usize, start: usize, old: &[AnyItem], new: &[AnyItem]) -> SubtreePlan {
    let diff = Diff::new(old, new);
    let evicted = if diff.deletions.is_empty() {
        Vec::new()
    } else {
        let present: HashSet<DiffKey> = new.iter().map(AnyItem::key).collect();
        diff.deletions
            .iter()
            .map(|&r| old[r].key())
            .filter(|key| !present.contains(key))
            .collect()
    };
    trace!(section, start, diff = %diff, "subtree planned");
    SubtreePlan {
        section,
        diff: diff.shift(start),
        evicted,
    }
}

impl SubtreePlan {
    pub fn structural_batch(&self, animation: RowAnimation) -> ViewBatch {
        let mut batch = ViewBatch::new();
        push_row_changes(&mut batch, &self.diff, self.section, self.section, animation);
        batch
    }

    pub fn reload_batch(&self, animation: RowAnimation) -> ViewBatch {
        let mut batch = ViewBatch::new();
        batch.reload_rows(
            self.diff
                .updates
                .iter()
                .map(|&(_, row)| IndexPath::new(self.section, row))
                .collect(),
            animation.update,
        );
        batch
    }
}

/// Summary of one applied reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// The view was told to discard everything and reload.
    pub full_reload: bool,
    /// The request touched nothing: the item was not tracked.
    pub skipped: bool,
    pub sections_inserted: usize,
    pub sections_deleted: usize,
    pub sections_moved: usize,
    pub rows_inserted: usize,
    pub rows_deleted: usize,
    pub rows_moved: usize,
    pub rows_reloaded: usize,
    /// Arena nodes freed afterwards.
    pub nodes_freed: usize,
}

impl Reconciliation {
    pub fn full(nodes_freed: usize) -> Self {
        Self {
            full_reload: true,
            nodes_freed,
            ..Self::default()
        }
    }

    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// Returns `true` if nothing visible changed.
    pub fn is_noop(&self) -> bool {
        !self.full_reload
            && self.sections_inserted == 0
            && self.sections_deleted == 0
            && self.sections_moved == 0
            && self.rows_inserted == 0
            && self.rows_deleted == 0
            && self.rows_moved == 0
            && self.rows_reloaded == 0
    }

    fn add_rows(&mut self, diff: &Diff) {
        self.rows_inserted += diff.insertions.len();
        self.rows_deleted += diff.deletions.len();
        self.rows_moved += diff.moves.len();
        self.rows_reloaded += diff.updates.len();
    }

    pub(crate) fn from_reload(plan: &ReloadPlan, nodes_freed: usize) -> Self {
        let mut summary = Self {
            sections_inserted: plan.sections.insertions.len(),
            sections_deleted: plan.sections.deletions.len(),
            sections_moved: plan.sections.moves.len(),
            nodes_freed,
            ..Self::default()
        };
        for section in &plan.rows {
            summary.add_rows(&section.diff);
        }
        summary
    }

    pub(crate) fn from_subtree(plan: &SubtreePlan, nodes_freed: usize) -> Self {
        let mut summary = Self {
            nodes_freed,
            ..Self::default()
        };
        summary.add_rows(&plan.diff);
        summary
    }
}
