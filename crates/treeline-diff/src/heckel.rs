//! Heckel's diff: six linear passes over a shared symbol table, then a
//! finalization step that classifies every position.
//!
//! Duplicate identifiers are matched to the first available old position.
//! A matched pair is never also reported as an insertion or deletion.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tracing::trace;

use crate::diffable::Diffable;

/// Result of comparing two sequences.
///
/// All indices are 0-based. Deletions and move sources refer to the old
/// sequence; insertions and move destinations refer to the new one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diff {
    /// New positions with no counterpart in the old sequence.
    pub insertions: BTreeSet<usize>,
    /// Old positions with no counterpart in the new sequence.
    pub deletions: BTreeSet<usize>,
    /// Matched pairs `(old, new)` whose relative position changed.
    pub moves: Vec<(usize, usize)>,
    /// Matched pairs `(old, new)` whose values differ.
    pub updates: Vec<(usize, usize)>,
    /// Every matched pair `(old, new)`, in new-sequence order.
    pub indices_map: Vec<(usize, usize)>,
}

/// A single step of the replay-ordered edit script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Remove the element at this old-coordinate index.
    Delete(usize),
    /// Insert the new element at this new-coordinate index.
    Insert(usize),
}

#[derive(Default)]
struct Symbol {
    old_count: usize,
    new_count: usize,
    old_positions: BTreeSet<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Entry {
    Symbol(usize),
    Index(usize),
}

impl Diff {
    /// Compare `old` against `new`.
    pub fn new<T: Diffable>(old: &[T], new: &[T]) -> Self {
        let mut keys: HashMap<T::Id, usize> = HashMap::new();
        let mut table: Vec<Symbol> = Vec::new();

        let mut symbol_for = |item: &T| -> usize {
            let next = table.len();
            let slot = *keys.entry(item.diff_identifier()).or_insert(next);
            if slot == next {
                table.push(Symbol::default());
            }
            slot
        };

        // Register symbols first, count occurrences below.
        let new_symbols: Vec<usize> = new.iter().map(&mut symbol_for).collect();
        let old_symbols: Vec<usize> = old.iter().map(&mut symbol_for).collect();

        let mut na: Vec<Entry> = Vec::with_capacity(new.len());
        for &s in &new_symbols {
            table[s].new_count += 1;
            na.push(Entry::Symbol(s));
        }

        let mut oa: Vec<Entry> = Vec::with_capacity(old.len());
        for (i, &s) in old_symbols.iter().enumerate() {
            table[s].old_count += 1;
            table[s].old_positions.insert(i);
            oa.push(Entry::Symbol(s));
        }

        // Pass 3: unique on both sides.
        for i in 0..na.len() {
            let Entry::Symbol(s) = na[i] else { continue };
            let symbol = &mut table[s];
            if symbol.new_count == 1 && symbol.old_count == 1 {
                if let Some(j) = symbol.old_positions.pop_first() {
                    na[i] = Entry::Index(j);
                    oa[j] = Entry::Index(i);
                }
            }
        }

        // Pass 4: extend matched runs forward.
        let mut i = 0;
        while i + 1 < na.len() {
            if let Entry::Index(j) = na[i] {
                if j + 1 < oa.len() {
                    if let (Entry::Symbol(a), Entry::Symbol(b)) = (na[i + 1], oa[j + 1]) {
                        if a == b {
                            na[i + 1] = Entry::Index(j + 1);
                            oa[j + 1] = Entry::Index(i + 1);
                            table[a].old_positions.remove(&(j + 1));
                        }
                    }
                }
            }
            i += 1;
        }

        // Pass 5: extend matched runs backward.
        let mut i = na.len().saturating_sub(1);
        while i > 0 {
            if let Entry::Index(j) = na[i] {
                if j > 0 {
                    if let (Entry::Symbol(a), Entry::Symbol(b)) = (na[i - 1], oa[j - 1]) {
                        if a == b {
                            na[i - 1] = Entry::Index(j - 1);
                            oa[j - 1] = Entry::Index(i - 1);
                            table[a].old_positions.remove(&(j - 1));
                        }
                    }
                }
            }
            i -= 1;
        }

        // Pass 6: remaining duplicates, first available old position wins.
        for i in 0..na.len() {
            let Entry::Symbol(s) = na[i] else { continue };
            let symbol = &mut table[s];
            if symbol.new_count != 0 && symbol.old_count != 0 {
                if let Some(j) = symbol.old_positions.pop_first() {
                    na[i] = Entry::Index(j);
                    oa[j] = Entry::Index(i);
                }
            }
        }

        let mut diff = Diff::default();

        let mut delete_offsets = vec![0usize; oa.len()];
        let mut running = 0;
        for (i, entry) in oa.iter().enumerate() {
            delete_offsets[i] = running;
            if let Entry::Symbol(_) = entry {
                diff.deletions.insert(i);
                running += 1;
            }
        }

        let mut running_inserts = 0;
        for (i, entry) in na.iter().enumerate() {
            match *entry {
                Entry::Symbol(_) => {
                    diff.insertions.insert(i);
                    running_inserts += 1;
                }
                Entry::Index(oi) => {
                    diff.indices_map.push((oi, i));
                    if old[oi] != new[i] {
                        diff.updates.push((oi, i));
                    }
                    if oi - delete_offsets[oi] + running_inserts != i {
                        diff.moves.push((oi, i));
                    }
                }
            }
        }

        trace!(
            old = old.len(),
            new = new.len(),
            insertions = diff.insertions.len(),
            deletions = diff.deletions.len(),
            moves = diff.moves.len(),
            updates = diff.updates.len(),
            "heckel diff"
        );

        diff
    }

    /// Returns `true` if nothing changed at all.
    pub fn is_empty(&self) -> bool {
        !self.has_structural_changes() && self.updates.is_empty()
    }

    /// Returns `true` if any insertion, deletion or move is present.
    pub fn has_structural_changes(&self) -> bool {
        !self.insertions.is_empty() || !self.deletions.is_empty() || !self.moves.is_empty()
    }

    /// Offset every index by `by`.
    ///
    /// Used when a diff computed over a sub-range is replayed against the full
    /// sequence that contains it.
    pub fn shift(&self, by: usize) -> Diff {
        let pair = |&(o, n): &(usize, usize)| (o + by, n + by);
        Diff {
            insertions: self.insertions.iter().map(|i| i + by).collect(),
            deletions: self.deletions.iter().map(|i| i + by).collect(),
            moves: self.moves.iter().map(pair).collect(),
            updates: self.updates.iter().map(pair).collect(),
            indices_map: self.indices_map.iter().map(pair).collect(),
        }
    }

    /// The edit script in replay order: deletions and move sources from the
    /// highest index down, then insertions and move destinations from the
    /// lowest index up.
    pub fn ordered_operations(&self) -> Vec<Operation> {
        let removed: BTreeSet<usize> = self
            .deletions
            .iter()
            .copied()
            .chain(self.moves.iter().map(|&(o, _)| o))
            .collect();
        let inserted: BTreeSet<usize> = self
            .insertions
            .iter()
            .copied()
            .chain(self.moves.iter().map(|&(_, n)| n))
            .collect();

        removed
            .into_iter()
            .rev()
            .map(Operation::Delete)
            .chain(inserted.into_iter().map(Operation::Insert))
            .collect()
    }

    /// Replay this diff against `old`, taking inserted and updated values
    /// from `new`. For a diff produced by `Diff::new(old, new)` the result
    /// equals `new`.
    pub fn apply<T: Clone>(&self, old: &[T], new: &[T]) -> Vec<T> {
        let mut out = old.to_vec();
        for op in self.ordered_operations() {
            match op {
                Operation::Delete(i) => {
                    out.remove(i);
                }
                Operation::Insert(i) => out.insert(i, new[i].clone()),
            }
        }
        for &(_, n) in &self.updates {
            out[n] = new[n].clone();
        }
        out
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deletions: {:?}, insertions: {:?}, moves: {:?}, updates: {:?}",
            self.deletions, self.insertions, self.moves, self.updates
        )
    }
}
