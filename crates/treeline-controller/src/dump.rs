//! Human-readable and JSON dumps of the controller's state.

use std::fmt::Write as _;

use serde::Serialize;
use treeline_tree::NodeId;
use treeline_types::IndexPath;

use crate::controller::TreeController;
use crate::error::ControllerResult;
use crate::view::ListView;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RowSnapshot {
    pub item: String,
    pub cell_identifier: Option<String>,
    pub indentation: usize,
    /// `None` unless the row is expandable.
    pub expanded: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SectionSnapshot {
    pub root: String,
    pub rows: Vec<RowSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub loaded: bool,
    pub live_nodes: usize,
    pub tracked_identities: usize,
    pub sections: Vec<SectionSnapshot>,
}

impl<V: ListView> TreeController<V> {
    pub fn snapshot(&self) -> ControllerSnapshot {
        let sections = self
            .sections
            .iter()
            .zip(self.rows.sections())
            .enumerate()
            .map(|(section, (&root, rows))| SectionSnapshot {
                root: self
                    .arena
                    .get(root)
                    .map(|node| format!("{:?}", node.item()))
                    .unwrap_or_default(),
                rows: rows
                    .iter()
                    .enumerate()
                    .map(|(row, item)| {
                        let state = self
                            .row_state(IndexPath::new(section, row))
                            .unwrap_or_default();
                        RowSnapshot {
                            item: format!("{item:?}"),
                            cell_identifier: state.cell_identifier,
                            indentation: state.indentation,
                            expanded: state.expanded,
                        }
                    })
                    .collect(),
            })
            .collect();
        ControllerSnapshot {
            loaded: self.loaded,
            live_nodes: self.arena.len(),
            tracked_identities: self.arena.tracked(),
            sections,
        }
    }

    pub fn snapshot_json(&self) -> ControllerResult<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Indented outline of every materialized node, section by section.
    /// Collapsed nodes are marked `+`, expanded expandable nodes `-`, and
    /// containers without a row of their own are shown in brackets.
    pub fn debug_description(&self) -> String {
        let mut out = String::new();
        for (section, &root) in self.sections.iter().enumerate() {
            let _ = writeln!(out, "section {section}");
            self.describe(root, 1, &mut out);
        }
        out
    }

    fn describe(&self, id: NodeId, depth: usize, out: &mut String) {
        let mut stack = vec![(id, depth)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.arena.get(id) else {
                continue;
            };
            let marker = match (node.is_expandable(), node.is_expanded()) {
                (true, true) => "- ",
                (true, false) => "+ ",
                _ => "",
            };
            let indent = "  ".repeat(depth);
            let _ = if node.is_rendered() {
                writeln!(out, "{indent}{marker}{:?}", node.item())
            } else {
                writeln!(out, "{indent}[{:?}]", node.item())
            };
            if let Some(children) = node.materialized_children() {
                stack.extend(children.iter().rev().map(|&c| (c, depth + 1)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use treeline_types::RowAnimation;

    fn loaded() -> Controller {
        let mut c = controller(Delegate::new());
        let data = vec![
            node("A", vec![node("A1", vec![leaf("A1_1")]).collapsed(), leaf("A2")]),
            node("B", vec![leaf("B1")]).hidden(),
        ];
        c.reload_data(&data, RowAnimation::NONE).unwrap();
        c
    }

    #[test]
    fn snapshot_describes_rows() {
        let c = loaded();
        let snapshot = c.snapshot();
        assert!(snapshot.loaded);
        assert_eq!(snapshot.sections.len(), 2);
        let rows = &snapshot.sections[0].rows;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].indentation, 1);
        assert_eq!(rows[1].expanded, Some(false));
        assert_eq!(rows[1].cell_identifier.as_deref(), Some("Cell"));
        assert_eq!(snapshot.sections[1].rows[0].indentation, 0);
        assert_eq!(snapshot.live_nodes, c.arena().len());

        let json: serde_json::Value = serde_json::from_str(&c.snapshot_json().unwrap()).unwrap();
        assert_eq!(json["sections"][0]["rows"][1]["expanded"], false);
    }

    #[test]
    fn outline_marks_expansion_and_containers() {
        let c = loaded();
        let outline = c.debug_description();
        let lines: Vec<&str> = outline.lines().collect();
        assert_eq!(lines[0], "section 0");
        assert!(lines[1].trim_start().starts_with("- "));
        assert!(lines[2].trim_start().starts_with("+ "));
        assert!(outline.contains("section 1"));
        assert!(lines.iter().any(|l| l.trim_start().starts_with('[')));
    }
}
