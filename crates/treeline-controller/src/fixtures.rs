//! Shared test content and delegate.

use std::sync::{Arc, Mutex};

use treeline_diff::Diffable;
use treeline_tree::{AnyItem, NodePolicy, TreeItem};
use treeline_types::IndexPath;

use crate::config::ControllerConfig;
use crate::controller::TreeController;
use crate::delegate::{MoveProposal, TreeDelegate};
use crate::recording::{RecordedCell, RecordingListView};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[derive(Clone, Debug)]
pub struct Item {
    pub text: String,
    pub children: Option<Vec<Item>>,
    pub cell: Option<&'static str>,
    pub expanded: bool,
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.children == other.children
    }
}

impl Diffable for Item {
    type Id = String;

    fn diff_identifier(&self) -> String {
        self.text.clone()
    }
}

impl TreeItem for Item {
    type Child = Item;

    fn children(&self) -> Option<&[Item]> {
        self.children.as_deref()
    }
}

pub fn leaf(text: &str) -> Item {
    Item {
        text: text.to_string(),
        children: None,
        cell: Some("Cell"),
        expanded: true,
    }
}

pub fn node(text: &str, children: Vec<Item>) -> Item {
    Item {
        children: Some(children),
        ..leaf(text)
    }
}

impl Item {
    /// No row of its own.
    pub fn hidden(mut self) -> Self {
        self.cell = None;
        self
    }

    pub fn collapsed(mut self) -> Self {
        self.expanded = false;
        self
    }

    pub fn child(&self, index: usize) -> &Item {
        &self.children.as_ref().expect("item has children")[index]
    }

    pub fn child_mut(&mut self, index: usize) -> &mut Item {
        &mut self.children.as_mut().expect("item has children")[index]
    }
}

pub fn text(item: &AnyItem) -> String {
    item.downcast_ref::<Item>()
        .map(|i| i.text.clone())
        .unwrap_or_else(|| format!("{item:?}"))
}

type MoveRule = Box<dyn Fn(&Item) -> bool>;

#[derive(Default)]
pub struct Delegate {
    pub events: Arc<Mutex<Vec<String>>>,
    pub move_rule: Option<MoveRule>,
}

impl Delegate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow drops whose new parent satisfies `rule`.
    pub fn moving_into(rule: impl Fn(&Item) -> bool + 'static) -> Self {
        Self {
            move_rule: Some(Box::new(rule)),
            ..Self::default()
        }
    }

    fn log(&self, event: String) {
        self.events.lock().expect("event log").push(event);
    }
}

impl NodePolicy for Delegate {
    fn cell_identifier(&self, item: &AnyItem) -> Option<String> {
        item.downcast_ref::<Item>()?.cell.map(str::to_string)
    }

    fn is_expandable(&self, _item: &AnyItem) -> bool {
        true
    }

    fn is_expanded(&self, item: &AnyItem) -> bool {
        item.downcast_ref::<Item>().map_or(true, |i| i.expanded)
    }
}

impl TreeDelegate<RecordedCell> for Delegate {
    fn configure(&self, cell: &mut RecordedCell, item: &AnyItem) {
        cell.text = Some(text(item));
    }

    fn did_select(&mut self, item: &AnyItem) {
        self.log(format!("select {}", text(item)));
    }

    fn did_deselect(&mut self, item: &AnyItem) {
        self.log(format!("deselect {}", text(item)));
    }

    fn did_expand(&mut self, item: &AnyItem) {
        self.log(format!("expand {}", text(item)));
    }

    fn did_collapse(&mut self, item: &AnyItem) {
        self.log(format!("collapse {}", text(item)));
    }

    fn can_move(&self, _item: &AnyItem) -> bool {
        self.move_rule.is_some()
    }

    fn can_move_to(&self, proposal: &MoveProposal<'_>) -> bool {
        let (Some(rule), Some(parent)) = (
            self.move_rule.as_ref(),
            proposal.new_parent.and_then(|p| p.downcast_ref::<Item>()),
        ) else {
            return false;
        };
        rule(parent)
    }

    fn move_item(&mut self, proposal: &MoveProposal<'_>) {
        let parent = proposal.new_parent.map(text).unwrap_or_default();
        self.log(format!(
            "move {} to {}[{}]",
            text(proposal.item),
            parent,
            proposal.to_index
        ));
    }
}

pub type Controller = TreeController<RecordingListView>;

pub fn controller(delegate: Delegate) -> Controller {
    init_tracing();
    TreeController::new(RecordingListView::new(), delegate)
}

pub fn controller_with(delegate: Delegate, config: ControllerConfig) -> Controller {
    init_tracing();
    TreeController::with_config(RecordingListView::new(), delegate, config)
}

/// Texts of every row, section after section.
pub fn texts(controller: &Controller) -> Vec<String> {
    controller.rows().iter().map(|(_, item)| text(item)).collect()
}

pub fn section_texts(controller: &Controller, section: usize) -> Vec<String> {
    controller
        .rows()
        .section(section)
        .unwrap_or_default()
        .iter()
        .map(text)
        .collect()
}

/// The view agrees with the controller, and every row's index path points
/// back at that row.
pub fn assert_consistent(controller: &Controller) {
    let view = controller.view();
    assert!(
        view.inconsistencies().is_empty(),
        "view inconsistencies: {:?}",
        view.inconsistencies()
    );
    assert_eq!(view.mirror(), controller.rows().sections(), "view mirror");
    for (path, item) in controller.rows().iter() {
        let item = item.downcast_ref::<Item>().expect("test item");
        assert_eq!(controller.index_path(item), Some(path), "index path of {}", item.text);
    }
}

pub fn ip(section: usize, row: usize) -> IndexPath {
    IndexPath::new(section, row)
}
