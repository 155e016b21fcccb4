//! Background reconciliation.
//!
//! The arena is only ever touched on the owner's side. A job captures
//! immutable before/after row snapshots, computes the diff on tokio's
//! blocking pool, and hands the plan back over a oneshot channel; the owner
//! applies it from [`TreeController::poll_background`] or
//! [`TreeController::settle`]. At most one job runs at a time.
//!
//! Preparing a job already writes the new content into the arena. Until the
//! job lands, row queries answer from the presentation captured at launch so
//! they agree with the rows the view shows.

use std::ops::Range;

use tokio::sync::oneshot;
use tracing::{debug, warn};
use treeline_tree::{AnyItem, NodeId, TreeItem};
use treeline_types::{IndexPath, RowAnimation};

use crate::config::OverlapPolicy;
use crate::controller::{PreparedSubtree, RowState, SubtreeStep, TreeController};
use crate::error::{ControllerError, ControllerResult};
use crate::reconcile::{plan_reload, plan_subtree, Reconciliation, ReloadPlan, SubtreePlan};
use crate::view::ListView;

/// What happened to a submitted request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    /// Applied synchronously, without a background job.
    Applied(Reconciliation),
    /// A background job was started.
    Started(u64),
    /// Parked until the in-flight job lands.
    Queued,
    Dropped,
}

#[derive(Debug)]
pub(crate) enum Request {
    Reload {
        content: Vec<AnyItem>,
        root: Option<AnyItem>,
        animation: RowAnimation,
    },
    Update {
        item: AnyItem,
        animation: RowAnimation,
    },
}

/// A finished plan together with the prepared state it applies to.
pub(crate) enum Landed {
    Reload {
        sections: Vec<NodeId>,
        rows: Vec<Vec<AnyItem>>,
        root: Option<AnyItem>,
        plan: ReloadPlan,
        animation: RowAnimation,
    },
    Subtree {
        section: usize,
        range: Range<usize>,
        rows: Vec<AnyItem>,
        plan: SubtreePlan,
        animation: RowAnimation,
    },
}

pub(crate) struct InFlight {
    ticket: u64,
    receiver: oneshot::Receiver<Landed>,
}

#[derive(Default)]
pub(crate) struct BackgroundSlot {
    in_flight: Option<InFlight>,
    pending: Option<Request>,
    next_ticket: u64,
    /// Row presentation captured when the in-flight job started.
    frozen: Option<Vec<Vec<RowState>>>,
}

impl BackgroundSlot {
    pub(crate) fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub(crate) fn frozen(&self) -> Option<&[Vec<RowState>]> {
        self.in_flight.as_ref().and(self.frozen.as_deref())
    }

    pub(crate) fn record_row_height(&mut self, index_path: IndexPath, height: f64) {
        let row = self
            .frozen
            .as_mut()
            .and_then(|frozen| frozen.get_mut(index_path.section))
            .and_then(|section| section.get_mut(index_path.row));
        if let Some(row) = row {
            row.estimated_row_height = Some(height);
        }
    }

    fn finish(&mut self) {
        self.in_flight = None;
        self.frozen = None;
    }
}

/// Run `job` on the blocking pool if a runtime is available, inline
/// otherwise.
fn spawn_plan<F>(job: F) -> oneshot::Receiver<Landed>
where
    F: FnOnce() -> Landed + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let run = move || {
        // The receiver is gone only if the controller was dropped.
        let _ = tx.send(job());
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(run);
        }
        Err(_) => run(),
    }
    rx
}

impl<V: ListView> TreeController<V> {
    /// Whether a background job is in flight.
    pub fn is_reconciling(&self) -> bool {
        self.background.is_busy()
    }

    /// Background counterpart of [`TreeController::reload_data`].
    pub fn begin_reload<T: TreeItem>(
        &mut self,
        content: &[T],
        animation: RowAnimation,
    ) -> ControllerResult<Submission> {
        self.submit(Request::Reload {
            content: content.iter().cloned().map(AnyItem::new).collect(),
            root: None,
            animation,
        })
    }

    /// Background counterpart of [`TreeController::reload_data_from`].
    pub fn begin_reload_from<T: TreeItem>(
        &mut self,
        root: &T,
        animation: RowAnimation,
    ) -> ControllerResult<Submission> {
        let root = AnyItem::new(root.clone());
        self.submit(Request::Reload {
            content: root.children().unwrap_or_default(),
            root: Some(root),
            animation,
        })
    }

    /// Background counterpart of [`TreeController::update_contents_of`].
    pub fn begin_update<T: TreeItem>(
        &mut self,
        item: &T,
        animation: RowAnimation,
    ) -> ControllerResult<Submission> {
        self.submit(Request::Update {
            item: AnyItem::new(item.clone()),
            animation,
        })
    }

    /// Reload with the configured animation, in the background if the
    /// configuration asks for it.
    pub fn submit_reload<T: TreeItem>(&mut self, content: &[T]) -> ControllerResult<Submission> {
        let animation = self.config.animation;
        if self.config.concurrent {
            self.begin_reload(content, animation)
        } else {
            self.reload_data(content, animation).map(Submission::Applied)
        }
    }

    /// Update one item with the configured animation, in the background if
    /// the configuration asks for it.
    pub fn submit_update<T: TreeItem>(&mut self, item: &T) -> ControllerResult<Submission> {
        let animation = self.config.animation;
        if self.config.concurrent {
            self.begin_update(item, animation)
        } else {
            self.update_contents_of(item, animation).map(Submission::Applied)
        }
    }

    fn submit(&mut self, request: Request) -> ControllerResult<Submission> {
        if !self.background.is_busy() {
            return self.start(request);
        }
        match self.config.overlap {
            OverlapPolicy::Queue => {
                if let Some(superseded) = self.background.pending.replace(request) {
                    debug!(?superseded, "pending reconciliation superseded");
                }
                Ok(Submission::Queued)
            }
            OverlapPolicy::Drop => {
                warn!(?request, "reconciliation dropped while another is in flight");
                Ok(Submission::Dropped)
            }
        }
    }

    fn start(&mut self, request: Request) -> ControllerResult<Submission> {
        self.last_move = None;
        match request {
            Request::Reload {
                content,
                root,
                animation,
            } => {
                if animation.is_none() {
                    let summary = self.reload_items(content, animation)?;
                    self.root = root;
                    return Ok(Submission::Applied(summary));
                }
                let old = self.snapshot_sections();
                let frozen = self.freeze_rows();
                let (sections, new) = self.materialize_sections(content)?;
                self.background.frozen = Some(frozen);
                Ok(self.launch(move || {
                    let plan = plan_reload(&old, &new);
                    Landed::Reload {
                        sections,
                        rows: new.rows,
                        root,
                        plan,
                        animation,
                    }
                }))
            }
            Request::Update { item, animation } => {
                if self.is_root(&item) {
                    return self.start(Request::Reload {
                        content: item.children().unwrap_or_default(),
                        root: Some(item),
                        animation,
                    });
                }
                let frozen = self.freeze_rows();
                let prepared = match self.prepare_subtree(item)? {
                    SubtreeStep::Skipped => return Ok(Submission::Applied(Reconciliation::skipped())),
                    SubtreeStep::Hidden => return Ok(Submission::Applied(Reconciliation::default())),
                    SubtreeStep::Ready(prepared) => prepared,
                };
                if animation.is_none() {
                    return self.apply_subtree_unanimated(prepared).map(Submission::Applied);
                }
                let Some(old) = self.subtree_rows(&prepared) else {
                    return self.resync().map(Submission::Applied);
                };
                let PreparedSubtree {
                    section,
                    range,
                    rows,
                } = prepared;
                self.background.frozen = Some(frozen);
                Ok(self.launch(move || {
                    let plan = plan_subtree(section, range.start, &old, &rows);
                    Landed::Subtree {
                        section,
                        range,
                        rows,
                        plan,
                        animation,
                    }
                }))
            }
        }
    }

    fn launch<F>(&mut self, job: F) -> Submission
    where
        F: FnOnce() -> Landed + Send + 'static,
    {
        self.background.next_ticket += 1;
        let ticket = self.background.next_ticket;
        self.background.in_flight = Some(InFlight {
            ticket,
            receiver: spawn_plan(job),
        });
        debug!(ticket, "background reconciliation started");
        Submission::Started(ticket)
    }

    fn land(&mut self, landed: Landed) -> Reconciliation {
        match landed {
            Landed::Reload {
                sections,
                rows,
                root,
                plan,
                animation,
            } => {
                let summary = self.apply_reload(sections, rows, plan, animation);
                self.root = root;
                summary
            }
            Landed::Subtree {
                section,
                range,
                rows,
                plan,
                animation,
            } => self.apply_subtree(
                PreparedSubtree {
                    section,
                    range,
                    rows,
                },
                plan,
                animation,
            ),
        }
    }

    /// The worker vanished without a result; the arena already holds the
    /// new content, so rebuild the rows from it.
    fn abandon(&mut self, ticket: u64) -> ControllerError {
        self.background.finish();
        if let Err(err) = self.resync() {
            warn!(%err, "resync after failed job");
        }
        ControllerError::Background(format!("job {ticket} ended without a result"))
    }

    fn start_pending(&mut self) -> ControllerResult<Option<Reconciliation>> {
        let Some(request) = self.background.pending.take() else {
            return Ok(None);
        };
        match self.start(request)? {
            Submission::Applied(summary) => Ok(Some(summary)),
            _ => Ok(None),
        }
    }

    /// Apply the in-flight job's result if it is ready, then start the
    /// pending request, if any. Returns the applied summary.
    pub fn poll_background(&mut self) -> ControllerResult<Option<Reconciliation>> {
        let Some(in_flight) = self.background.in_flight.as_mut() else {
            return Ok(None);
        };
        let ticket = in_flight.ticket;
        match in_flight.receiver.try_recv() {
            Ok(landed) => {
                self.background.finish();
                let summary = self.land(landed);
                debug!(ticket, "background reconciliation applied");
                self.start_pending()?;
                Ok(Some(summary))
            }
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => Err(self.abandon(ticket)),
        }
    }

    /// Wait for every in-flight and pending job and apply them in order.
    pub async fn settle(&mut self) -> ControllerResult<Vec<Reconciliation>> {
        let mut applied = Vec::new();
        while let Some(in_flight) = self.background.in_flight.as_mut() {
            let ticket = in_flight.ticket;
            let result = (&mut in_flight.receiver).await;
            match result {
                Ok(landed) => {
                    self.background.finish();
                    applied.push(self.land(landed));
                    debug!(ticket, "background reconciliation applied");
                    if let Some(summary) = self.start_pending()? {
                        applied.push(summary);
                    }
                }
                Err(_) => return Err(self.abandon(ticket)),
            }
        }
        Ok(applied)
    }
}
