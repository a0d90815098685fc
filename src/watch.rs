use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::client::RatingsClient;
use crate::error::EnrichError;
use crate::models::FetchOutcome;
use crate::normalize;
use crate::page::{CellId, PageDocument, SubtreeId};
use crate::render;
use crate::resolve;

/// Subtree ids newly inserted into the document. Repeats and already-seen
/// ids are allowed; the claimed set sorts them out.
pub type MutationBatch = Vec<SubtreeId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Keep consuming batches until the channel closes.
    Continuous,
    /// Disconnect after the first batch that yields a matching row.
    OneShot,
}

pub struct Enricher {
    pub client: RatingsClient,
    pub institution: String,
}

pub struct MutationWatcher {
    doc: Rc<RefCell<PageDocument>>,
    enricher: Rc<Enricher>,
    mode: WatchMode,
    claimed: HashSet<CellId>,
    started: bool,
}

impl MutationWatcher {
    pub fn new(doc: Rc<RefCell<PageDocument>>, enricher: Rc<Enricher>, mode: WatchMode) -> Self {
        Self {
            doc,
            enricher,
            mode,
            claimed: HashSet::new(),
            started: false,
        }
    }

    /// Begins observing. Rows already present count as the first batch.
    /// Calling again on a started watcher does nothing.
    pub async fn start(&mut self, mut batches: UnboundedReceiver<MutationBatch>) {
        if self.started {
            return;
        }
        self.started = true;

        let initial = self.doc.borrow().subtree_ids();
        if self.process_batch(&initial) > 0 && self.mode == WatchMode::OneShot {
            return;
        }
        while let Some(batch) = batches.recv().await {
            if self.process_batch(&batch) > 0 && self.mode == WatchMode::OneShot {
                return;
            }
        }
    }

    /// Scans the named subtrees only, claims unseen instructor cells, and
    /// spawns one detached enrichment task per claimed cell with a name.
    /// Returns how many rows were newly claimed.
    fn process_batch(&mut self, batch: &[SubtreeId]) -> usize {
        {
            // entries for rows the page discarded will never be revisited
            let doc = self.doc.borrow();
            self.claimed.retain(|id| doc.cell_exists(*id));
        }

        let mut matched = 0usize;
        for &subtree in batch {
            let cells = match self.doc.borrow_mut().instructor_cells(subtree) {
                Ok(cells) => cells,
                Err(err) => {
                    warn!("row scan failed: {err}");
                    continue;
                }
            };
            for cell in cells {
                if !self.claimed.insert(cell) {
                    continue;
                }
                matched += 1;

                let raw = self.doc.borrow().cell_text(cell);
                let Some(raw) = raw else {
                    debug!(cell, "claimed instructor cell without a name link");
                    continue;
                };

                let doc = Rc::clone(&self.doc);
                let enricher = Rc::clone(&self.enricher);
                tokio::task::spawn_local(async move {
                    enrich_row(doc, enricher, cell, raw).await;
                });
            }
        }
        matched
    }
}

/// One row's fire-and-forget pipeline. Every failure is row-local.
async fn enrich_row(
    doc: Rc<RefCell<PageDocument>>,
    enricher: Rc<Enricher>,
    cell: CellId,
    raw: String,
) {
    match run_pipeline(&doc, &enricher, cell, &raw).await {
        Ok(()) => debug!(cell, "row enriched"),
        Err(EnrichError::TargetGone) => {}
        Err(err @ EnrichError::NameParseEmpty) => debug!(cell, "{err}"),
        Err(err @ EnrichError::NoMatch { .. }) => info!(cell, "{err}"),
        Err(err) => error!(cell, "{err}"),
    }
}

async fn run_pipeline(
    doc: &Rc<RefCell<PageDocument>>,
    enricher: &Enricher,
    cell: CellId,
    raw: &str,
) -> Result<(), EnrichError> {
    let name = normalize::canonical_name(raw).ok_or(EnrichError::NameParseEmpty)?;

    let records = match enricher.client.fetch(&name).await {
        FetchOutcome::Success(records) => records,
        FetchOutcome::NotFound => {
            return Err(EnrichError::NoMatch {
                name: name.query().to_string(),
                institution: enricher.institution.clone(),
            })
        }
        FetchOutcome::TransportError(detail) => return Err(EnrichError::Transport(detail)),
        FetchOutcome::ServiceError { status, detail } => {
            return Err(EnrichError::Service { status, detail })
        }
    };

    let record = resolve::resolve(&records, &enricher.institution).ok_or_else(|| {
        EnrichError::NoMatch {
            name: name.query().to_string(),
            institution: enricher.institution.clone(),
        }
    })?;

    render::mount(&mut doc.borrow_mut(), cell, record)
}
