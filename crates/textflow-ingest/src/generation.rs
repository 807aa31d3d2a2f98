//! Selection generations and the caller-owned dataset state.
//!
//! Every picker interaction starts a new generation. Reads belonging to an
//! older generation are cancelled, and anything they still produce is
//! discarded instead of overwriting the newer selection's result.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::merge::merge_contents;
use crate::reader::read_all;
use crate::selection::Selection;
use crate::{IngestError, IngestOptions, IngestionResult};

/// Monotonic selection counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle held by one in-flight ingestion.
#[derive(Debug, Clone)]
pub struct SelectionTicket {
    generation: Generation,
    cancel: CancellationToken,
    current: Arc<AtomicU64>,
}

impl SelectionTicket {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// False once a newer selection was started or the tracker was invalidated.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation.0
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Issues [`SelectionTicket`]s. Clones share the same counter, so a clone
/// can be handed to a signal handler to cancel the active selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    current: Arc<AtomicU64>,
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, cancelling the previous one.
    pub fn begin(&self) -> SelectionTicket {
        let cancel = CancellationToken::new();
        let generation = Generation(self.current.fetch_add(1, Ordering::SeqCst) + 1);
        self.replace_active(Some(cancel.clone()));
        tracing::debug!(%generation, "selection started");
        SelectionTicket {
            generation,
            cancel,
            current: Arc::clone(&self.current),
        }
    }

    /// Supersede the active generation without starting a new one.
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
        self.replace_active(None);
    }

    fn replace_active(&self, next: Option<CancellationToken>) {
        let previous = match self.active.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        };
        if let Some(token) = previous {
            token.cancel();
        }
    }
}

/// Ingest `selection` with no generation tracking.
pub async fn ingest(
    selection: &Selection,
    options: &IngestOptions,
) -> Result<IngestionResult, IngestError> {
    let tracker = SelectionTracker::new();
    ingest_tracked(selection, &tracker.begin(), options).await
}

/// Ingest `selection` on behalf of `ticket`.
///
/// Fails with [`IngestError::Superseded`] if the ticket goes stale before
/// the merge completes, so a stale result is never returned as success.
pub async fn ingest_tracked(
    selection: &Selection,
    ticket: &SelectionTicket,
    options: &IngestOptions,
) -> Result<IngestionResult, IngestError> {
    let superseded = || IngestError::Superseded {
        generation: ticket.generation(),
    };
    if !ticket.is_current() {
        return Err(superseded());
    }

    selection.validate()?;
    let accepted = selection.accepted();
    let skipped = selection.skipped_names();
    if !skipped.is_empty() {
        tracing::debug!(?skipped, "ignoring non-CSV files");
    }

    let Some(contents) = read_all(&accepted, options.read_timeout, ticket.cancel_token()).await?
    else {
        tracing::warn!(generation = %ticket.generation(), "selection cancelled during reads");
        return Err(superseded());
    };
    if !ticket.is_current() {
        tracing::warn!(generation = %ticket.generation(), "discarding stale ingestion result");
        return Err(superseded());
    }

    let sources = accepted.iter().map(|f| f.name.clone()).collect();
    let result = merge_contents(sources, &contents);
    tracing::info!(
        generation = %ticket.generation(),
        files = result.file_count(),
        rows = result.total_rows,
        "ingestion complete"
    );
    Ok(result)
}

/// Dataset held between picker interactions and submission.
///
/// A new selection only replaces the committed one once its ingestion
/// succeeds. Failed or stale ingestions leave the previous dataset intact.
#[derive(Debug, Default)]
pub struct DatasetState {
    tracker: SelectionTracker,
    committed: Option<(Selection, IngestionResult)>,
    generation: Option<Generation>,
    pending: Option<(Generation, Selection)>,
}

impl DatasetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the generation counter.
    pub fn tracker(&self) -> SelectionTracker {
        self.tracker.clone()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.committed.as_ref().map(|(s, _)| s)
    }

    pub fn result(&self) -> Option<&IngestionResult> {
        self.committed.as_ref().map(|(_, r)| r)
    }

    /// Generation of the committed dataset.
    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }

    pub fn pending_selection(&self) -> Option<&Selection> {
        self.pending.as_ref().map(|(_, s)| s)
    }

    /// Start ingesting `selection`. Superseding any pending one, it returns
    /// the ticket to pass to [`ingest_tracked`] and [`DatasetState::apply`].
    ///
    /// A selection with no CSV file is rejected without touching any state.
    pub fn select(&mut self, selection: Selection) -> Result<SelectionTicket, IngestError> {
        selection.validate()?;
        let ticket = self.tracker.begin();
        self.pending = Some((ticket.generation(), selection));
        Ok(ticket)
    }

    /// Drop the committed dataset and cancel anything pending.
    pub fn clear(&mut self) {
        self.tracker.invalidate();
        self.committed = None;
        self.generation = None;
        self.pending = None;
    }

    /// Accept the outcome of the ingestion started for `ticket`.
    ///
    /// Returns `Ok(true)` when the result was committed, `Ok(false)` when it
    /// was stale and dropped, and the error otherwise.
    pub fn apply(
        &mut self,
        ticket: &SelectionTicket,
        outcome: Result<IngestionResult, IngestError>,
    ) -> Result<bool, IngestError> {
        let is_pending = matches!(&self.pending, Some((g, _)) if *g == ticket.generation());
        if !ticket.is_current() || !is_pending {
            tracing::warn!(generation = %ticket.generation(), "ignoring superseded ingestion");
            if is_pending {
                self.pending = None;
            }
            return Ok(false);
        }

        match outcome {
            Ok(result) => {
                if let Some((generation, selection)) = self.pending.take() {
                    self.committed = Some((selection, result));
                    self.generation = Some(generation);
                }
                Ok(true)
            }
            Err(e) if e.is_superseded() => {
                self.pending = None;
                Ok(false)
            }
            Err(e) => {
                self.pending = None;
                Err(e)
            }
        }
    }

    /// Select, ingest and apply in one step.
    pub async fn load(
        &mut self,
        selection: Selection,
        options: &IngestOptions,
    ) -> Result<bool, IngestError> {
        let ticket = self.select(selection)?;
        let outcome = match self.pending_selection() {
            Some(selection) => ingest_tracked(selection, &ticket, options).await,
            None => Err(IngestError::Superseded {
                generation: ticket.generation(),
            }),
        };
        self.apply(&ticket, outcome)
    }
}
