//! Background index builds and the per-document index swap.
//!
//! A [`DocumentIndexer`] owns the only writer: it builds a fresh
//! [`SearchFacade`] on its own thread and hands it back whole. The
//! [`SearchSession`] publishes finished facades behind an `Arc`, so readers
//! never observe a half-built index and never block on a build.
//!
//! Every load bumps the session generation. A build for an older generation
//! stops after its current batch and is never installed.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::RwLock;

use crate::config::Settings;
use crate::error::{SearchError, SearchResult};
use crate::search::facade::{BatchReport, SearchFacade, SearchHit};
use crate::search::payload::Embeddable;
use crate::vector::EmbeddingGenerator;

/// Progress notifications from a [`DocumentIndexer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// Records embedded so far, inserted or skipped
    Progress {
        generation: u64,
        indexed: usize,
        total: usize,
    },
    /// The facade is built and waiting to be installed
    Ready {
        generation: u64,
        inserted: usize,
        skipped: usize,
    },
    /// A newer load superseded this build
    Cancelled { generation: u64 },
}

/// Holds the searchable index of the current document, if any.
#[derive(Debug)]
pub struct SearchSession<P> {
    current: RwLock<Option<Arc<SearchFacade<P>>>>,
    generation: Arc<AtomicU64>,
}

impl<P> Default for SearchSession<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> SearchSession<P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts a new document: drops the current index and returns the
    /// generation the replacement must be installed under.
    pub fn begin_load(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *self.current.write() = None;
        tracing::debug!(generation, "document load started");
        generation
    }

    /// Publishes a finished facade.
    ///
    /// # Returns
    /// `false` when `generation` is stale; the facade is dropped.
    pub fn install(&self, generation: u64, facade: SearchFacade<P>) -> bool {
        let mut current = self.current.write();
        let latest = self.generation.load(Ordering::Acquire);
        if generation != latest {
            tracing::warn!(generation, latest, "discarding index for superseded load");
            return false;
        }

        tracing::info!(generation, count = facade.len(), "index installed");
        *current = Some(Arc::new(facade));
        true
    }

    /// Runs a query against the installed index. Empty while none is ready.
    pub fn query(&self, vector: &[f32], top_n: usize) -> SearchResult<Vec<SearchHit<P>>>
    where
        P: Clone,
    {
        match self.facade() {
            Some(facade) => Ok(facade.query(vector, top_n)?),
            None => Ok(Vec::new()),
        }
    }

    /// Embeds `text` and queries the installed index.
    pub fn query_text(
        &self,
        generator: &dyn EmbeddingGenerator,
        text: &str,
        top_n: usize,
    ) -> SearchResult<Vec<SearchHit<P>>>
    where
        P: Clone + Embeddable,
    {
        match self.facade() {
            Some(facade) => Ok(facade.query_text(generator, text, top_n)?),
            None => Ok(Vec::new()),
        }
    }

    /// The installed facade. Holding it keeps that index alive across swaps.
    #[must_use]
    pub fn facade(&self) -> Option<Arc<SearchFacade<P>>> {
        self.current.read().clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Single-writer build of one document's index on a dedicated thread.
pub struct DocumentIndexer<P> {
    generation: u64,
    events: Receiver<IndexEvent>,
    handle: JoinHandle<SearchResult<SearchFacade<P>>>,
}

impl<P> DocumentIndexer<P>
where
    P: Embeddable + Send + Sync + 'static,
{
    /// Starts a load on `session` and builds its index in the background.
    ///
    /// # Errors
    /// `Spawn` if the worker thread cannot be started.
    pub fn spawn(
        session: &SearchSession<P>,
        settings: Settings,
        generator: Arc<dyn EmbeddingGenerator>,
        payloads: Vec<P>,
    ) -> SearchResult<Self> {
        let generation = session.begin_load();
        let latest = Arc::clone(&session.generation);
        let (sender, events) = unbounded();

        let handle = std::thread::Builder::new()
            .name(format!("semdex-indexer-{generation}"))
            .spawn(move || {
                build(
                    &settings,
                    generator.as_ref(),
                    payloads,
                    generation,
                    &latest,
                    &sender,
                )
            })?;

        Ok(Self {
            generation,
            events,
            handle,
        })
    }
}

impl<P> DocumentIndexer<P> {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stream of progress events. Disconnects when the worker exits.
    #[must_use]
    pub fn events(&self) -> &Receiver<IndexEvent> {
        &self.events
    }

    /// Blocks until the worker finishes and returns the built facade.
    ///
    /// # Errors
    /// `Cancelled` if a newer load superseded this one, `IndexerDisconnected`
    /// if the worker panicked, or the error that stopped the build.
    pub fn wait(self) -> SearchResult<SearchFacade<P>> {
        self.handle
            .join()
            .map_err(|_| SearchError::IndexerDisconnected)?
    }

    /// Waits for the build and installs it into `session`.
    ///
    /// # Returns
    /// Whether the facade was installed, `false` when a newer load exists.
    pub fn install_into(self, session: &SearchSession<P>) -> SearchResult<bool> {
        let generation = self.generation;
        let facade = self.wait()?;
        Ok(session.install(generation, facade))
    }
}

fn build<P: Embeddable>(
    settings: &Settings,
    generator: &dyn EmbeddingGenerator,
    payloads: Vec<P>,
    generation: u64,
    latest: &AtomicU64,
    events: &Sender<IndexEvent>,
) -> SearchResult<SearchFacade<P>> {
    let total = payloads.len();
    let mut facade = SearchFacade::from_settings(settings)?;
    let mut cancelled = false;

    // Send failures only mean nobody is listening
    let report: BatchReport = facade.index_texts_with(generator, payloads, |report| {
        let _ = events.send(IndexEvent::Progress {
            generation,
            indexed: report.processed(),
            total,
        });
        if latest.load(Ordering::Acquire) != generation {
            cancelled = true;
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    })?;

    if cancelled {
        let _ = events.send(IndexEvent::Cancelled { generation });
        return Err(SearchError::Cancelled { generation });
    }

    facade.finish()?;
    let _ = events.send(IndexEvent::Ready {
        generation,
        inserted: report.inserted,
        skipped: report.skipped.len(),
    });
    Ok(facade)
}
