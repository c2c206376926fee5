//! Binds payloads to an index behind sequential ids.

use std::ops::ControlFlow;
use std::time::Instant;

use crate::config::Settings;
use crate::error::SearchResult;
use crate::search::payload::Embeddable;
use crate::search::strategy::{IndexKind, IndexStrategy, build_strategy};
use crate::vector::{Distance, EmbeddingGenerator, VectorError, VectorId};

/// One ranked result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<P> {
    pub id: VectorId,
    pub distance: Distance,
    pub payload: P,
}

impl<P> SearchHit<P> {
    /// Cosine similarity, `1 - distance`.
    #[must_use]
    pub fn similarity(&self) -> f32 {
        self.distance.similarity()
    }
}

/// Outcome of a batch insertion.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchReport {
    /// Records that made it into the index
    pub inserted: usize,
    /// Position within the batch and the reason, for every rejected record
    pub skipped: Vec<(usize, VectorError)>,
}

impl BatchReport {
    /// Records seen so far, inserted or skipped.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.inserted + self.skipped.len()
    }
}

/// Owns one document's index and the payload of every indexed vector.
///
/// Ids are assigned sequentially from zero and only advance on a successful
/// insert, so they double as payload positions. There is no removal: a new
/// document gets a new facade.
#[derive(Debug)]
pub struct SearchFacade<P> {
    index: Box<dyn IndexStrategy>,
    payloads: Vec<P>,
    next_id: Option<VectorId>,
    top_n: usize,
    batch_size: usize,
}

impl<P> SearchFacade<P> {
    /// Wraps an existing, empty index.
    pub fn new(index: Box<dyn IndexStrategy>) -> Self {
        debug_assert!(index.is_empty(), "facade ids must own the whole index");
        let defaults = Settings::default();
        Self {
            index,
            payloads: Vec::new(),
            next_id: Some(VectorId::new(0)),
            top_n: defaults.search.top_n,
            batch_size: defaults.embedding.batch_size,
        }
    }

    /// Builds the configured strategy and adopts the search and embedding
    /// settings.
    pub fn from_settings(settings: &Settings) -> SearchResult<Self> {
        let mut facade = Self::new(build_strategy(settings)?);
        facade.top_n = settings.search.top_n;
        facade.batch_size = settings.embedding.batch_size.max(1);
        Ok(facade)
    }

    /// Indexes `vector` and stores `payload` under the next id.
    ///
    /// On error nothing is stored and the id is not consumed.
    pub fn insert(&mut self, vector: &[f32], payload: P) -> Result<VectorId, VectorError> {
        let id = self.next_id.ok_or(VectorError::InvalidParameter {
            name: "id",
            reason: "all 2^32 ids are in use",
        })?;

        self.index.insert(id, vector)?;
        self.payloads.push(payload);
        self.next_id = id.next();
        Ok(id)
    }

    /// Inserts every record, skipping (and logging) the ones the index
    /// rejects instead of aborting the batch.
    pub fn insert_batch<I>(&mut self, records: I) -> BatchReport
    where
        I: IntoIterator<Item = (Vec<f32>, P)>,
    {
        let mut report = BatchReport::default();
        self.insert_into(records, &mut report);
        report
    }

    fn insert_into<I>(&mut self, records: I, report: &mut BatchReport)
    where
        I: IntoIterator<Item = (Vec<f32>, P)>,
    {
        for (vector, payload) in records {
            let position = report.processed();
            match self.insert(&vector, payload) {
                Ok(_) => report.inserted += 1,
                Err(error) => {
                    tracing::warn!(position, %error, "skipping record");
                    report.skipped.push((position, error));
                }
            }
        }
    }

    /// Completes deferred build work (clustering for the bucket index).
    pub fn finish(&mut self) -> Result<(), VectorError> {
        let started = Instant::now();
        self.index.finish()?;
        tracing::info!(
            count = self.index.len(),
            strategy = %self.index.kind(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "index ready"
        );
        Ok(())
    }

    /// Ranked hits for a query vector, best first, at most `top_n` long.
    pub fn query(&self, vector: &[f32], top_n: usize) -> Result<Vec<SearchHit<P>>, VectorError>
    where
        P: Clone,
    {
        let results = self.index.search(vector, top_n)?;
        Ok(results
            .into_iter()
            .filter_map(|(id, distance)| {
                self.payload(id).map(|payload| SearchHit {
                    id,
                    distance,
                    payload: payload.clone(),
                })
            })
            .collect())
    }

    /// Payload stored under `id`.
    #[must_use]
    pub fn payload(&self, id: VectorId) -> Option<&P> {
        self.payloads.get(id.get() as usize)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Result count used by callers that do not pick their own.
    #[must_use]
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    #[must_use]
    pub fn kind(&self) -> IndexKind {
        self.index.kind()
    }
}

impl<P: Embeddable> SearchFacade<P> {
    /// Embeds and inserts payloads in `batch_size` chunks.
    ///
    /// Records the index rejects are skipped. An embedding failure aborts
    /// the call, keeping what earlier chunks inserted.
    pub fn index_texts(
        &mut self,
        generator: &dyn EmbeddingGenerator,
        payloads: Vec<P>,
    ) -> Result<BatchReport, VectorError> {
        self.index_texts_with(generator, payloads, |_| ControlFlow::Continue(()))
    }

    /// Like [`index_texts`](Self::index_texts), calling `on_batch` after every
    /// chunk. Returning `Break` stops before the next chunk.
    ///
    /// # Errors
    /// `DimensionMismatch` before any embedding work if the generator and the
    /// index disagree on dimension.
    pub fn index_texts_with<F>(
        &mut self,
        generator: &dyn EmbeddingGenerator,
        payloads: Vec<P>,
        mut on_batch: F,
    ) -> Result<BatchReport, VectorError>
    where
        F: FnMut(&BatchReport) -> ControlFlow<()>,
    {
        let expected = self.index.dimension().get();
        let actual = generator.dimension().get();
        if expected != actual {
            return Err(VectorError::DimensionMismatch { expected, actual });
        }

        let mut report = BatchReport::default();
        let mut remaining = payloads.into_iter().peekable();

        while remaining.peek().is_some() {
            let chunk: Vec<P> = remaining.by_ref().take(self.batch_size).collect();
            let texts: Vec<&str> = chunk.iter().map(Embeddable::embedding_text).collect();
            let vectors = generator.generate_embeddings(&texts)?;
            if vectors.len() != chunk.len() {
                return Err(VectorError::EmbeddingFailed(format!(
                    "expected {} embeddings, got {}",
                    chunk.len(),
                    vectors.len()
                )));
            }

            self.insert_into(vectors.into_iter().zip(chunk), &mut report);
            if on_batch(&report).is_break() {
                break;
            }
        }

        Ok(report)
    }

    /// Embeds `text` and runs it as a query.
    pub fn query_text(
        &self,
        generator: &dyn EmbeddingGenerator,
        text: &str,
        top_n: usize,
    ) -> Result<Vec<SearchHit<P>>, VectorError>
    where
        P: Clone,
    {
        let embedding = generator
            .generate_embeddings(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| VectorError::EmbeddingFailed("no embedding for query".to_string()))?;
        self.query(&embedding, top_n)
    }
}
