use ragforge_llm::{LlmError, LlmProvider};

pub const DEFAULT_BATCH_SIZE: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("embedding failed: {0}")]
    Llm(#[from] LlmError),

    #[error("batch {batch} returned {actual} vectors for {expected} texts")]
    CountMismatch {
        batch: usize,
        expected: usize,
        actual: usize,
    },
}

/// Embeds texts in consecutive fixed-size batches, one provider call per batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchEmbedder {
    batch_size: usize,
}

impl Default for BatchEmbedder {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchEmbedder {
    /// # Errors
    ///
    /// Returns [`EmbedError::InvalidBatchSize`] for a batch size of zero.
    pub fn new(batch_size: usize) -> Result<Self, EmbedError> {
        if batch_size == 0 {
            return Err(EmbedError::InvalidBatchSize);
        }
        Ok(Self { batch_size })
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Output `i` is the embedding of `texts[i]`.
    ///
    /// # Errors
    ///
    /// Returns the first provider error, or a count mismatch if a batch comes
    /// back with the wrong number of vectors.
    pub async fn embed_all<P: LlmProvider>(
        &self,
        provider: &P,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        let total = texts.len().div_ceil(self.batch_size);
        let mut vectors = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            let embedded = provider.embed_batch(batch).await.inspect_err(|e| {
                tracing::error!(batch = i + 1, total, "embedding batch failed: {e}");
            })?;
            if embedded.len() != batch.len() {
                return Err(EmbedError::CountMismatch {
                    batch: i + 1,
                    expected: batch.len(),
                    actual: embedded.len(),
                });
            }
            vectors.extend(embedded);
            tracing::info!("processed batch {}/{total}", i + 1);
        }

        Ok(vectors)
    }
}
