use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{err, error::RagError};

/// Maps one or a batch of texts to fixed-dimension float vectors using a
/// remote embedding model. `embed_raw_batch` issues exactly one
/// remote call; sub-batching and order-preserving concatenation is the
/// free function [`embed_batch`] below, not a trait method, so every
/// implementation gets the same sub-batching contract for free.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimension every vector this embedder produces must have (I5).
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vecs = self.embed_raw_batch(std::slice::from_ref(&text.to_string())).await?;
        Ok(vecs.pop().unwrap_or_default())
    }

    /// Embed `texts` in a single remote call, one vector per input in order.
    async fn embed_raw_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}

/// Groups `texts` into sub-batches of `batch_size`, issues them to `embedder`
/// sequentially, and concatenates results preserving input order. On
/// failure of any sub-batch, the entire call fails. Cancellation is checked
/// between sub-batches.
pub async fn embed_batch(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Vec<f32>>, RagError> {
    let batch_size = batch_size.max(1);
    let mut out = Vec::with_capacity(texts.len());

    for sub_batch in texts.chunks(batch_size) {
        if cancel.is_cancelled() {
            return err!(Cancelled);
        }
        let vecs = embedder.embed_raw_batch(sub_batch).await?;
        out.extend(vecs);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        calls: std::sync::Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Embedder for Recorder {
        fn dimension(&self) -> usize {
            4
        }

        async fn embed_raw_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            self.calls.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }
    }

    #[tokio::test]
    async fn sub_batches_preserve_order_and_count() {
        let embedder = Recorder { calls: std::sync::Mutex::new(Vec::new()) };
        let texts: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        let cancel = CancellationToken::new();

        let out = embed_batch(&embedder, &texts, 4, &cancel).await.unwrap();

        assert_eq!(out.len(), 10);
        assert_eq!(*embedder.calls.lock().unwrap(), vec![4, 4, 2]);
    }
}
