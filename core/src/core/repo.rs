use std::future::Future;

use crate::error::RagError;

/// Implemented by connection pools that can start, commit, and abort a
/// transaction. Used together with the [`transaction!`] macro to give every
/// multi-write operation (chiefly [`crate::core::store::ChunkStore::upsert_document_chunks`])
/// a single-transaction-per-document guarantee: readers must never observe
/// one write of a group without the others.
pub trait Atomic {
    type Tx: Send;

    fn start_tx(&self) -> impl Future<Output = Result<Self::Tx, RagError>> + Send;

    fn commit_tx(&self, tx: Self::Tx) -> impl Future<Output = Result<(), RagError>> + Send;

    fn abort_tx(&self, tx: Self::Tx) -> impl Future<Output = Result<(), RagError>> + Send;
}

/// Starts a transaction on `$atomic`, runs `$op` (an `async` block receiving
/// the open transaction as `$tx`), and commits on `Ok` or aborts and
/// propagates on `Err`.
#[macro_export]
macro_rules! transaction {
    ($atomic:expr, |$tx:ident| $op:block) => {{
        let mut $tx = $crate::core::repo::Atomic::start_tx(&$atomic).await?;
        let result: Result<_, $crate::error::RagError> = async { $op }.await;
        match result {
            Ok(value) => {
                $crate::core::repo::Atomic::commit_tx(&$atomic, $tx).await?;
                Ok(value)
            }
            Err(e) => {
                let _ = $crate::core::repo::Atomic::abort_tx(&$atomic, $tx).await;
                Err(e)
            }
        }
    }};
}
