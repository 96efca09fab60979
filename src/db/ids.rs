//! Backpressured, cancellable enumeration of the ids in a collection.

use futures::{Stream, StreamExt};
use sqlx::pool::PoolConnection;
use sqlx::Sqlite;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::error::StoreError;

/// Number of ids buffered between the cursor and the consumer.
pub const ID_BUFFER_CAPACITY: usize = 8;

/// A finite, non-restartable stream of document ids.
///
/// Ids arrive in cursor order. A backend failure is delivered as a final
/// `Err` item. The stream runs on a child of the caller's token: cancelling
/// the caller's token stops it, while dropping the stream only cancels the
/// child, which stops the producer and releases the cursor and its session.
pub struct IdStream {
    rx: mpsc::Receiver<Result<String, StoreError>>,
    token: CancellationToken,
    _cancel_on_drop: DropGuard,
}

impl IdStream {
    /// Stops the producer.
    ///
    /// Up to [`ID_BUFFER_CAPACITY`] ids queued before the producer observed
    /// the cancellation can still be received.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The token owned by this stream (a child of the caller's token).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Receives the next id, or `None` once the stream is exhausted.
    pub async fn recv(&mut self) -> Option<Result<String, StoreError>> {
        self.rx.recv().await
    }
}

impl fmt::Debug for IdStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdStream")
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Stream for IdStream {
    type Item = Result<String, StoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Starts a producer that reads `sql` (a single-column id query) on `session`.
///
/// `parent` is only observed, never cancelled.
pub(crate) fn spawn_producer(
    mut session: PoolConnection<Sqlite>,
    sql: String,
    collection: String,
    parent: &CancellationToken,
) -> IdStream {
    let token = parent.child_token();
    let (tx, rx) = mpsc::channel(ID_BUFFER_CAPACITY);
    let producer_token = token.clone();

    tokio::spawn(async move {
        let token = producer_token;
        let mut produced = 0usize;

        {
            let mut cursor = sqlx::query_scalar::<_, String>(&sql).fetch(&mut *session);

            loop {
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = cursor.next() => next,
                };

                let item = match next {
                    Some(Ok(id)) => Ok(id),
                    Some(Err(e)) => Err(StoreError::Backend(e)),
                    None => break,
                };
                let failed = item.is_err();

                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    sent = tx.send(item) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }

                if failed {
                    break;
                }
                produced += 1;
            }
        }

        tracing::debug!(
            collection = %collection,
            produced,
            cancelled = token.is_cancelled(),
            "Id cursor closed"
        );
        drop(session);
    });

    IdStream {
        rx,
        _cancel_on_drop: token.clone().drop_guard(),
        token,
    }
}
