//! Ledger events and subscription streams.
//!
//! Event delivery is an explicit stream, decoupled from request/response
//! call sites: subscribers receive confirmed-entry events over a broadcast
//! channel wrapped as a [`futures::Stream`]. A slow subscriber that lags is
//! reported and skipped past, never silently stalled.

use futures::Stream;
use healthchain_core::{ConsentId, LedgerTxRef, RecordId, WalletIdentity};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

/// Kind discriminant for subscribing to a subset of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEventKind {
    /// A record pointer was registered
    RecordCreated,
    /// A consent grant was issued
    ConsentGranted,
    /// A consent grant was revoked
    ConsentRevoked,
    /// A record access was recorded
    RecordAccessed,
}

/// A confirmed ledger entry, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A record pointer was registered
    RecordCreated {
        /// Assigned record identifier
        record_id: RecordId,
        /// Owner of the new record
        owner: WalletIdentity,
        /// Confirming transaction
        tx_ref: LedgerTxRef,
    },
    /// A consent grant was issued
    ConsentGranted {
        /// Assigned consent identifier
        consent_id: ConsentId,
        /// Identity that issued the grant
        grantor: WalletIdentity,
        /// Identity the grant authorizes
        grantee: WalletIdentity,
        /// Confirming transaction
        tx_ref: LedgerTxRef,
    },
    /// A consent grant was revoked
    ConsentRevoked {
        /// Revoked consent identifier
        consent_id: ConsentId,
        /// Identity that revoked
        grantor: WalletIdentity,
        /// Confirming transaction
        tx_ref: LedgerTxRef,
    },
    /// A record access was recorded
    RecordAccessed {
        /// Accessed record identifier
        record_id: RecordId,
        /// Identity that accessed
        accessor: WalletIdentity,
        /// Confirming transaction
        tx_ref: LedgerTxRef,
    },
}

impl LedgerEvent {
    /// Kind discriminant of this event.
    pub const fn kind(&self) -> LedgerEventKind {
        match self {
            Self::RecordCreated { .. } => LedgerEventKind::RecordCreated,
            Self::ConsentGranted { .. } => LedgerEventKind::ConsentGranted,
            Self::ConsentRevoked { .. } => LedgerEventKind::ConsentRevoked,
            Self::RecordAccessed { .. } => LedgerEventKind::RecordAccessed,
        }
    }

    /// Transaction that confirmed the entry.
    pub fn tx_ref(&self) -> &LedgerTxRef {
        match self {
            Self::RecordCreated { tx_ref, .. }
            | Self::ConsentGranted { tx_ref, .. }
            | Self::ConsentRevoked { tx_ref, .. }
            | Self::RecordAccessed { tx_ref, .. } => tx_ref,
        }
    }
}

/// Stream of ledger events, optionally filtered to one kind.
pub struct EventStream {
    inner: BroadcastStream<LedgerEvent>,
    filter: Option<LedgerEventKind>,
}

impl EventStream {
    /// Wrap a broadcast receiver, delivering every event kind.
    pub fn new(receiver: broadcast::Receiver<LedgerEvent>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter: None,
        }
    }

    /// Wrap a broadcast receiver, delivering only one event kind.
    pub fn filtered(receiver: broadcast::Receiver<LedgerEvent>, kind: LedgerEventKind) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter: Some(kind),
        }
    }
}

impl Stream for EventStream {
    type Item = LedgerEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if self.filter.is_none() || self.filter == Some(event.kind()) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "event subscriber lagged, skipping missed events");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn record_created(id: u64) -> LedgerEvent {
        LedgerEvent::RecordCreated {
            record_id: RecordId::new(id),
            owner: WalletIdentity::new("0xowner"),
            tx_ref: LedgerTxRef::new(format!("0x{id:x}")),
        }
    }

    #[tokio::test]
    async fn stream_delivers_events_in_order() {
        let (tx, rx) = broadcast::channel(8);
        let mut stream = EventStream::new(rx);

        tx.send(record_created(1)).unwrap();
        tx.send(record_created(2)).unwrap();
        drop(tx);

        assert_eq!(stream.next().await, Some(record_created(1)));
        assert_eq!(stream.next().await, Some(record_created(2)));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn filtered_stream_skips_other_kinds() {
        let (tx, rx) = broadcast::channel(8);
        let mut stream = EventStream::filtered(rx, LedgerEventKind::ConsentRevoked);

        tx.send(record_created(1)).unwrap();
        let revoked = LedgerEvent::ConsentRevoked {
            consent_id: ConsentId::new(4),
            grantor: WalletIdentity::new("0xpatient"),
            tx_ref: LedgerTxRef::new("0xdead"),
        };
        tx.send(revoked.clone()).unwrap();
        drop(tx);

        assert_eq!(stream.next().await, Some(revoked));
        assert_eq!(stream.next().await, None);
    }
}
