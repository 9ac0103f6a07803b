//! Live exchange table.
//!
//! # Responsibilities
//! - Allocate a token per accepted request
//! - Route response fragments from the bridge to the waiting HTTP handler
//! - Forget an exchange once its token is released
//!
//! # Design Decisions
//! - One bounded channel per exchange; a slow client back-pressures the
//!   pipeline instead of growing memory
//! - A dropped receiver (client gone) surfaces as `Disconnected`

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::boundary::token::TokenSource;
use crate::boundary::{RequestToken, TransportError};

/// One piece of a response, in wire order.
#[derive(Debug)]
pub enum Fragment {
    Head { status: u16, headers: Vec<(String, String)> },
    Body(Bytes),
    End,
}

#[derive(Debug)]
pub struct ExchangeTable {
    tokens: TokenSource,
    senders: DashMap<RequestToken, mpsc::Sender<Fragment>>,
    capacity: usize,
}

impl ExchangeTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            tokens: TokenSource::default(),
            senders: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register a new exchange and return the receiving end of its fragments.
    pub fn open(&self) -> (RequestToken, mpsc::Receiver<Fragment>) {
        let token = self.tokens.next_token();
        let (tx, rx) = mpsc::channel(self.capacity);
        self.senders.insert(token, tx);
        (token, rx)
    }

    /// Deliver a fragment, waiting while the channel is full.
    pub async fn send(&self, token: RequestToken, fragment: Fragment) -> Result<(), TransportError> {
        // Clone out of the map so no shard lock is held across the await.
        let sender = self
            .senders
            .get(&token)
            .map(|entry| entry.value().clone())
            .ok_or(TransportError::UnknownToken(token))?;

        sender
            .send(fragment)
            .await
            .map_err(|_| TransportError::Disconnected(token))
    }

    /// Forget `token`. Returns false if it was not live.
    pub fn close(&self, token: RequestToken) -> bool {
        self.senders.remove(&token).is_some()
    }

    /// Number of live exchanges.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
