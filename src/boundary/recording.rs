//! In-memory transport for unit tests; records every outbound call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};

use crate::boundary::address::ListenPlan;
use crate::boundary::registry::BridgeHandle;
use crate::boundary::token::RequestToken;
use crate::boundary::transport::{slice_buffer, Transport, TransportError};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Headers {
        status: u16,
        names: Vec<String>,
        values: Vec<String>,
    },
    Buffer(Vec<u8>),
    End,
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<(RequestToken, Call)>,
    releases: HashMap<RequestToken, usize>,
    listening: Option<(ListenPlan, BridgeHandle)>,
}

/// Transport that stores calls instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    recorded: Mutex<Recorded>,
    fail_headers: AtomicBool,
    starts: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Calls made for one token, in order.
    pub fn calls_for(&self, token: RequestToken) -> Vec<Call> {
        self.recorded()
            .calls
            .iter()
            .filter(|(t, _)| *t == token)
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Concatenated body bytes sent for `token`.
    pub fn body_for(&self, token: RequestToken) -> Vec<u8> {
        self.calls_for(token)
            .into_iter()
            .filter_map(|call| match call {
                Call::Buffer(bytes) => Some(bytes),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn release_count(&self, token: RequestToken) -> usize {
        self.recorded().releases.get(&token).copied().unwrap_or(0)
    }

    /// Plan passed to the last successful `start_listening`.
    pub fn listen_plan(&self) -> Option<ListenPlan> {
        self.recorded().listening.as_ref().map(|(plan, _)| plan.clone())
    }

    pub fn is_listening(&self) -> bool {
        self.recorded().listening.is_some()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Make every `send_headers` fail as if the client disconnected.
    pub fn fail_headers(&self, fail: bool) {
        self.fail_headers.store(fail, Ordering::SeqCst);
    }

    fn record(&self, token: RequestToken, call: Call) {
        self.recorded().calls.push((token, call));
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for RecordingTransport {
    fn send_headers<'a>(
        &'a self,
        token: RequestToken,
        status: u16,
        header_names: &'a [String],
        header_values: &'a [String],
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        async move {
            if self.fail_headers.load(Ordering::SeqCst) {
                return Err(TransportError::Disconnected(token));
            }
            self.record(
                token,
                Call::Headers {
                    status,
                    names: header_names.to_vec(),
                    values: header_values.to_vec(),
                },
            );
            Ok(())
        }
        .boxed()
    }

    fn send_buffer(
        &self,
        token: RequestToken,
        buffer: Bytes,
        offset: usize,
        count: usize,
    ) -> BoxFuture<'_, Result<(), TransportError>> {
        async move {
            let slice = slice_buffer(&buffer, offset, count)?;
            self.record(token, Call::Buffer(slice.to_vec()));
            Ok(())
        }
        .boxed()
    }

    fn send_end(&self, token: RequestToken) -> BoxFuture<'_, Result<(), TransportError>> {
        async move {
            self.record(token, Call::End);
            Ok(())
        }
        .boxed()
    }

    fn release(&self, token: RequestToken) {
        *self.recorded().releases.entry(token).or_default() += 1;
    }

    fn start_listening<'a>(
        &'a self,
        plan: &'a ListenPlan,
        bridge: BridgeHandle,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        async move {
            self.starts.fetch_add(1, Ordering::SeqCst);
            let mut recorded = self.recorded();
            if recorded.listening.is_some() {
                return Err(TransportError::AlreadyListening);
            }
            recorded.listening = Some((plan.clone(), bridge));
            Ok(())
        }
        .boxed()
    }

    fn stop_listening(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        async move {
            self.recorded().listening = None;
            Ok(())
        }
        .boxed()
    }
}
