//! Per-key change notification.
//!
//! Each observed key has one `watch` channel inside its engine holding
//! the latest known plaintext (or `None` when absent).  Observers decode
//! that plaintext into the type they asked for, so one channel serves
//! string, integer and object observers alike.
//!
//! Like any latest-value channel, rapid successive writes may be
//! conflated: an observer always sees the newest value, not
//! necessarily every intermediate one.

use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::watch;
use zeroize::Zeroizing;

use super::value::VaultValue;

/// Latest known plaintext of a key.
pub(crate) type Snapshot = Option<Arc<Zeroizing<Vec<u8>>>>;

/// Live view of one key, typed as `T`.
pub struct Observer<T> {
    rx: watch::Receiver<Snapshot>,
    primed: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: VaultValue> Observer<T> {
    pub(crate) fn new(rx: watch::Receiver<Snapshot>) -> Self {
        Self {
            rx,
            primed: false,
            _marker: PhantomData,
        }
    }

    /// The latest value, without waiting.
    pub fn current(&self) -> Option<T> {
        decode(&self.rx.borrow())
    }

    /// Next value in the stream.
    ///
    /// The first call returns the current value immediately; later
    /// calls wait for the next put/remove/clear affecting the key.
    /// Returns `None` once the engine has been dropped.
    pub async fn next(&mut self) -> Option<Option<T>> {
        if !self.primed {
            self.primed = true;
            let snapshot = self.rx.borrow_and_update().clone();
            return Some(decode(&snapshot));
        }

        self.rx.changed().await.ok()?;
        let snapshot = self.rx.borrow_and_update().clone();
        Some(decode(&snapshot))
    }
}

fn decode<T: VaultValue>(snapshot: &Snapshot) -> Option<T> {
    snapshot
        .as_deref()
        .and_then(|plaintext| T::from_canonical(plaintext))
}
