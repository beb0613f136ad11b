// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Serialized, paced access to a device session.
//!
//! Every client keeps its connection state inside an [`AccessGuard`]. A
//! caller acquires a [`SessionLease`], performs its wire exchange and hands
//! the result back through [`SessionLease::finish`], which keeps the lease
//! for the remainder of the pacing interval before releasing it.
//!
//! ```text
//!  acquire (≤ access_timeout)      wire I/O          pacing - elapsed
//! ├──────────────────────────┤├──────────────────┤├──────────────────┤ release
//! ```

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::error::{PlcError, PlcResult};

/// Mutex around a device session with a bounded acquire and pacing.
#[derive(Debug)]
pub struct AccessGuard<S> {
    session: Mutex<S>,
    access_timeout: Duration,
    pacing: Duration,
}

impl<S> AccessGuard<S> {
    /// Wraps `session`.
    pub fn new(session: S, access_timeout: Duration, pacing: Duration) -> Self {
        Self {
            session: Mutex::new(session),
            access_timeout,
            pacing,
        }
    }

    /// Returns the acquire timeout.
    pub fn access_timeout(&self) -> Duration {
        self.access_timeout
    }

    /// Returns the pacing interval.
    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Acquires exclusive access to the session.
    ///
    /// # Errors
    ///
    /// [`PlcError::LockTimeout`] if the session is not free within the
    /// access timeout.
    pub async fn acquire(&self) -> PlcResult<SessionLease<'_, S>> {
        let guard = tokio::time::timeout(self.access_timeout, self.session.lock())
            .await
            .map_err(|_| {
                tracing::warn!(timeout_ms = self.access_timeout.as_millis() as u64, "Device access lock timed out");
                PlcError::lock_timeout(self.access_timeout)
            })?;

        Ok(SessionLease {
            guard,
            started: Instant::now(),
            pacing: self.pacing,
        })
    }

    /// Returns the session without locking. Needs exclusive ownership.
    pub fn get_mut(&mut self) -> &mut S {
        self.session.get_mut()
    }
}

/// Exclusive access to a session, released on drop.
#[derive(Debug)]
pub struct SessionLease<'a, S> {
    guard: MutexGuard<'a, S>,
    started: Instant,
    pacing: Duration,
}

impl<S> SessionLease<'_, S> {
    /// Time since the lease was acquired.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Completes an access. On success the lease is held until the pacing
    /// interval since acquisition has passed; errors release it at once.
    pub async fn finish<T>(self, result: PlcResult<T>) -> PlcResult<T> {
        if result.is_ok() {
            let remaining = self.pacing.saturating_sub(self.elapsed());
            if !remaining.is_zero() {
                tokio::time::sleep(remaining).await;
            }
        }
        result
    }
}

impl<S> Deref for SessionLease<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard
    }
}

impl<S> DerefMut for SessionLease<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.guard
    }
}
