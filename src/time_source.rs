/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Injectable wall-clock abstraction so expiry logic can be tested deterministically.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Source of the current wall-clock time
///
/// Defaults to [`SystemTime::now`]. Tests construct a manual source and advance it
/// explicitly:
///
/// ```rust
/// use aws_auth::time_source::TimeSource;
/// use std::time::{Duration, UNIX_EPOCH};
///
/// let (ts, handle) = TimeSource::manual(UNIX_EPOCH);
/// assert_eq!(ts.now(), UNIX_EPOCH);
/// handle.advance(Duration::from_secs(100));
/// assert_eq!(ts.now(), UNIX_EPOCH + Duration::from_secs(100));
/// ```
#[derive(Clone, Debug)]
pub struct TimeSource(Inner);

#[derive(Clone, Debug)]
enum Inner {
    System,
    Manual(ManualTimeSource),
}

impl Default for TimeSource {
    fn default() -> Self {
        TimeSource::system()
    }
}

impl TimeSource {
    /// A time source backed by [`SystemTime::now`].
    pub fn system() -> Self {
        TimeSource(Inner::System)
    }

    /// A manually controlled time source, starting at `start_time`.
    ///
    /// Returns the source along with a handle used to move time forward.
    pub fn manual(start_time: SystemTime) -> (Self, ManualTimeSource) {
        let manual = ManualTimeSource::new(start_time);
        (TimeSource(Inner::Manual(manual.clone())), manual)
    }

    pub fn now(&self) -> SystemTime {
        match &self.0 {
            Inner::System => SystemTime::now(),
            Inner::Manual(manual) => manual.now(),
        }
    }
}

/// Time source that can be manually moved for tests
#[derive(Clone, Debug)]
pub struct ManualTimeSource {
    now: Arc<Mutex<SystemTime>>,
}

impl ManualTimeSource {
    fn new(start_time: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start_time)),
        }
    }

    /// Sets time to the specified `time`.
    pub fn set_time(&self, time: SystemTime) {
        let mut now = self.now.lock().unwrap();
        *now = time;
    }

    /// Advances time by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }

    /// Returns the current manual time.
    pub fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}
