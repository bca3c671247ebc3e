// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::types::TimeNs;

/// Monotonic nanosecond time source
///
/// The engine reads the clock only when stamping a trade's execution
/// time. Implementations must never move backwards; wall-clock jumps must
/// not reorder executions.
pub trait Clock {
	/// Nanoseconds since an arbitrary fixed epoch.
	fn now_ns(&self) -> TimeNs;
}

/// Clock anchored to a `std::time::Instant` taken at construction
///
/// `Instant` is monotonic on every supported platform, so system clock
/// adjustments cannot affect trade ordering.
#[derive(Debug)]
pub struct SystemClock {
	origin: Instant,
}

impl SystemClock {
	pub fn new() -> Self {
		Self {
			origin: Instant::now(),
		}
	}
}

impl Default for SystemClock {
	fn default() -> Self {
		Self::new()
	}
}

impl Clock for SystemClock {
	fn now_ns(&self) -> TimeNs {
		self.origin.elapsed().as_nanos() as TimeNs
	}
}

/// Manually driven clock for deterministic replay
///
/// Clones share the underlying counter, so a driver can keep a handle
/// while the engine owns the boxed clock. Callers are responsible for
/// never moving it backwards.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
	now: Arc<AtomicU64>,
}

impl ManualClock {
	pub fn new(start: TimeNs) -> Self {
		Self {
			now: Arc::new(AtomicU64::new(start)),
		}
	}

	pub fn set(&self, now: TimeNs) {
		self.now.store(now, Ordering::Relaxed);
	}

	pub fn advance(&self, delta: TimeNs) {
		self.now.fetch_add(delta, Ordering::Relaxed);
	}
}

impl Clock for ManualClock {
	fn now_ns(&self) -> TimeNs {
		self.now.load(Ordering::Relaxed)
	}
}
