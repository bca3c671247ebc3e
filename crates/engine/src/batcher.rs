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

use tracing::debug;

use crate::types::{BatchId, OrderEvent, TimeNs};

/// Partitions the event stream into fixed-window micro-batches
///
/// Readiness is driven by the arrival timeline (event `recv_time`), not by
/// wall-clock polling, so a recorded trace replays to identical batches.
/// The batcher holds at most one pending batch; popping stamps every
/// buffered event with the batch id and drains the buffer in submission
/// order.
///
/// The batcher is a pure data structure: it never fails and never bounds
/// its memory. Validation and backpressure are the caller's job.
pub struct MicroBatcher {
	window_ns: TimeNs,
	batch_start_ns: TimeNs,
	next_batch_id: BatchId,
	buffer: Vec<OrderEvent>,
}

impl MicroBatcher {
	pub fn new(window_ns: TimeNs) -> Self {
		Self {
			window_ns,
			batch_start_ns: 0,
			next_batch_id: 1,
			buffer: Vec::new(),
		}
	}

	/// Append an event to the pending batch.
	///
	/// The first event of a batch anchors the window start. Events must be
	/// submitted in non-decreasing `recv_time` order; the batcher does not
	/// re-sort.
	pub fn submit(&mut self, ev: OrderEvent) {
		if self.buffer.is_empty() {
			self.batch_start_ns = ev.recv_time;
		}
		self.buffer.push(ev);
	}

	/// True when the pending batch spans at least the configured window.
	pub fn has_ready_batch(&self) -> bool {
		match self.buffer.last() {
			Some(ev) => ev.recv_time.saturating_sub(self.batch_start_ns) >= self.window_ns,
			None => false,
		}
	}

	/// Stamp and drain the pending batch.
	///
	/// Callable below the readiness threshold too; that forces an early
	/// flush and is the shutdown path. The returned sequence preserves
	/// submission order.
	pub fn pop_batch(&mut self) -> Vec<OrderEvent> {
		for ev in &mut self.buffer {
			ev.batch_id = self.next_batch_id;
		}

		debug!(
			target: "batcher",
			batch_id = self.next_batch_id,
			events = self.buffer.len(),
			"emitting batch"
		);

		self.next_batch_id += 1;
		std::mem::take(&mut self.buffer)
	}

	/// Change the window and discard the pending batch.
	///
	/// The batch id counter survives, so ids stay strictly increasing
	/// across a window change.
	pub fn set_window(&mut self, window_ns: TimeNs) {
		self.window_ns = window_ns;
		self.batch_start_ns = 0;
		self.buffer.clear();
	}

	pub fn window_ns(&self) -> TimeNs {
		self.window_ns
	}

	pub fn len(&self) -> usize {
		self.buffer.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buffer.is_empty()
	}
}
