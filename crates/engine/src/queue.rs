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

use crossbeam::channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

use crate::types::OrderEvent;

/// Ingress queue passing order events from the driver to the matching loop
///
/// The queue is the boundary between however many driver threads produce
/// events and the single thread that owns the engine. It preserves
/// enqueue order, which the batcher's non-decreasing `recv_time`
/// precondition depends on when multiple producers share a timeline.
///
/// Properties:
/// - Multiple producers, single consumer
/// - Bounded capacity for backpressure
/// - Explicit failure semantics when full
///
/// The queue does not validate events; rejection happens in the engine at
/// submit time. When the queue is full the driver should shed or retry,
/// never block the event source.
pub struct IngressQueue {
	sender: Sender<OrderEvent>,
	receiver: Receiver<OrderEvent>,
}

impl IngressQueue {
	/// Create a new ingress queue with the specified capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, receiver) = bounded(capacity);
		Self { sender, receiver }
	}

	/// Split the queue into sender and receiver ends.
	///
	/// The sender can be cloned across driver threads. The receiver must
	/// remain unique to the single matching loop.
	pub fn split(self) -> (QueueSender, QueueReceiver) {
		(
			QueueSender {
				sender: self.sender,
			},
			QueueReceiver {
				receiver: self.receiver,
			},
		)
	}
}

/// Sender end of the ingress queue (driver side)
#[derive(Clone)]
pub struct QueueSender {
	sender: Sender<OrderEvent>,
}

impl QueueSender {
	/// Try to enqueue an event (non-blocking).
	///
	/// Returns `QueueError::Full` when the matching loop is saturated and
	/// cannot accept new events.
	pub fn try_enqueue(&self, ev: OrderEvent) -> Result<(), QueueError> {
		self.sender.try_send(ev).map_err(|e| match e {
			TrySendError::Full(_) => QueueError::Full,
			TrySendError::Disconnected(_) => QueueError::Disconnected,
		})
	}

	/// Check if the queue is full.
	pub fn is_full(&self) -> bool {
		self.sender.is_full()
	}
}

/// Receiver end of the ingress queue (matching loop side)
pub struct QueueReceiver {
	receiver: Receiver<OrderEvent>,
}

impl QueueReceiver {
	/// Receive an event (blocking).
	pub fn recv(&self) -> Result<OrderEvent, QueueError> {
		self.receiver.recv().map_err(|_| QueueError::Disconnected)
	}

	/// Try to receive an event (non-blocking).
	///
	/// Used by the matching loop so it can interleave control messages
	/// and shutdown checks.
	pub fn try_recv(&self) -> Result<OrderEvent, QueueError> {
		self.receiver.try_recv().map_err(|e| match e {
			TryRecvError::Empty => QueueError::Empty,
			TryRecvError::Disconnected => QueueError::Disconnected,
		})
	}
}

/// Errors that can occur when interacting with the ingress queue
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
	#[error("Queue is full")]
	Full,
	#[error("Queue is empty")]
	Empty,
	#[error("Queue disconnected")]
	Disconnected,
}
