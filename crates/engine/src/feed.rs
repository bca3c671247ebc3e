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

use crate::types::Trade;

/// SPSC trade feed carrying executions from the matching loop to a sink
///
/// The feed decouples trade production from whatever the driver does with
/// executions, so the matching loop never blocks on the consumer.
///
/// Properties:
/// - Single producer (matching loop), single consumer (driver sink)
/// - Bounded capacity for backpressure
/// - Non-blocking push with explicit failure when full
pub struct TradeFeed {
	sender: Sender<Trade>,
	receiver: Receiver<Trade>,
}

impl TradeFeed {
	/// Create a new trade feed with the specified capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, receiver) = bounded(capacity);
		Self { sender, receiver }
	}

	/// Split the feed into producer and consumer ends.
	pub fn split(self) -> (TradeProducer, TradeConsumer) {
		(
			TradeProducer {
				sender: self.sender,
			},
			TradeConsumer {
				receiver: self.receiver,
			},
		)
	}
}

/// Producer end of the trade feed (matching loop side)
pub struct TradeProducer {
	sender: Sender<Trade>,
}

impl TradeProducer {
	/// Push a trade to the feed.
	///
	/// Returns an error when the feed is full; the matching loop logs and
	/// drops rather than stall the book.
	pub fn push(&self, trade: Trade) -> Result<(), FeedError> {
		self.sender.try_send(trade).map_err(|e| match e {
			TrySendError::Full(_) => FeedError::Full,
			TrySendError::Disconnected(_) => FeedError::Disconnected,
		})
	}

	/// Check if the feed is full.
	pub fn is_full(&self) -> bool {
		self.sender.is_full()
	}
}

/// Consumer end of the trade feed (driver side)
pub struct TradeConsumer {
	receiver: Receiver<Trade>,
}

impl TradeConsumer {
	/// Try to receive a trade (non-blocking).
	pub fn try_recv(&self) -> Result<Trade, FeedError> {
		self.receiver.try_recv().map_err(|e| match e {
			TryRecvError::Empty => FeedError::Empty,
			TryRecvError::Disconnected => FeedError::Disconnected,
		})
	}

	/// Receive a trade (blocking).
	pub fn recv(&self) -> Result<Trade, FeedError> {
		self.receiver.recv().map_err(|_| FeedError::Disconnected)
	}

	/// Drain up to `max_count` trades without blocking.
	pub fn drain(&self, max_count: usize) -> Vec<Trade> {
		let mut trades = Vec::with_capacity(max_count);
		for _ in 0..max_count {
			match self.try_recv() {
				Ok(trade) => trades.push(trade),
				Err(_) => break,
			}
		}
		trades
	}
}

/// Errors that can occur when interacting with the trade feed
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
	#[error("Trade feed is full")]
	Full,
	#[error("Trade feed is empty")]
	Empty,
	#[error("Trade feed disconnected")]
	Disconnected,
}
