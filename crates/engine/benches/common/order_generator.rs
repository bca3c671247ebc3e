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

use fairmatch_engine::types::{EventType, OrderEvent, Side, TraderId};

/// Deterministic load shapes: counter-derived, no RNG, so every run and
/// every mode sees the identical event trace.
#[derive(Clone, Copy)]
pub enum Scenario {
	/// Bids and asks far apart: the book only ever deepens
	NoCross,
	/// Everything at one price, alternating sides: trade on every pair
	CrossHeavy,
	/// Runs of same-side orders at one price: contested groups per batch
	Contended,
}

pub struct OrderGenerator {
	counter: u64,
	scenario: Scenario,
}

impl OrderGenerator {
	pub fn new(scenario: Scenario) -> Self {
		Self {
			counter: 0,
			scenario,
		}
	}

	pub fn next_event(&mut self) -> OrderEvent {
		self.counter += 1;
		let order_id = self.counter;
		// One event per simulated microsecond.
		let recv_time = self.counter * 1_000;
		let trader_id = (self.counter % 4 + 1) as TraderId;

		let (side, price, qty) = match self.scenario {
			Scenario::NoCross => {
				if self.counter.is_multiple_of(2) {
					(Side::Buy, 44_000 + (self.counter % 1_000) as i64, 1)
				} else {
					(Side::Sell, 56_000 + (self.counter % 1_000) as i64, 1)
				}
			}
			Scenario::CrossHeavy => {
				let side = if self.counter.is_multiple_of(2) {
					Side::Buy
				} else {
					Side::Sell
				};
				(side, 50_000, 10)
			}
			Scenario::Contended => {
				let side = if (self.counter / 4).is_multiple_of(2) {
					Side::Buy
				} else {
					Side::Sell
				};
				(side, 50_000, 10)
			}
		};

		OrderEvent {
			event_type: EventType::New,
			order_id,
			instrument: "BENCH".to_string(),
			side,
			price,
			qty,
			recv_time,
			batch_id: 0,
			trader_id,
		}
	}
}
