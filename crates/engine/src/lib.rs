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

//! Fairmatch Engine
//!
//! This crate provides a latency-fair limit-order matching engine
//! demonstrator: events are optionally buffered into time-bounded
//! micro-batches and matched under one of two priority disciplines, with
//! per-participant telemetry that makes the two comparable.
//!
//! Architecture:
//! - Single-threaded matching core for deterministic, replayable behavior
//! - Micro-batching driven by the event arrival timeline, not wall clock
//! - Two disciplines: conventional price-time priority, and latency-fair
//!   order-id priority that neutralises arrival-time advantage per batch
//! - Competition attribution crediting one winner per contended
//!   (price, side) group, feeding the fairness indices
//! - Optional single-actor service wrapper with an MPSC ingress queue and
//!   an SPSC trade feed

pub mod batcher;
pub mod book;
pub mod clock;
pub mod config;
pub mod engine;
pub mod feed;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod types;

pub use batcher::MicroBatcher;
pub use book::{BookSnapshot, OrderBook};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::MatchingEngine;
pub use feed::{FeedError, TradeConsumer, TradeFeed, TradeProducer};
pub use metrics::{FairnessMetrics, FairnessReport, TradeRecord, TraderProfile, TraderStats};
pub use queue::{IngressQueue, QueueError, QueueReceiver, QueueSender};
pub use service::{EngineService, ServiceCommand};
pub use types::*;
