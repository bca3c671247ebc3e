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

use std::sync::{
	Arc,
	atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender, TryRecvError, bounded};
use tracing::{error, info, warn};

use crate::book::BookSnapshot;
use crate::config::EngineConfig;
use crate::engine::MatchingEngine;
use crate::feed::TradeProducer;
use crate::metrics::{FairnessReport, TraderProfile};
use crate::queue::{QueueError, QueueReceiver};
use crate::types::{EngineError, MatchingMode, TimeNs, Trade};

/// Control messages for the engine service
///
/// These let external threads reach the engine without sharing mutable
/// state: the matching loop processes them between events, so every
/// command observes a fully settled engine.
#[derive(Debug)]
pub enum ServiceCommand {
	/// Switch the matching discipline (book rebuild, metrics reset)
	SetMode { mode: MatchingMode },

	/// Change the batching window; the pending batch is discarded
	SetWindow {
		window_ns: TimeNs,
		respond_to: Sender<Result<(), EngineError>>,
	},

	/// Reinitialise book, metrics and batcher
	Reset,

	/// Read the book's public surface
	Snapshot { respond_to: Sender<BookSnapshot> },

	/// Derive the fairness report for the given participants
	Report {
		traders: Vec<TraderProfile>,
		respond_to: Sender<FairnessReport>,
	},

	/// Shut the matching loop down gracefully
	Shutdown,
}

/// Single-actor wrapper around the matching core
///
/// The engine itself is a plain synchronous value; this wrapper gives it
/// the exclusive-owner form: one dedicated thread owns the engine,
/// consumes events from the ingress queue, flushes ready batches, and
/// publishes trades to the feed. Nothing else ever touches the engine, so
/// the single-driver contract holds by construction.
///
/// On shutdown the loop force-flushes whatever the batcher still holds
/// before the thread exits.
pub struct EngineService {
	thread_handle: Option<JoinHandle<()>>,
	shutdown: Arc<AtomicBool>,
	control_tx: Sender<ServiceCommand>,
}

impl EngineService {
	/// Start the service thread that owns the engine.
	pub fn start(
		config: EngineConfig,
		queue_receiver: QueueReceiver,
		trade_producer: TradeProducer,
	) -> Result<Self, EngineError> {
		let engine = MatchingEngine::new(config)?;
		Ok(Self::start_with_engine(engine, queue_receiver, trade_producer))
	}

	/// Start the service thread around an already-built engine.
	///
	/// Lets tests and replay drivers inject an engine with a manual
	/// clock.
	pub fn start_with_engine(
		engine: MatchingEngine,
		queue_receiver: QueueReceiver,
		trade_producer: TradeProducer,
	) -> Self {
		let shutdown = Arc::new(AtomicBool::new(false));
		let shutdown_clone = shutdown.clone();

		let (control_tx, control_rx) = bounded(16);

		let thread_handle = thread::Builder::new()
			.name("matching-loop".to_string())
			.spawn(move || {
				info!(target: "service", "matching loop started");
				Self::run_matching_loop(
					engine,
					&queue_receiver,
					&trade_producer,
					&control_rx,
					&shutdown_clone,
				);
				info!(target: "service", "matching loop stopped");
			})
			.expect("failed to spawn matching loop thread");

		Self {
			thread_handle: Some(thread_handle),
			shutdown,
			control_tx,
		}
	}

	/// Main loop: interleave control messages, event intake and batch
	/// flushing until shutdown.
	fn run_matching_loop(
		mut engine: MatchingEngine,
		queue_receiver: &QueueReceiver,
		trade_producer: &TradeProducer,
		control_rx: &Receiver<ServiceCommand>,
		shutdown: &Arc<AtomicBool>,
	) {
		loop {
			if shutdown.load(Ordering::Relaxed) {
				break;
			}

			match control_rx.try_recv() {
				Ok(ServiceCommand::Shutdown) => {
					info!(target: "service", "received shutdown via control channel");
					break;
				}
				Ok(cmd) => {
					Self::handle_command(&mut engine, cmd);
					continue;
				}
				Err(TryRecvError::Empty) => {}
				Err(TryRecvError::Disconnected) => {
					warn!(target: "service", "control channel disconnected");
					break;
				}
			}

			let ev = match queue_receiver.try_recv() {
				Ok(ev) => ev,
				Err(QueueError::Empty) => {
					thread::sleep(Duration::from_millis(1));
					continue;
				}
				Err(QueueError::Disconnected) => {
					error!(target: "service", "ingress queue disconnected");
					break;
				}
				Err(QueueError::Full) => {
					error!(target: "service", "unexpected Full error on try_recv");
					continue;
				}
			};

			if let Err(e) = engine.submit(ev) {
				error!(target: "service", error = %e, "rejected event");
				continue;
			}

			let trades = engine.try_flush();
			Self::publish(&trades, trade_producer);
		}

		// Drain stragglers so no accepted event is lost on teardown.
		let trades = engine.force_flush();
		Self::publish(&trades, trade_producer);
	}

	fn handle_command(engine: &mut MatchingEngine, cmd: ServiceCommand) {
		match cmd {
			ServiceCommand::SetMode { mode } => engine.set_mode(mode),
			ServiceCommand::SetWindow {
				window_ns,
				respond_to,
			} => {
				let _ = respond_to.send(engine.set_window(window_ns));
			}
			ServiceCommand::Reset => engine.reset(),
			ServiceCommand::Snapshot { respond_to } => {
				let _ = respond_to.send(engine.snapshot());
			}
			ServiceCommand::Report {
				traders,
				respond_to,
			} => {
				let _ = respond_to.send(engine.metrics().report(&traders));
			}
			ServiceCommand::Shutdown => {}
		}
	}

	fn publish(trades: &[Trade], trade_producer: &TradeProducer) {
		for trade in trades {
			if let Err(e) = trade_producer.push(trade.clone()) {
				warn!(target: "service", error = %e, "dropping trade, feed saturated");
			}
		}
	}

	/// Switch the matching discipline.
	pub fn set_mode(&self, mode: MatchingMode) -> Result<(), String> {
		self.control_tx
			.send(ServiceCommand::SetMode { mode })
			.map_err(|_| "service shut down or control channel closed".to_string())
	}

	/// Change the batching window.
	pub fn set_window(&self, window_ns: TimeNs) -> Result<(), String> {
		let (tx, rx) = bounded(1);
		self.control_tx
			.send(ServiceCommand::SetWindow {
				window_ns,
				respond_to: tx,
			})
			.map_err(|_| "service shut down or control channel closed".to_string())?;

		rx.recv()
			.map_err(|_| "request cancelled or service stopped".to_string())?
			.map_err(|e| e.to_string())
	}

	/// Reinitialise the engine, preserving mode and window.
	pub fn reset(&self) -> Result<(), String> {
		self.control_tx
			.send(ServiceCommand::Reset)
			.map_err(|_| "service shut down or control channel closed".to_string())
	}

	/// Read the book's public surface.
	pub fn snapshot(&self) -> Result<BookSnapshot, String> {
		let (tx, rx) = bounded(1);
		self.control_tx
			.send(ServiceCommand::Snapshot { respond_to: tx })
			.map_err(|_| "service shut down or control channel closed".to_string())?;

		rx.recv()
			.map_err(|_| "request cancelled or service stopped".to_string())
	}

	/// Derive the fairness report for the given participants.
	pub fn report(&self, traders: Vec<TraderProfile>) -> Result<FairnessReport, String> {
		let (tx, rx) = bounded(1);
		self.control_tx
			.send(ServiceCommand::Report {
				traders,
				respond_to: tx,
			})
			.map_err(|_| "service shut down or control channel closed".to_string())?;

		rx.recv()
			.map_err(|_| "request cancelled or service stopped".to_string())
	}

	/// Shut the service down gracefully, flushing the pending batch.
	pub fn shutdown(mut self) {
		info!(target: "service", "shutting down engine service");
		let _ = self.control_tx.send(ServiceCommand::Shutdown);
		self.shutdown.store(true, Ordering::Relaxed);

		if let Some(handle) = self.thread_handle.take()
			&& let Err(e) = handle.join()
		{
			warn!(target: "service", "matching loop thread panicked: {:?}", e);
		}
	}
}

impl Drop for EngineService {
	fn drop(&mut self) {
		self.shutdown.store(true, Ordering::Relaxed);
		if let Some(handle) = self.thread_handle.take()
			&& let Err(e) = handle.join()
		{
			let _ = Err::<(), _>(e);
		}
	}
}
