use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, sleep_until};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::payment::{PaymentResult, PaymentStatus};
use crate::infrastructure::config::settings::{
	DEFAULT_PIX_POLL_INTERVAL_MS, DEFAULT_PIX_POLL_TIMEOUT_MS,
};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Repeatedly runs a status check on a fixed cadence until the payment
/// reaches a terminal status, the deadline passes or the session is
/// cancelled.
///
/// Checks never overlap: the next tick waits until the previous check has
/// returned and its update has been delivered. A tick that falls due while a
/// check is still running fires as soon as that check is done.
#[derive(Debug, Clone, Copy)]
pub struct PollingScheduler {
	interval: Duration,
	timeout:  Duration,
}

impl Default for PollingScheduler {
	fn default() -> Self {
		Self::new(
			Duration::from_millis(DEFAULT_PIX_POLL_INTERVAL_MS),
			Duration::from_millis(DEFAULT_PIX_POLL_TIMEOUT_MS),
		)
	}
}

impl PollingScheduler {
	pub fn new(interval: Duration, timeout: Duration) -> Self {
		Self {
			interval: interval.max(MIN_INTERVAL),
			timeout,
		}
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Spawns the poll loop for `payment_id`. The first check runs
	/// immediately.
	///
	/// `on_update` sees every check result in the order the checks were
	/// issued, terminal or not, and is never called once the session has
	/// been cancelled. It runs while the session holds its cancellation
	/// gate, so it must not call `cancel` on its own session directly.
	pub fn start<C, F, U>(
		&self,
		payment_id: impl Into<String>,
		check: C,
		on_update: U,
	) -> PollingTask
	where
		C: Fn() -> F + Send + 'static,
		F: Future<Output = PaymentResult> + Send + 'static,
		U: Fn(&PaymentResult) + Send + 'static,
	{
		let session = self.new_session(payment_id);
		self.run(session, check, on_update)
	}

	/// Creates a session without starting it, so callers can register the
	/// session before its first update can arrive. The deadline counts from
	/// here.
	pub fn new_session(&self, payment_id: impl Into<String>) -> PollingSession {
		PollingSession {
			id:          Uuid::new_v4(),
			payment_id:  payment_id.into(),
			interval:    self.interval,
			deadline_at: Instant::now() + self.timeout,
			cancelled:   CancellationToken::new(),
			finished:    CancellationToken::new(),
			gate:        Arc::new(Mutex::new(())),
		}
	}

	pub fn run<C, F, U>(
		&self,
		session: PollingSession,
		check: C,
		on_update: U,
	) -> PollingTask
	where
		C: Fn() -> F + Send + 'static,
		F: Future<Output = PaymentResult> + Send + 'static,
		U: Fn(&PaymentResult) + Send + 'static,
	{
		info!(
			"Polling payment {} every {:?} for up to {:?} (session {})",
			session.payment_id, session.interval, self.timeout, session.id
		);

		let handle = tokio::spawn(poll_loop(session.clone(), check, on_update));

		PollingTask { session, handle }
	}
}

/// Handle on one running poll loop. Cheap to clone; every clone controls the
/// same loop.
#[derive(Debug, Clone)]
pub struct PollingSession {
	id:          Uuid,
	payment_id:  String,
	interval:    Duration,
	deadline_at: Instant,
	cancelled:   CancellationToken,
	finished:    CancellationToken,
	gate:        Arc<Mutex<()>>,
}

impl PollingSession {
	pub fn id(&self) -> Uuid {
		self.id
	}

	pub fn payment_id(&self) -> &str {
		&self.payment_id
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.is_cancelled()
	}

	/// True once the loop has exited, whatever the reason.
	pub fn is_finished(&self) -> bool {
		self.finished.is_cancelled()
	}

	/// Stops the loop. Once this returns no further check is issued and
	/// `on_update` is not called again. A check already in flight is dropped
	/// and its result discarded. Calling it again, or after the loop has
	/// finished, does nothing.
	pub fn cancel(&self) {
		let _gate = self.lock_gate();
		if !self.cancelled.is_cancelled() {
			debug!("Cancelling polling session {}", self.id);
			self.cancelled.cancel();
		}
	}

	/// Cancels and waits until the loop task has exited.
	pub async fn cancel_and_wait(&self) {
		self.cancel();
		self.finished.cancelled().await;
	}

	fn lock_gate(&self) -> MutexGuard<'_, ()> {
		self.gate.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

pub struct PollingTask {
	session: PollingSession,
	handle:  JoinHandle<PaymentResult>,
}

impl PollingTask {
	pub fn session(&self) -> &PollingSession {
		&self.session
	}

	/// Waits for the loop to resolve. Yields the terminal result, or the last
	/// observed result marked `Expired` or `Cancelled`.
	pub async fn outcome(self) -> PaymentResult {
		match self.handle.await {
			Ok(result) => result,
			Err(e) => {
				error!(
					"Polling session {} for payment {} aborted: {e}",
					self.session.id, self.session.payment_id
				);
				PaymentResult::pix(&self.session.payment_id, PaymentStatus::Error)
					.with_error(format!("Status polling stopped unexpectedly: {e}"))
			}
		}
	}
}

fn conclude(
	session: &PollingSession,
	last: Option<PaymentResult>,
	status: PaymentStatus,
	detail: &str,
) -> PaymentResult {
	let mut result = last.unwrap_or_else(|| {
		PaymentResult::pix(session.payment_id.clone(), status)
	});
	result.status = status;
	result.status_detail = Some(detail.to_string());
	result.error_reason = None;
	result
}

async fn poll_loop<C, F, U>(
	session: PollingSession,
	check: C,
	on_update: U,
) -> PaymentResult
where
	C: Fn() -> F + Send + 'static,
	F: Future<Output = PaymentResult> + Send + 'static,
	U: Fn(&PaymentResult) + Send + 'static,
{
	let _finished = session.finished.clone().drop_guard();
	let mut ticker = tokio::time::interval(session.interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	let mut last: Option<PaymentResult> = None;
	let mut checks: u64 = 0;

	loop {
		tokio::select! {
			biased;
			_ = session.cancelled.cancelled() => {
				info!("Polling session {} cancelled after {checks} checks", session.id);
				return conclude(&session, last, PaymentStatus::Cancelled, "Payment cancelled");
			}
			_ = sleep_until(session.deadline_at) => {
				warn!(
					"Payment {} still not settled after {checks} checks; giving up",
					session.payment_id
				);
				return conclude(&session, last, PaymentStatus::Expired, "Payment window expired");
			}
			_ = ticker.tick() => {}
		}

		let in_flight = {
			let _gate = session.lock_gate();
			if session.cancelled.is_cancelled() {
				continue;
			}
			checks += 1;
			check()
		};

		let result = tokio::select! {
			biased;
			_ = session.cancelled.cancelled() => {
				debug!("Discarding in-flight check {checks} of session {}", session.id);
				continue;
			}
			_ = sleep_until(session.deadline_at) => {
				debug!("Check {checks} of session {} outlived the deadline", session.id);
				continue;
			}
			result = in_flight => result,
		};

		{
			let _gate = session.lock_gate();
			if session.cancelled.is_cancelled() {
				continue;
			}
			on_update(&result);
		}

		debug!(
			"Check {checks} of payment {} returned {:?}",
			session.payment_id, result.status
		);

		if result.status.is_terminal() {
			info!(
				"Payment {} settled as {:?} after {checks} checks",
				session.payment_id, result.status
			);
			return result;
		}

		last = Some(result);
	}
}
