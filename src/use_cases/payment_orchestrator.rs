use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use derive_more::derive::Display;
use log::{debug, error, info, warn};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::errors::PaymentError;
use crate::domain::gateway::{CardGateway, PixGateway};
use crate::domain::payment::{
	CancelOutcome, CardType, PaymentRequest, PaymentResult, PaymentStatus, Rail,
	RailDetails,
};
use crate::infrastructure::workers::polling_scheduler::{
	PollingScheduler, PollingSession, PollingTask,
};

pub type UpdateListener = Arc<dyn Fn(&PaymentResult) + Send + Sync>;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptState {
	#[display("idle")]
	Idle,
	#[display("being created")]
	Creating,
	#[display("awaiting confirmation")]
	AwaitingConfirmation,
	#[display("approved")]
	Approved,
	#[display("rejected")]
	Rejected,
	#[display("expired")]
	Expired,
	#[display("cancelled")]
	Cancelled,
	#[display("failed")]
	Error,
}

impl AttemptState {
	fn from_status(status: PaymentStatus) -> Self {
		match status {
			PaymentStatus::Created | PaymentStatus::Pending => {
				AttemptState::AwaitingConfirmation
			}
			PaymentStatus::Approved => AttemptState::Approved,
			PaymentStatus::Rejected => AttemptState::Rejected,
			PaymentStatus::Expired => AttemptState::Expired,
			PaymentStatus::Cancelled => AttemptState::Cancelled,
			PaymentStatus::Error => AttemptState::Error,
		}
	}

	pub fn is_final(&self) -> bool {
		matches!(
			self,
			AttemptState::Approved |
				AttemptState::Rejected |
				AttemptState::Expired |
				AttemptState::Cancelled |
				AttemptState::Error
		)
	}
}

/// What the checkout flow sees of the current attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSnapshot {
	pub order_id:   String,
	pub state:      AttemptState,
	#[serde(with = "time::serde::rfc3339")]
	pub started_at: OffsetDateTime,
	pub payment:    Option<PaymentResult>,
}

struct Attempt {
	request:    PaymentRequest,
	state:      AttemptState,
	started_at: OffsetDateTime,
	latest:     Option<PaymentResult>,
	session:    Option<PollingSession>,
	cancelling: bool,
}

impl Attempt {
	fn payment_id(&self) -> Option<&str> {
		self.latest.as_ref().map(|p| p.payment_id.as_str())
	}

	fn rail(&self) -> Rail {
		self.request.method.rail()
	}

	fn settle(&mut self, result: PaymentResult) {
		self.state = AttemptState::from_status(result.status);
		if self.state.is_final() {
			self.session = None;
		}
		self.latest = Some(result);
	}

	/// Applies a poll result. Only a terminal status ends the attempt; a
	/// failed check is kept as the latest result while polling goes on.
	fn observe(&mut self, result: PaymentResult) {
		if result.status.is_terminal() {
			self.settle(result);
		} else {
			self.state = AttemptState::AwaitingConfirmation;
			self.latest = Some(result);
		}
	}

	fn mark(&mut self, status: PaymentStatus, detail: String) {
		if let Some(latest) = self.latest.as_mut() {
			latest.status = status;
			latest.status_detail = Some(detail);
		}
		self.state = AttemptState::from_status(status);
		self.session = None;
	}
}

type AttemptSlot = Arc<Mutex<Option<Attempt>>>;

fn lock(slot: &AttemptSlot) -> MutexGuard<'_, Option<Attempt>> {
	slot.lock().unwrap_or_else(PoisonError::into_inner)
}

// Status checks do not repeat the QR payload, so keep the one from creation.
fn carry_qr_code(previous: Option<&PaymentResult>, mut next: PaymentResult) -> PaymentResult {
	if let (
		Some(PaymentResult {
			details: RailDetails::Pix {
				qr_code: prev_qr,
				qr_code_copy_paste: prev_copy_paste,
			},
			..
		}),
		RailDetails::Pix {
			qr_code,
			qr_code_copy_paste,
		},
	) = (previous, &mut next.details)
	{
		if qr_code.is_none() {
			qr_code.clone_from(prev_qr);
		}
		if qr_code_copy_paste.is_none() {
			qr_code_copy_paste.clone_from(prev_copy_paste);
		}
	}
	next
}

/// Applies a poll result if it belongs to the attempt's live session.
/// Results from a session that was cancelled or replaced are stale and
/// dropped.
fn record_update(
	slot: &AttemptSlot,
	session_id: Uuid,
	result: &PaymentResult,
) -> Option<PaymentResult> {
	let mut guard = lock(slot);
	let attempt = guard.as_mut()?;

	if attempt.session.as_ref().map(PollingSession::id) != Some(session_id) {
		debug!(
			"Discarding stale update for payment {} from session {session_id}",
			result.payment_id
		);
		return None;
	}

	let merged = carry_qr_code(attempt.latest.as_ref(), result.clone());
	attempt.observe(merged.clone());
	Some(merged)
}

/// Result of `PaymentOrchestrator::start`: the creation step, plus the means
/// to wait for the final outcome.
pub struct PaymentHandle {
	initial:    PaymentResult,
	completion: Completion,
}

enum Completion {
	Settled(PaymentResult),
	Polling { task: PollingTask, slot: AttemptSlot },
}

impl PaymentHandle {
	/// For PIX the pending charge with its QR code; for card the decision.
	pub fn initial(&self) -> &PaymentResult {
		&self.initial
	}

	pub fn session(&self) -> Option<&PollingSession> {
		match &self.completion {
			Completion::Settled(_) => None,
			Completion::Polling { task, .. } => Some(task.session()),
		}
	}

	pub async fn completion(self) -> PaymentResult {
		match self.completion {
			Completion::Settled(result) => result,
			Completion::Polling { task, slot } => {
				let session_id = task.session().id();
				let payment_id = task.session().payment_id().to_string();
				let outcome = task.outcome().await;

				let mut guard = lock(&slot);
				match guard.as_mut() {
					Some(attempt)
						if attempt.session.as_ref().map(PollingSession::id) ==
							Some(session_id) =>
					{
						let merged = carry_qr_code(attempt.latest.as_ref(), outcome);
						attempt.settle(merged.clone());
						info!(
							"Payment {} finished as {}",
							merged.payment_id, attempt.state
						);
						merged
					}
					// Already settled by its last update or by a cancellation.
					Some(attempt)
						if attempt.payment_id() == Some(payment_id.as_str()) &&
							attempt.state.is_final() =>
					{
						attempt.latest.clone().unwrap_or(outcome)
					}
					_ => outcome,
				}
			}
		}
	}
}

/// Drives one checkout payment at a time across the PIX and card rails.
pub struct PaymentOrchestrator<P: PixGateway, C: CardGateway> {
	pix:       Arc<P>,
	card:      Arc<C>,
	scheduler: PollingScheduler,
	attempt:   AttemptSlot,
}

impl<P: PixGateway, C: CardGateway> Clone for PaymentOrchestrator<P, C> {
	fn clone(&self) -> Self {
		Self {
			pix:       self.pix.clone(),
			card:      self.card.clone(),
			scheduler: self.scheduler,
			attempt:   self.attempt.clone(),
		}
	}
}

impl<P: PixGateway, C: CardGateway> PaymentOrchestrator<P, C> {
	pub fn new(pix: P, card: C, scheduler: PollingScheduler) -> Self {
		Self {
			pix: Arc::new(pix),
			card: Arc::new(card),
			scheduler,
			attempt: Arc::new(Mutex::new(None)),
		}
	}

	/// Runs a payment to its final outcome. `on_update` receives the initial
	/// result and every poll result in between.
	pub async fn pay<U>(
		&self,
		request: PaymentRequest,
		on_update: U,
	) -> Result<PaymentResult, PaymentError>
	where
		U: Fn(&PaymentResult) + Send + Sync + 'static,
	{
		let handle = self.start(request, on_update).await?;
		Ok(handle.completion().await)
	}

	/// Runs the creation step and returns as soon as it is known. For PIX the
	/// status polling keeps running in the background.
	pub async fn start<U>(
		&self,
		request: PaymentRequest,
		on_update: U,
	) -> Result<PaymentHandle, PaymentError>
	where
		U: Fn(&PaymentResult) + Send + Sync + 'static,
	{
		let listener: UpdateListener = Arc::new(on_update);
		self.begin_attempt(&request)?;

		info!(
			"Starting {:?} payment of {} cents for order {}",
			request.method, request.amount_cents, request.order_id
		);

		match request.method.card_type() {
			None => Ok(self.start_pix(request, listener).await),
			Some(card_type) => {
				Ok(self.start_card(request, card_type, listener).await)
			}
		}
	}

	fn begin_attempt(&self, request: &PaymentRequest) -> Result<(), PaymentError> {
		if request.amount_cents == 0 {
			return Err(PaymentError::InvalidAmount { amount: 0.0 });
		}

		let mut guard = lock(&self.attempt);
		if let Some(current) = guard.as_ref() &&
			(!current.state.is_final() || current.cancelling)
		{
			return Err(PaymentError::AttemptInProgress {
				payment_id: current
					.payment_id()
					.unwrap_or(&current.request.order_id)
					.to_string(),
			});
		}

		*guard = Some(Attempt {
			request:    request.clone(),
			state:      AttemptState::Creating,
			started_at: OffsetDateTime::now_utc(),
			latest:     None,
			session:    None,
			cancelling: false,
		});
		Ok(())
	}

	async fn start_pix(
		&self,
		request: PaymentRequest,
		listener: UpdateListener,
	) -> PaymentHandle {
		let created = self.pix.create(&request).await;

		if created.status.is_final() {
			warn!(
				"PIX payment for order {} ended at creation as {:?}",
				request.order_id, created.status
			);
			if let Some(attempt) = lock(&self.attempt).as_mut() {
				attempt.settle(created.clone());
			}
			listener(&created);
			return PaymentHandle {
				initial:    created.clone(),
				completion: Completion::Settled(created),
			};
		}

		let session = self.scheduler.new_session(&created.payment_id);
		if let Some(attempt) = lock(&self.attempt).as_mut() {
			attempt.settle(created.clone());
			attempt.session = Some(session.clone());
		}
		listener(&created);

		let pix = self.pix.clone();
		let payment_id = created.payment_id.clone();
		let check = move || {
			let pix = pix.clone();
			let payment_id = payment_id.clone();
			async move { pix.check_status(&payment_id).await }
		};

		let slot = self.attempt.clone();
		let session_id = session.id();
		let on_update = move |result: &PaymentResult| {
			if let Some(merged) = record_update(&slot, session_id, result) {
				listener(&merged);
			}
		};

		let task = self.scheduler.run(session, check, on_update);

		PaymentHandle {
			initial:    created,
			completion: Completion::Polling {
				task,
				slot: self.attempt.clone(),
			},
		}
	}

	async fn start_card(
		&self,
		request: PaymentRequest,
		card_type: CardType,
		listener: UpdateListener,
	) -> PaymentHandle {
		let result = self
			.card
			.charge(request.amount_cents, card_type, request.installments)
			.await;

		if let Some(attempt) = lock(&self.attempt).as_mut() {
			attempt.settle(result.clone());
			info!(
				"Card payment for order {} finished as {}",
				request.order_id, attempt.state
			);
		}
		listener(&result);

		PaymentHandle {
			initial:    result.clone(),
			completion: Completion::Settled(result),
		}
	}

	/// Cancels the payment owned by the current attempt.
	///
	/// PIX: stops polling, waits for the loop to exit, then asks the provider
	/// to cancel. Card: reverses an approved charge for its original amount.
	/// An attempt that already ended is left alone and reported as success.
	pub async fn cancel(&self, payment_id: &str) -> Result<CancelOutcome, PaymentError> {
		let (rail, session, amount_cents) = {
			let mut guard = lock(&self.attempt);
			let attempt = match guard.as_mut() {
				Some(attempt) if attempt.payment_id() == Some(payment_id) => attempt,
				_ => {
					return Err(PaymentError::UnknownPayment {
						payment_id: payment_id.to_string(),
					});
				}
			};

			if attempt.cancelling {
				return Ok(CancelOutcome::succeeded(format!(
					"Cancellation of payment {payment_id} is already in progress"
				)));
			}

			let reversible =
				attempt.rail() == Rail::Card && attempt.state == AttemptState::Approved;
			if attempt.state.is_final() && !reversible {
				info!(
					"Payment {payment_id} is already {}; nothing to cancel",
					attempt.state
				);
				return Ok(CancelOutcome::succeeded(format!(
					"Payment {payment_id} is already {}; nothing to cancel",
					attempt.state
				)));
			}

			attempt.cancelling = true;
			(
				attempt.rail(),
				attempt.session.take(),
				attempt.request.amount_cents,
			)
		};

		let outcome = match rail {
			Rail::Pix => self.cancel_pix(payment_id, session).await,
			Rail::Card => self.reverse_card(payment_id, amount_cents).await,
		};

		if let Some(attempt) = lock(&self.attempt).as_mut() &&
			attempt.payment_id() == Some(payment_id)
		{
			attempt.cancelling = false;
		}

		Ok(outcome)
	}

	async fn cancel_pix(
		&self,
		payment_id: &str,
		session: Option<PollingSession>,
	) -> CancelOutcome {
		if let Some(session) = session {
			session.cancel_and_wait().await;
			debug!("Polling for payment {payment_id} stopped before cancellation");
		}

		let outcome = self.pix.cancel(payment_id).await;

		if outcome.success {
			self.mark_if_current(payment_id, PaymentStatus::Cancelled, &outcome.message);
			return outcome;
		}

		// The provider refused; find out where the payment actually stands.
		let current = self.pix.check_status(payment_id).await;
		warn!(
			"Cancellation of PIX payment {payment_id} refused ({}); provider reports {:?}",
			outcome.message, current.status
		);

		let mut guard = lock(&self.attempt);
		if let Some(attempt) = guard.as_mut() &&
			attempt.payment_id() == Some(payment_id)
		{
			if current.status.is_terminal() {
				let merged = carry_qr_code(attempt.latest.as_ref(), current);
				attempt.settle(merged);
			} else {
				error!(
					"PIX payment {payment_id} may still settle after a refused \
					 cancellation"
				);
				attempt.mark(
					PaymentStatus::Error,
					format!("Cancellation refused: {}", outcome.message),
				);
				if let Some(latest) = attempt.latest.as_mut() {
					latest.error_reason = Some(outcome.message.clone());
				}
			}
		}

		outcome
	}

	async fn reverse_card(&self, payment_id: &str, amount_cents: u64) -> CancelOutcome {
		let outcome = self.card.cancel(payment_id, amount_cents).await;
		if outcome.success {
			self.mark_if_current(payment_id, PaymentStatus::Cancelled, &outcome.message);
		}
		outcome
	}

	fn mark_if_current(&self, payment_id: &str, status: PaymentStatus, detail: &str) {
		if let Some(attempt) = lock(&self.attempt).as_mut() &&
			attempt.payment_id() == Some(payment_id)
		{
			attempt.mark(status, detail.to_string());
			info!("Payment {payment_id} is now {}", attempt.state);
		}
	}

	/// Latest known result of the current attempt.
	pub fn status(&self) -> Option<PaymentResult> {
		lock(&self.attempt).as_ref().and_then(|a| a.latest.clone())
	}

	pub fn state(&self) -> AttemptState {
		lock(&self.attempt)
			.as_ref()
			.map_or(AttemptState::Idle, |a| a.state)
	}

	pub fn snapshot(&self) -> Option<AttemptSnapshot> {
		lock(&self.attempt).as_ref().map(|a| AttemptSnapshot {
			order_id:   a.request.order_id.clone(),
			state:      a.state,
			started_at: a.started_at,
			payment:    a.latest.clone(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_attempt_state_from_status() {
		assert_eq!(
			AttemptState::from_status(PaymentStatus::Pending),
			AttemptState::AwaitingConfirmation
		);
		assert_eq!(
			AttemptState::from_status(PaymentStatus::Error),
			AttemptState::Error
		);
		assert!(AttemptState::Expired.is_final());
		assert!(!AttemptState::Creating.is_final());
	}

	#[test]
	fn test_carry_qr_code_keeps_creation_payload() {
		let mut created = PaymentResult::pix("p-1", PaymentStatus::Pending);
		created.details = RailDetails::Pix {
			qr_code:            Some("aW1n".to_string()),
			qr_code_copy_paste: Some("000201".to_string()),
		};
		let polled = PaymentResult::pix("p-1", PaymentStatus::Approved);

		let merged = carry_qr_code(Some(&created), polled);

		assert_eq!(merged.status, PaymentStatus::Approved);
		assert_eq!(merged.qr_code(), Some("aW1n"));
		assert_eq!(merged.qr_code_copy_paste(), Some("000201"));
	}

	#[tokio::test]
	async fn test_updates_from_a_replaced_session_are_discarded() {
		let scheduler = PollingScheduler::default();
		let live = scheduler.new_session("p-1");
		let replaced = scheduler.new_session("p-1");

		let request =
			PaymentRequest::new(crate::domain::payment::PaymentMethod::Pix, 3.0, "o1")
				.unwrap();
		let slot: AttemptSlot = Arc::new(Mutex::new(Some(Attempt {
			request,
			state: AttemptState::AwaitingConfirmation,
			started_at: OffsetDateTime::now_utc(),
			latest: Some(PaymentResult::pix("p-1", PaymentStatus::Pending)),
			session: Some(live.clone()),
			cancelling: false,
		})));

		let stale = PaymentResult::pix("p-1", PaymentStatus::Approved);
		assert!(record_update(&slot, replaced.id(), &stale).is_none());
		assert_eq!(
			lock(&slot).as_ref().unwrap().state,
			AttemptState::AwaitingConfirmation
		);

		let fresh = PaymentResult::pix("p-1", PaymentStatus::Rejected);
		assert!(record_update(&slot, live.id(), &fresh).is_some());
		let guard = lock(&slot);
		let attempt = guard.as_ref().unwrap();
		assert_eq!(attempt.state, AttemptState::Rejected);
		assert!(attempt.session.is_none());
	}

	#[tokio::test]
	async fn test_failed_check_keeps_the_session_attached() {
		let session = PollingScheduler::default().new_session("p-1");
		let request =
			PaymentRequest::new(crate::domain::payment::PaymentMethod::Pix, 3.0, "o1")
				.unwrap();
		let slot: AttemptSlot = Arc::new(Mutex::new(Some(Attempt {
			request,
			state: AttemptState::AwaitingConfirmation,
			started_at: OffsetDateTime::now_utc(),
			latest: Some(PaymentResult::pix("p-1", PaymentStatus::Pending)),
			session: Some(session.clone()),
			cancelling: false,
		})));

		let failed = PaymentResult::pix("p-1", PaymentStatus::Error)
			.with_error("Could not reach payment backend");
		assert!(record_update(&slot, session.id(), &failed).is_some());

		let guard = lock(&slot);
		let attempt = guard.as_ref().unwrap();
		assert_eq!(attempt.state, AttemptState::AwaitingConfirmation);
		assert_eq!(attempt.session.as_ref().map(PollingSession::id), Some(session.id()));
		assert_eq!(
			attempt.latest.as_ref().and_then(|l| l.error_reason.as_deref()),
			Some("Could not reach payment backend")
		);
	}
}
