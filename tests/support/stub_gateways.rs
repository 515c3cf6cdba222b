use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kiosk_payments::domain::gateway::{CardGateway, PixGateway};
use kiosk_payments::domain::payment::{
	CancelOutcome, CardType, PaymentRequest, PaymentResult, PaymentStatus, RailDetails,
};

pub const QR_CODE: &str = "aVZCT1J3MEtHZ29BQUFBTlNVaEVVZw==";
pub const QR_COPY_PASTE: &str = "00020126580014br.gov.bcb.pix0136kiosk";

struct PixState {
	payment_id:     String,
	create_fails:   AtomicBool,
	statuses:       Mutex<VecDeque<PaymentStatus>>,
	check_delay:    Mutex<Duration>,
	cancel_accepts: AtomicBool,
	created:        Mutex<Vec<PaymentRequest>>,
	checks:         AtomicUsize,
	in_flight:      AtomicUsize,
	max_in_flight:  AtomicUsize,
	cancels:        Mutex<Vec<String>>,
}

/// Scripted PIX provider. Status checks walk through the script and then
/// keep repeating its last entry.
#[derive(Clone)]
pub struct StubPix {
	state: Arc<PixState>,
}

impl StubPix {
	pub fn new(payment_id: &str) -> Self {
		Self {
			state: Arc::new(PixState {
				payment_id:     payment_id.to_string(),
				create_fails:   AtomicBool::new(false),
				statuses:       Mutex::new(VecDeque::from([PaymentStatus::Pending])),
				check_delay:    Mutex::new(Duration::ZERO),
				cancel_accepts: AtomicBool::new(true),
				created:        Mutex::new(Vec::new()),
				checks:         AtomicUsize::new(0),
				in_flight:      AtomicUsize::new(0),
				max_in_flight:  AtomicUsize::new(0),
				cancels:        Mutex::new(Vec::new()),
			}),
		}
	}

	pub fn with_statuses(self, statuses: &[PaymentStatus]) -> Self {
		*self.state.statuses.lock().unwrap() = statuses.iter().copied().collect();
		self
	}

	pub fn failing_creation(self) -> Self {
		self.state.create_fails.store(true, Ordering::SeqCst);
		self
	}

	pub fn with_check_delay(self, delay: Duration) -> Self {
		*self.state.check_delay.lock().unwrap() = delay;
		self
	}

	pub fn refusing_cancel(self) -> Self {
		self.state.cancel_accepts.store(false, Ordering::SeqCst);
		self
	}

	pub fn created(&self) -> Vec<PaymentRequest> {
		self.state.created.lock().unwrap().clone()
	}

	pub fn checks(&self) -> usize {
		self.state.checks.load(Ordering::SeqCst)
	}

	pub fn max_in_flight(&self) -> usize {
		self.state.max_in_flight.load(Ordering::SeqCst)
	}

	pub fn cancels(&self) -> Vec<String> {
		self.state.cancels.lock().unwrap().clone()
	}

	fn next_status(&self) -> PaymentStatus {
		let mut statuses = self.state.statuses.lock().unwrap();
		if statuses.len() > 1 {
			statuses.pop_front().unwrap()
		} else {
			statuses.front().copied().unwrap_or(PaymentStatus::Pending)
		}
	}
}

#[async_trait]
impl PixGateway for StubPix {
	async fn create(&self, request: &PaymentRequest) -> PaymentResult {
		self.state.created.lock().unwrap().push(request.clone());

		if self.state.create_fails.load(Ordering::SeqCst) {
			return PaymentResult::pix("", PaymentStatus::Error)
				.with_error("Payment backend returned 503 Service Unavailable");
		}

		PaymentResult {
			payment_id:    self.state.payment_id.clone(),
			status:        PaymentStatus::Pending,
			details:       RailDetails::Pix {
				qr_code:            Some(QR_CODE.to_string()),
				qr_code_copy_paste: Some(QR_COPY_PASTE.to_string()),
			},
			status_detail: None,
			error_reason:  None,
		}
	}

	async fn check_status(&self, payment_id: &str) -> PaymentResult {
		self.state.checks.fetch_add(1, Ordering::SeqCst);
		let running = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.state.max_in_flight.fetch_max(running, Ordering::SeqCst);

		let delay = *self.state.check_delay.lock().unwrap();
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}

		self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
		PaymentResult::pix(payment_id, self.next_status())
	}

	async fn cancel(&self, payment_id: &str) -> CancelOutcome {
		self.state.cancels.lock().unwrap().push(payment_id.to_string());
		if self.state.cancel_accepts.load(Ordering::SeqCst) {
			CancelOutcome::succeeded("Payment cancelled")
		} else {
			CancelOutcome::failed("Payment can no longer be cancelled")
		}
	}
}

struct CardState {
	approve:   bool,
	nsu:       String,
	message:   String,
	charges:   Mutex<Vec<(u64, CardType, u32)>>,
	reversals: Mutex<Vec<(String, u64)>>,
}

/// Pin pad stand-in that answers every charge the same way.
#[derive(Clone)]
pub struct StubCard {
	state: Arc<CardState>,
}

impl StubCard {
	pub fn approving(nsu: &str) -> Self {
		Self::build(true, nsu, "Transacao aprovada")
	}

	pub fn rejecting(message: &str) -> Self {
		Self::build(false, "", message)
	}

	fn build(approve: bool, nsu: &str, message: &str) -> Self {
		Self {
			state: Arc::new(CardState {
				approve,
				nsu: nsu.to_string(),
				message: message.to_string(),
				charges: Mutex::new(Vec::new()),
				reversals: Mutex::new(Vec::new()),
			}),
		}
	}

	pub fn charges(&self) -> Vec<(u64, CardType, u32)> {
		self.state.charges.lock().unwrap().clone()
	}

	pub fn reversals(&self) -> Vec<(String, u64)> {
		self.state.reversals.lock().unwrap().clone()
	}
}

#[async_trait]
impl CardGateway for StubCard {
	async fn charge(
		&self,
		amount_cents: u64,
		card_type: CardType,
		installments: u32,
	) -> PaymentResult {
		self.state
			.charges
			.lock()
			.unwrap()
			.push((amount_cents, card_type, installments));

		let status = if self.state.approve {
			PaymentStatus::Approved
		} else {
			PaymentStatus::Rejected
		};
		PaymentResult::card(self.state.nsu.clone(), status, installments)
			.with_detail(self.state.message.clone())
	}

	async fn cancel(&self, payment_id: &str, amount_cents: u64) -> CancelOutcome {
		self.state
			.reversals
			.lock()
			.unwrap()
			.push((payment_id.to_string(), amount_cents));

		CancelOutcome::succeeded("Transacao cancelada")
	}
}
