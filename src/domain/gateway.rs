use async_trait::async_trait;

use crate::domain::payment::{CancelOutcome, CardType, PaymentRequest, PaymentResult};

/// Asynchronous QR rail. Settlement happens out-of-band, so callers create
/// the charge and then poll `check_status` until it is terminal.
///
/// Implementations never fail: transport problems come back as a result with
/// `PaymentStatus::Error`.
#[async_trait]
pub trait PixGateway: Send + Sync + 'static {
	async fn create(&self, request: &PaymentRequest) -> PaymentResult;
	async fn check_status(&self, payment_id: &str) -> PaymentResult;
	async fn cancel(&self, payment_id: &str) -> CancelOutcome;
}

/// Synchronous card rail backed by a pin pad: one request, one decision.
#[async_trait]
pub trait CardGateway: Send + Sync + 'static {
	async fn charge(
		&self,
		amount_cents: u64,
		card_type: CardType,
		installments: u32,
	) -> PaymentResult;
	async fn cancel(&self, payment_id: &str, amount_cents: u64) -> CancelOutcome;
}
