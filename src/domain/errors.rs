use derive_more::derive::{Display, Error};

/// Failures that indicate a misuse of the orchestrator rather than a payment
/// outcome. Provider rejections, transport failures and timeouts are never
/// reported through this type; they travel inside `PaymentResult`.
#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum PaymentError {
	#[display("Invalid payment amount: {amount}.")]
	InvalidAmount { amount: f64 },
	#[display("Payment {payment_id} is still in progress.")]
	AttemptInProgress { payment_id: String },
	#[display("No payment with id {payment_id} is owned by this checkout.")]
	UnknownPayment { payment_id: String },
}
