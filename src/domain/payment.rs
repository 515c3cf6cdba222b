use serde::{Deserialize, Serialize};

use crate::domain::errors::PaymentError;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
	Pix,
	Credit,
	Debit,
}

impl PaymentMethod {
	pub fn rail(&self) -> Rail {
		match self {
			PaymentMethod::Pix => Rail::Pix,
			PaymentMethod::Credit | PaymentMethod::Debit => Rail::Card,
		}
	}

	pub fn card_type(&self) -> Option<CardType> {
		match self {
			PaymentMethod::Pix => None,
			PaymentMethod::Credit => Some(CardType::Credit),
			PaymentMethod::Debit => Some(CardType::Debit),
		}
	}
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rail {
	Pix,
	Card,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
	#[serde(rename = "credito")]
	Credit,
	#[serde(rename = "debito")]
	Debit,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
	Created,
	Pending,
	Approved,
	Rejected,
	Expired,
	Cancelled,
	Error,
}

impl PaymentStatus {
	/// No further transitions happen once a payment reaches one of these.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			PaymentStatus::Approved |
				PaymentStatus::Rejected |
				PaymentStatus::Expired |
				PaymentStatus::Cancelled
		)
	}

	/// Terminal for one checkout attempt. Includes `Error`, which a poll
	/// loop treats as transient but the orchestrator reports as final.
	pub fn is_final(&self) -> bool {
		self.is_terminal() || matches!(self, PaymentStatus::Error)
	}
}

/// Converts a decimal currency amount into integer minor units.
///
/// This is the only place where floating point amounts are rounded; from
/// here on every component works with cents.
pub fn to_cents(amount: f64) -> Result<u64, PaymentError> {
	if !amount.is_finite() || amount <= 0.0 {
		return Err(PaymentError::InvalidAmount { amount });
	}

	let cents = (amount * 100.0).round();
	if cents < 1.0 || cents > u64::MAX as f64 {
		return Err(PaymentError::InvalidAmount { amount });
	}

	Ok(cents as u64)
}

pub fn cents_to_decimal(amount_cents: u64) -> f64 {
	amount_cents as f64 / 100.0
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
	pub method:       PaymentMethod,
	pub amount_cents: u64,
	pub order_id:     String,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub email:        Option<String>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub payer_name:   Option<String>,
	pub installments: u32,
}

impl PaymentRequest {
	pub fn new(
		method: PaymentMethod,
		amount: f64,
		order_id: impl Into<String>,
	) -> Result<Self, PaymentError> {
		Ok(Self {
			method,
			amount_cents: to_cents(amount)?,
			order_id: order_id.into(),
			email: None,
			payer_name: None,
			installments: 1,
		})
	}

	pub fn with_payer(
		mut self,
		email: Option<String>,
		payer_name: Option<String>,
	) -> Self {
		self.email = email;
		self.payer_name = payer_name;
		self
	}

	pub fn with_installments(mut self, installments: u32) -> Self {
		self.installments = installments.max(1);
		self
	}
}

/// Fields that only exist on one of the rails.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "rail", rename_all = "UPPERCASE")]
pub enum RailDetails {
	#[serde(rename_all = "camelCase")]
	Pix {
		#[serde(skip_serializing_if = "Option::is_none", default)]
		qr_code:            Option<String>,
		#[serde(skip_serializing_if = "Option::is_none", default)]
		qr_code_copy_paste: Option<String>,
	},
	#[serde(rename_all = "camelCase")]
	Card { installments: u32 },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
	pub payment_id:    String,
	pub status:        PaymentStatus,
	#[serde(flatten)]
	pub details:       RailDetails,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub status_detail: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub error_reason:  Option<String>,
}

impl PaymentResult {
	pub fn pix(payment_id: impl Into<String>, status: PaymentStatus) -> Self {
		Self {
			payment_id: payment_id.into(),
			status,
			details: RailDetails::Pix {
				qr_code:            None,
				qr_code_copy_paste: None,
			},
			status_detail: None,
			error_reason: None,
		}
	}

	pub fn card(
		payment_id: impl Into<String>,
		status: PaymentStatus,
		installments: u32,
	) -> Self {
		Self {
			payment_id: payment_id.into(),
			status,
			details: RailDetails::Card { installments },
			status_detail: None,
			error_reason: None,
		}
	}

	pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
		self.status_detail = Some(detail.into());
		self
	}

	pub fn with_error(mut self, reason: impl Into<String>) -> Self {
		self.status = PaymentStatus::Error;
		self.error_reason = Some(reason.into());
		self
	}

	pub fn rail(&self) -> Rail {
		match self.details {
			RailDetails::Pix { .. } => Rail::Pix,
			RailDetails::Card { .. } => Rail::Card,
		}
	}

	pub fn qr_code(&self) -> Option<&str> {
		match &self.details {
			RailDetails::Pix { qr_code, .. } => qr_code.as_deref(),
			RailDetails::Card { .. } => None,
		}
	}

	pub fn qr_code_copy_paste(&self) -> Option<&str> {
		match &self.details {
			RailDetails::Pix {
				qr_code_copy_paste, ..
			} => qr_code_copy_paste.as_deref(),
			RailDetails::Card { .. } => None,
		}
	}
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
	pub success: bool,
	pub message: String,
}

impl CancelOutcome {
	pub fn succeeded(message: impl Into<String>) -> Self {
		Self {
			success: true,
			message: message.into(),
		}
	}

	pub fn failed(message: impl Into<String>) -> Self {
		Self {
			success: false,
			message: message.into(),
		}
	}
}
