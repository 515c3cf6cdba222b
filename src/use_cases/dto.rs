use serde::{Deserialize, Serialize};

use crate::domain::errors::PaymentError;
use crate::domain::payment::{PaymentMethod, PaymentRequest};

/// A checkout request as the kiosk expresses it, with a decimal amount.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StartPaymentCommand {
	pub method:       PaymentMethod,
	pub amount:       f64,
	pub order_id:     String,
	pub email:        Option<String>,
	pub payer_name:   Option<String>,
	pub installments: Option<u32>,
}

impl StartPaymentCommand {
	pub fn into_request(self) -> Result<PaymentRequest, PaymentError> {
		let request = PaymentRequest::new(self.method, self.amount, self.order_id)?
			.with_payer(self.email, self.payer_name);

		Ok(match self.installments {
			Some(installments) => request.with_installments(installments),
			None => request,
		})
	}
}
