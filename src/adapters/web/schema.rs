use serde::{Deserialize, Serialize};

use crate::domain::payment::PaymentMethod;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
	pub method:       PaymentMethod,
	pub amount:       f64,
	pub order_id:     String,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub email:        Option<String>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub payer_name:   Option<String>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub installments: Option<u32>,
}
