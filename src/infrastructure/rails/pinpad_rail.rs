use std::time::Duration;

use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::gateway::CardGateway;
use crate::domain::payment::{CancelOutcome, CardType, PaymentResult, PaymentStatus};
use crate::infrastructure::rails::pix_rail::id_to_string;

#[derive(Debug, Serialize)]
pub struct ChargeRequest {
	pub valor:    u64,
	pub tipo:     CardType,
	pub parcelas: u32,
}

#[derive(Debug, Serialize)]
pub struct ReversalRequest<'a> {
	pub nsu:   &'a str,
	pub valor: u64,
}

#[derive(Debug, Deserialize)]
pub struct PinpadResponse {
	pub aprovado: bool,
	#[serde(default)]
	pub nsu:      Option<serde_json::Value>,
	#[serde(default)]
	pub mensagem: Option<String>,
}

#[derive(Clone)]
pub struct PinpadRail {
	http_client: Client,
	pinpad_url:  String,
	timeout:     Duration,
}

impl PinpadRail {
	pub fn new(
		http_client: Client,
		pinpad_url: impl Into<String>,
		timeout: Duration,
	) -> Self {
		Self {
			http_client,
			pinpad_url: pinpad_url.into().trim_end_matches('/').to_string(),
			timeout,
		}
	}

	/// Sends one request to the pin pad and waits for its decision. A body
	/// that parses as a device answer wins over the HTTP status, since some
	/// devices report declines with a 4xx.
	async fn exchange<B: Serialize>(
		&self,
		path: &str,
		body: &B,
	) -> Result<PinpadResponse, String> {
		let resp = self
			.http_client
			.post(format!("{}{path}", self.pinpad_url))
			.timeout(self.timeout)
			.json(body)
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() {
					format!(
						"Pin pad did not answer within {} seconds",
						self.timeout.as_secs()
					)
				} else {
					format!("Could not reach pin pad: {e}")
				}
			})?;

		let status_code = resp.status();
		let bytes = resp
			.bytes()
			.await
			.map_err(|e| format!("Failed to read pin pad response: {e}"))?;

		match serde_json::from_slice::<PinpadResponse>(&bytes) {
			Ok(answer) => Ok(answer),
			Err(_) if !status_code.is_success() => {
				Err(format!("Pin pad returned {status_code}"))
			}
			Err(e) => Err(format!("Unreadable pin pad response: {e}")),
		}
	}
}

#[async_trait]
impl CardGateway for PinpadRail {
	async fn charge(
		&self,
		amount_cents: u64,
		card_type: CardType,
		installments: u32,
	) -> PaymentResult {
		let installments = installments.max(1);
		let body = ChargeRequest {
			valor:    amount_cents,
			tipo:     card_type,
			parcelas: installments,
		};

		info!(
			"Sending {card_type:?} charge of {amount_cents} cents to pin pad \
			 ({installments}x)"
		);

		match self.exchange("/api/pagamento", &body).await {
			Ok(answer) => {
				let nsu = id_to_string(answer.nsu);
				if answer.aprovado && nsu.is_none() {
					error!(
						"Pin pad approved a charge of {amount_cents} cents without an nsu; \
						 it cannot be reversed from the kiosk"
					);
				}
				let payment_id = nsu.unwrap_or_default();
				let status = if answer.aprovado {
					PaymentStatus::Approved
				} else {
					PaymentStatus::Rejected
				};

				let mut result = PaymentResult::card(payment_id, status, installments);
				result.status_detail = answer.mensagem;

				if answer.aprovado {
					info!("Card charge approved with nsu {}", result.payment_id);
				} else {
					warn!(
						"Card charge rejected: {}",
						result.status_detail.as_deref().unwrap_or("no message")
					);
				}
				result
			}
			Err(reason) => {
				error!("Card charge failed: {reason}");
				PaymentResult::card("", PaymentStatus::Error, installments)
					.with_error(reason)
			}
		}
	}

	async fn cancel(&self, payment_id: &str, amount_cents: u64) -> CancelOutcome {
		let body = ReversalRequest {
			nsu:   payment_id,
			valor: amount_cents,
		};

		match self.exchange("/api/cancelar", &body).await {
			Ok(answer) => {
				let message = answer.mensagem.unwrap_or_else(|| {
					if answer.aprovado {
						"Transaction reversed".to_string()
					} else {
						"Reversal declined by pin pad".to_string()
					}
				});
				if answer.aprovado {
					info!("Card transaction {payment_id} reversed");
				} else {
					warn!("Reversal of card transaction {payment_id} declined: {message}");
				}
				CancelOutcome {
					success: answer.aprovado,
					message,
				}
			}
			Err(reason) => {
				error!("Reversal of card transaction {payment_id} failed: {reason}");
				CancelOutcome::failed(reason)
			}
		}
	}
}
