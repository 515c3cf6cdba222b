use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::domain::gateway::PixGateway;
use crate::domain::payment::{
	CancelOutcome, PaymentRequest, PaymentResult, PaymentStatus, RailDetails,
	cents_to_decimal,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePixRequest<'a> {
	amount:      f64,
	description: String,
	order_id:    &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	email:       Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	payer_name:  Option<&'a str>,
}

#[derive(Debug, Deserialize, Default)]
struct CreatePixResponse {
	#[serde(default)]
	id:             Option<serde_json::Value>,
	#[serde(default)]
	qr_code_base64: Option<String>,
	#[serde(default)]
	qr_code:        Option<String>,
	#[serde(default)]
	status:         Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PixStatusResponse {
	#[serde(default)]
	id:            Option<serde_json::Value>,
	#[serde(default)]
	status:        Option<String>,
	#[serde(default)]
	status_detail: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ProviderMessage {
	#[serde(default)]
	message: Option<String>,
	#[serde(default)]
	error:   Option<String>,
}

/// Maps the provider's status vocabulary onto `PaymentStatus`. Anything the
/// provider may add later is treated as still pending.
pub fn map_provider_status(status: Option<&str>) -> PaymentStatus {
	match status.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
		Some("approved") => PaymentStatus::Approved,
		Some("rejected") => PaymentStatus::Rejected,
		Some("cancelled" | "canceled" | "refunded" | "charged_back") => {
			PaymentStatus::Cancelled
		}
		Some("expired") => PaymentStatus::Expired,
		Some("created") => PaymentStatus::Created,
		_ => PaymentStatus::Pending,
	}
}

// Payment ids come back as numbers from some providers and strings from others.
pub(crate) fn id_to_string(id: Option<serde_json::Value>) -> Option<String> {
	match id? {
		serde_json::Value::String(s) if !s.is_empty() => Some(s),
		serde_json::Value::Number(n) => Some(n.to_string()),
		_ => None,
	}
}

#[derive(Clone)]
pub struct PixRail {
	http_client: Client,
	backend_url: String,
	api_token:   Option<String>,
}

impl PixRail {
	pub fn new(
		http_client: Client,
		backend_url: impl Into<String>,
		api_token: Option<String>,
	) -> Self {
		Self {
			http_client,
			backend_url: backend_url.into().trim_end_matches('/').to_string(),
			api_token,
		}
	}

	fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
		match &self.api_token {
			Some(token) => builder.bearer_auth(token),
			None => builder,
		}
	}

	async fn provider_message(resp: Response) -> Option<String> {
		let body = resp.json::<ProviderMessage>().await.ok()?;
		body.message.or(body.error)
	}
}

#[async_trait]
impl PixGateway for PixRail {
	async fn create(&self, request: &PaymentRequest) -> PaymentResult {
		let body = CreatePixRequest {
			amount:      cents_to_decimal(request.amount_cents),
			description: format!("Kiosk order {}", request.order_id),
			order_id:    &request.order_id,
			email:       request.email.as_deref(),
			payer_name:  request.payer_name.as_deref(),
		};

		let resp = match self
			.authorized(
				self.http_client
					.post(format!("{}/api/payment/create-pix", self.backend_url)),
			)
			.json(&body)
			.send()
			.await
		{
			Ok(resp) => resp,
			Err(e) => {
				error!("Failed to create PIX payment for order {}: {e}", request.order_id);
				return PaymentResult::pix("", PaymentStatus::Error)
					.with_error(format!("Could not reach payment backend: {e}"));
			}
		};

		let status_code = resp.status();
		if !status_code.is_success() {
			let reason = Self::provider_message(resp)
				.await
				.unwrap_or_else(|| format!("Payment backend returned {status_code}"));
			error!(
				"PIX creation for order {} failed with status {status_code}: {reason}",
				request.order_id
			);
			return PaymentResult::pix("", PaymentStatus::Error).with_error(reason);
		}

		let created = match resp.json::<CreatePixResponse>().await {
			Ok(created) => created,
			Err(e) => {
				error!("Failed to parse PIX creation response: {e}");
				return PaymentResult::pix("", PaymentStatus::Error)
					.with_error(format!("Unreadable payment backend response: {e}"));
			}
		};

		let Some(payment_id) = id_to_string(created.id) else {
			error!("PIX creation response for order {} had no id", request.order_id);
			return PaymentResult::pix("", PaymentStatus::Error)
				.with_error("Payment backend did not return a payment id");
		};

		// A freshly created charge is waiting for the customer regardless of
		// what the provider calls it.
		let status = match map_provider_status(created.status.as_deref()) {
			PaymentStatus::Created => PaymentStatus::Pending,
			status => status,
		};

		info!("PIX payment {payment_id} created for order {}", request.order_id);

		PaymentResult {
			payment_id,
			status,
			details: RailDetails::Pix {
				qr_code:            created.qr_code_base64,
				qr_code_copy_paste: created.qr_code,
			},
			status_detail: None,
			error_reason: None,
		}
	}

	async fn check_status(&self, payment_id: &str) -> PaymentResult {
		let resp = match self
			.authorized(self.http_client.get(format!(
				"{}/api/payment/status/{payment_id}",
				self.backend_url
			)))
			.send()
			.await
		{
			Ok(resp) => resp,
			Err(e) => {
				warn!("Failed to check status of PIX payment {payment_id}: {e}");
				return PaymentResult::pix(payment_id, PaymentStatus::Error)
					.with_error(format!("Could not reach payment backend: {e}"));
			}
		};

		let status_code = resp.status();
		if !status_code.is_success() {
			let reason = Self::provider_message(resp)
				.await
				.unwrap_or_else(|| format!("Payment backend returned {status_code}"));
			warn!("Status check for PIX payment {payment_id} failed: {reason}");
			return PaymentResult::pix(payment_id, PaymentStatus::Error).with_error(reason);
		}

		let body = resp.json::<PixStatusResponse>().await.unwrap_or_else(|e| {
			warn!("Unreadable status for PIX payment {payment_id}: {e}");
			PixStatusResponse::default()
		});

		let mut result = PaymentResult::pix(
			id_to_string(body.id).unwrap_or_else(|| payment_id.to_string()),
			map_provider_status(body.status.as_deref()),
		);
		result.status_detail = body.status_detail;
		result
	}

	async fn cancel(&self, payment_id: &str) -> CancelOutcome {
		let resp = match self
			.authorized(self.http_client.delete(format!(
				"{}/api/payment/cancel/{payment_id}",
				self.backend_url
			)))
			.send()
			.await
		{
			Ok(resp) => resp,
			Err(e) => {
				error!("Failed to cancel PIX payment {payment_id}: {e}");
				return CancelOutcome::failed(format!(
					"Could not reach payment backend: {e}"
				));
			}
		};

		let status_code = resp.status();
		let message = Self::provider_message(resp).await;

		if status_code.is_success() {
			info!("PIX payment {payment_id} cancelled");
			CancelOutcome::succeeded(
				message.unwrap_or_else(|| "Payment cancelled".to_string()),
			)
		} else {
			warn!("Provider refused to cancel PIX payment {payment_id}: {status_code}");
			CancelOutcome::failed(
				message.unwrap_or_else(|| format!("Payment backend returned {status_code}")),
			)
		}
	}
}
