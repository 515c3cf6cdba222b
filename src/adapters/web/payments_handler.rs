use actix_web::{HttpResponse, web};
use log::{debug, info};

use crate::adapters::web::errors::ApiError;
use crate::adapters::web::schema::PaymentRequest;
use crate::domain::gateway::{CardGateway, PixGateway};
use crate::use_cases::dto::StartPaymentCommand;
use crate::use_cases::payment_orchestrator::PaymentOrchestrator;

/// Starts a payment and answers with its first result. For PIX that carries
/// the QR code; polling continues after the response is sent.
pub async fn start_payment<P: PixGateway, C: CardGateway>(
	payload: web::Json<PaymentRequest>,
	orchestrator: web::Data<PaymentOrchestrator<P, C>>,
) -> Result<HttpResponse, ApiError> {
	let payload = payload.into_inner();
	let command = StartPaymentCommand {
		method:       payload.method,
		amount:       payload.amount,
		order_id:     payload.order_id,
		email:        payload.email,
		payer_name:   payload.payer_name,
		installments: payload.installments,
	};

	let request = command.into_request()?;
	let handle = orchestrator
		.start(request, |update| {
			debug!("Payment {} is now {:?}", update.payment_id, update.status);
		})
		.await?;

	let initial = handle.initial().clone();
	if handle.session().is_some() {
		actix_web::rt::spawn(async move {
			let outcome = handle.completion().await;
			info!(
				"Background polling for payment {} ended as {:?}",
				outcome.payment_id, outcome.status
			);
		});
	}

	Ok(HttpResponse::Created().json(initial))
}
