use actix_web::{HttpResponse, web};

use crate::adapters::web::errors::ApiError;
use crate::domain::gateway::{CardGateway, PixGateway};
use crate::use_cases::payment_orchestrator::PaymentOrchestrator;

pub async fn current_payment<P: PixGateway, C: CardGateway>(
	orchestrator: web::Data<PaymentOrchestrator<P, C>>,
) -> Result<HttpResponse, ApiError> {
	match orchestrator.snapshot() {
		Some(snapshot) => Ok(HttpResponse::Ok().json(snapshot)),
		None => Err(ApiError::PaymentNotFoundError),
	}
}
