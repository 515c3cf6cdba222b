use actix_web::{HttpResponse, web};
use log::{info, warn};

use crate::adapters::web::errors::ApiError;
use crate::domain::gateway::{CardGateway, PixGateway};
use crate::use_cases::payment_orchestrator::PaymentOrchestrator;

pub async fn cancel_payment<P: PixGateway, C: CardGateway>(
	path: web::Path<String>,
	orchestrator: web::Data<PaymentOrchestrator<P, C>>,
) -> Result<HttpResponse, ApiError> {
	let payment_id = path.into_inner();

	match orchestrator.cancel(&payment_id).await {
		Ok(outcome) => {
			info!(
				"Cancel request for payment {payment_id} finished: {}",
				outcome.message
			);
			Ok(HttpResponse::Ok().json(outcome))
		}
		Err(e) => {
			warn!("Cancel request for payment {payment_id} rejected: {e}");
			Err(e.into())
		}
	}
}
