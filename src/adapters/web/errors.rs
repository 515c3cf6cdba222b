use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, error};
use derive_more::derive::{Display, Error};
use serde::Serialize;

use crate::domain::errors::PaymentError;

#[derive(Serialize)]
struct ErrorResponse {
	#[serde(rename = "statusCode")]
	status_code: u16,
	error:       String,
	message:     String,
}

#[derive(Debug, Display, Error)]
pub enum ApiError {
	#[display("Request data is invalid.")]
	BadClientDataError,
	#[display("Another payment is still in progress.")]
	PaymentInProgressError,
	#[display("Payment not found.")]
	PaymentNotFoundError,
	#[display("Internal server error.")]
	InternalServerError,
}

impl ApiError {
	pub fn name(&self) -> String {
		match self {
			ApiError::BadClientDataError => "Bad request".to_string(),
			ApiError::PaymentInProgressError => "Conflict".to_string(),
			ApiError::PaymentNotFoundError => "Not Found".to_string(),
			ApiError::InternalServerError => "Internal Server Error".to_string(),
		}
	}
}

impl error::ResponseError for ApiError {
	fn error_response(&self) -> HttpResponse {
		HttpResponse::build(self.status_code())
			.content_type(ContentType::json())
			.json(ErrorResponse {
				status_code: self.status_code().as_u16(),
				error:       self.to_string(),
				message:     self.name(),
			})
	}

	fn status_code(&self) -> StatusCode {
		match self {
			ApiError::BadClientDataError => StatusCode::BAD_REQUEST,
			ApiError::PaymentInProgressError => StatusCode::CONFLICT,
			ApiError::PaymentNotFoundError => StatusCode::NOT_FOUND,
			ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl From<PaymentError> for ApiError {
	fn from(err: PaymentError) -> Self {
		match err {
			PaymentError::InvalidAmount { .. } => ApiError::BadClientDataError,
			PaymentError::AttemptInProgress { .. } => ApiError::PaymentInProgressError,
			PaymentError::UnknownPayment { .. } => ApiError::PaymentNotFoundError,
		}
	}
}
