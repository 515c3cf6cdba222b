use std::time::Duration;

use kiosk_payments::domain::gateway::CardGateway;
use kiosk_payments::domain::payment::{
	CardType, PaymentMethod, PaymentRequest, PaymentStatus, Rail,
};
use kiosk_payments::infrastructure::rails::pinpad_rail::PinpadRail;
use mockito::Matcher;
use reqwest::Client;
use serde_json::json;

fn rail(url: &str) -> PinpadRail {
	PinpadRail::new(Client::new(), url, Duration::from_secs(5))
}

#[tokio::test]
async fn test_charge_sends_amount_in_cents_and_maps_approval() {
	let mut server = mockito::Server::new_async().await;
	let mock = server
		.mock("POST", "/api/pagamento")
		.match_body(Matcher::Json(json!({
			"valor": 1990,
			"tipo": "credito",
			"parcelas": 1
		})))
		.with_status(200)
		.with_header("content-type", "application/json")
		.with_body(r#"{"aprovado":true,"nsu":"000123","mensagem":"Transacao aprovada"}"#)
		.expect(1)
		.create_async()
		.await;

	let request = PaymentRequest::new(PaymentMethod::Credit, 19.9, "o1").unwrap();
	let result = rail(&server.url())
		.charge(request.amount_cents, CardType::Credit, request.installments)
		.await;

	mock.assert_async().await;
	assert_eq!(result.status, PaymentStatus::Approved);
	assert_eq!(result.payment_id, "000123");
	assert_eq!(result.rail(), Rail::Card);
	assert_eq!(result.status_detail.as_deref(), Some("Transacao aprovada"));
	assert!(result.error_reason.is_none());
}

#[tokio::test]
async fn test_charge_rejection_carries_device_message() {
	let mut server = mockito::Server::new_async().await;
	let _mock = server
		.mock("POST", "/api/pagamento")
		.with_status(200)
		.with_header("content-type", "application/json")
		.with_body(r#"{"aprovado":false,"mensagem":"saldo insuficiente"}"#)
		.create_async()
		.await;

	let result = rail(&server.url()).charge(5000, CardType::Debit, 1).await;

	assert_eq!(result.status, PaymentStatus::Rejected);
	assert_eq!(result.status_detail.as_deref(), Some("saldo insuficiente"));
	assert_eq!(result.payment_id, "");
}

#[tokio::test]
async fn test_decline_with_error_status_is_still_a_rejection() {
	let mut server = mockito::Server::new_async().await;
	let _mock = server
		.mock("POST", "/api/pagamento")
		.with_status(402)
		.with_header("content-type", "application/json")
		.with_body(r#"{"aprovado":false,"mensagem":"cartao bloqueado"}"#)
		.create_async()
		.await;

	let result = rail(&server.url()).charge(5000, CardType::Credit, 2).await;

	assert_eq!(result.status, PaymentStatus::Rejected);
	assert_eq!(result.status_detail.as_deref(), Some("cartao bloqueado"));
}

#[tokio::test]
async fn test_error_status_without_body_is_an_error() {
	let mut server = mockito::Server::new_async().await;
	let _mock = server
		.mock("POST", "/api/pagamento")
		.with_status(500)
		.create_async()
		.await;

	let result = rail(&server.url()).charge(5000, CardType::Credit, 1).await;

	assert_eq!(result.status, PaymentStatus::Error);
	assert!(result.error_reason.unwrap().contains("500"));
}

#[tokio::test]
async fn test_unreachable_pinpad_is_an_error() {
	let result = rail("http://127.0.0.1:9").charge(5000, CardType::Credit, 1).await;

	assert_eq!(result.status, PaymentStatus::Error);
	assert!(result.error_reason.is_some());
}

#[tokio::test]
async fn test_cancel_reverses_transaction_amount() {
	let mut server = mockito::Server::new_async().await;
	let mock = server
		.mock("POST", "/api/cancelar")
		.match_body(Matcher::Json(json!({ "nsu": "000123", "valor": 4250 })))
		.with_status(200)
		.with_header("content-type", "application/json")
		.with_body(r#"{"aprovado":true,"mensagem":"Cancelamento aprovado"}"#)
		.expect(1)
		.create_async()
		.await;

	let outcome = rail(&server.url()).cancel("000123", 4250).await;

	mock.assert_async().await;
	assert!(outcome.success);
	assert_eq!(outcome.message, "Cancelamento aprovado");
}

#[tokio::test]
async fn test_declined_cancel_is_reported() {
	let mut server = mockito::Server::new_async().await;
	let _mock = server
		.mock("POST", "/api/cancelar")
		.with_status(200)
		.with_header("content-type", "application/json")
		.with_body(r#"{"aprovado":false}"#)
		.create_async()
		.await;

	let outcome = rail(&server.url()).cancel("000123", 4250).await;

	assert!(!outcome.success);
	assert_eq!(outcome.message, "Reversal declined by pin pad");
}

#[tokio::test]
async fn test_numeric_nsu_is_accepted_as_payment_id() {
	let mut server = mockito::Server::new_async().await;
	let _mock = server
		.mock("POST", "/api/pagamento")
		.with_status(200)
		.with_header("content-type", "application/json")
		.with_body(r#"{"aprovado":true,"nsu":482913,"mensagem":"Transacao aprovada"}"#)
		.create_async()
		.await;

	let result = rail(&server.url()).charge(2500, CardType::Debit, 1).await;

	assert_eq!(result.status, PaymentStatus::Approved);
	assert_eq!(result.payment_id, "482913");
}
