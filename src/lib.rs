use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use log::info;
use reqwest::Client;

pub mod adapters {
	pub mod web {
		pub mod cancel_payment_handler;
		pub mod current_payment_handler;
		pub mod errors;
		pub mod payments_handler;
		pub mod schema;
	}
}

pub mod domain {
	pub mod errors;
	pub mod gateway;
	pub mod payment;
}

pub mod infrastructure {
	pub mod config {
		pub mod settings;
	}
	pub mod rails {
		pub mod pinpad_rail;
		pub mod pix_rail;
	}
	pub mod workers {
		pub mod polling_scheduler;
	}
}

pub mod use_cases {
	pub mod dto;
	pub mod payment_orchestrator;
}

use crate::adapters::web::cancel_payment_handler::cancel_payment;
use crate::adapters::web::current_payment_handler::current_payment;
use crate::adapters::web::payments_handler::start_payment;
use crate::domain::gateway::{CardGateway, PixGateway};
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::rails::pinpad_rail::PinpadRail;
use crate::infrastructure::rails::pix_rail::PixRail;
use crate::infrastructure::workers::polling_scheduler::PollingScheduler;
use crate::use_cases::payment_orchestrator::PaymentOrchestrator;

pub type KioskOrchestrator = PaymentOrchestrator<PixRail, PinpadRail>;

/// Registers the checkout endpoints for an orchestrator over `P` and `C`.
/// The orchestrator itself must be added as `web::Data` by the caller.
pub fn routes<P: PixGateway, C: CardGateway>(cfg: &mut web::ServiceConfig) {
	cfg.service(web::resource("/payments").route(web::post().to(start_payment::<P, C>)))
		.service(
			web::resource("/payments/current")
				.route(web::get().to(current_payment::<P, C>)),
		)
		.service(
			web::resource("/payments/{payment_id}")
				.route(web::delete().to(cancel_payment::<P, C>)),
		);
}

pub fn build_orchestrator(config: &Config, http_client: Client) -> KioskOrchestrator {
	let pix = PixRail::new(
		http_client.clone(),
		&config.backend_url,
		config.backend_api_token.clone(),
	);
	let pinpad = PinpadRail::new(http_client, &config.pinpad_url, config.pinpad_timeout());
	let scheduler =
		PollingScheduler::new(config.pix_poll_interval(), config.pix_poll_timeout());

	PaymentOrchestrator::new(pix, pinpad, scheduler)
}

pub async fn run(config: Arc<Config>) -> std::io::Result<()> {
	let http_client = Client::builder()
		.pool_idle_timeout(Duration::from_secs(90))
		.build()
		.map_err(std::io::Error::other)?;

	let orchestrator = web::Data::new(build_orchestrator(&config, http_client));

	info!(
		"Checkout listening on port {} (PIX backend {}, pin pad {})",
		config.server_port, config.backend_url, config.pinpad_url
	);

	HttpServer::new(move || {
		App::new()
			.app_data(orchestrator.clone())
			.configure(routes::<PixRail, PinpadRail>)
	})
	.keep_alive(Duration::from_secs(config.server_keepalive))
	.workers(1)
	.bind(("0.0.0.0", config.server_port))?
	.run()
	.await
}
