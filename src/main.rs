use std::sync::Arc;

use kiosk_payments::infrastructure::config::settings::Config;
use kiosk_payments::run;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::init();

	let config = Arc::new(Config::load().expect("Failed to load configuration"));
	run(config).await
}
