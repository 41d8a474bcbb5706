use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use thiserror::Error;
use tipjar_core::config::{AppConfig, ConfigError, LoadOptions};
use tipjar_core::{Ledger, SharedLedger, TokenCodec};
use tipjar_gateway::commands::LedgerWalletService;
use tipjar_gateway::events::{ComponentClickHandler, EventDispatcher, SlashCommandHandler};
use tipjar_gateway::interactions::TransferClickService;
use tipjar_gateway::notify::{Notifier, RestNotifierTransport};
use tipjar_gateway::runner::{GatewayRunner, NoopGatewayTransport, ReconnectPolicy};
use tracing::info;

const NOTIFIER_SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Application {
    pub config: AppConfig,
    pub ledger: SharedLedger,
    pub notifier: Notifier,
    pub runner: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let ledger = SharedLedger::new(Ledger::seeded(
        &config.ledger.seed_account_id,
        config.ledger.seed_balance,
    ));
    info!(
        event_name = "system.bootstrap.ledger_seeded",
        seed_account_id = %config.ledger.seed_account_id,
        seed_balance = config.ledger.seed_balance,
        "in-memory ledger seeded"
    );

    let transport = Arc::new(RestNotifierTransport::new(
        &config.gateway.api_base_url,
        config.gateway.bot_token.expose_secret(),
    ));
    let notifier = Notifier::spawn(
        transport,
        config.gateway.log_channel_id.clone(),
        NOTIFIER_SEND_TIMEOUT,
    );

    let codec = TokenCodec::new(
        config.ledger.token_secret.expose_secret(),
        config.ledger.confirm_ttl_secs,
    );

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(LedgerWalletService::new(
        ledger.clone(),
        codec.clone(),
        notifier.clone(),
    )));
    dispatcher.register(ComponentClickHandler::new(TransferClickService::new(
        ledger.clone(),
        codec,
        notifier.clone(),
    )));

    let runner =
        GatewayRunner::new(Arc::new(NoopGatewayTransport), dispatcher, ReconnectPolicy::default());

    info!(event_name = "system.bootstrap.complete", "application bootstrap complete");

    Ok(Application { config, ledger, notifier, runner })
}
