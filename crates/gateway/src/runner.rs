use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{
    default_dispatcher, EventContext, EventDispatcher, GatewayEnvelope, HandlerResult,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gateway connect failed: {0}")]
    Connect(String),
    #[error("gateway read failed: {0}")]
    Receive(String),
    #[error("gateway ack failed: {0}")]
    Acknowledge(String),
    #[error("gateway close failed: {0}")]
    Disconnect(String),
}

/// Retry budget for a dropped gateway connection. The delay doubles per
/// attempt from `base_delay_ms` up to `max_delay_ms`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 6, base_delay_ms: 200, max_delay_ms: 8_000 }
    }
}

impl ReconnectPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.min(20));
        let millis = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

/// The wire connection to the chat platform. The concrete websocket client
/// lives behind this seam; everything above it is protocol-agnostic.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Drains wallet interactions off the gateway and runs each one through the
/// dispatcher before reading the next. Strict arrival order matters here: a
/// confirm click must never be handled while the `/pay` that minted its
/// buttons is still in flight.
pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl Default for GatewayRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopGatewayTransport),
            dispatcher: default_dispatcher(),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Runs sessions until the stream closes cleanly or the retry budget is
    /// spent. A spent budget degrades the process (wallet commands go dark,
    /// the HTTP api stays up) instead of crashing it.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.pump_session().await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    warn!(attempt, error = %error, "gateway session lost");

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            retries = attempt,
                            "gateway retry budget spent; wallet commands are offline until restart"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.delay_for(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn pump_session(&self) -> Result<(), TransportError> {
        self.transport.connect().await?;
        info!("gateway connected; listening for wallet interactions");

        while let Some(envelope) = self.transport.next_envelope().await? {
            let actor_id = envelope.event.actor_id().unwrap_or("-").to_owned();
            debug!(
                envelope_id = %envelope.envelope_id,
                event_kind = ?envelope.event.kind(),
                actor_id = %actor_id,
                "wallet envelope received"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    error = %error,
                    "envelope ack failed; handling the interaction anyway"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Ignored) => {
                    debug!(envelope_id = %envelope.envelope_id, "no handler claimed the envelope");
                }
                Ok(_) => {
                    info!(
                        envelope_id = %envelope.envelope_id,
                        actor_id = %actor_id,
                        "wallet interaction handled"
                    );
                }
                Err(error) => {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        actor_id = %actor_id,
                        error = %error,
                        "wallet interaction failed; the gateway keeps pumping"
                    );
                }
            }
        }

        info!("gateway stream closed by the platform");
        self.transport.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use tipjar_core::confirm::DEFAULT_TTL_SECS;
    use tipjar_core::{Ledger, SharedLedger, TokenCodec};
    use tokio::sync::Mutex;

    use super::{GatewayRunner, GatewayTransport, ReconnectPolicy, TransportError};
    use crate::commands::{LedgerWalletService, SlashCommandPayload};
    use crate::events::{
        ComponentClickHandler, EventDispatcher, GatewayEnvelope, GatewayEvent, SlashCommandHandler,
    };
    use crate::interactions::{ComponentClickEvent, TransferClickService};
    use crate::notify::Notifier;

    type Frame = Result<Option<GatewayEnvelope>, TransportError>;

    /// Replays a scripted connection history, recording connects and acks.
    #[derive(Default)]
    struct PlaybackTransport {
        tape: Mutex<Tape>,
    }

    #[derive(Default)]
    struct Tape {
        connects: VecDeque<Result<(), TransportError>>,
        frames: VecDeque<Frame>,
        connect_count: usize,
        acked: Vec<String>,
    }

    impl PlaybackTransport {
        fn new(connects: Vec<Result<(), TransportError>>, frames: Vec<Frame>) -> Self {
            Self {
                tape: Mutex::new(Tape {
                    connects: connects.into(),
                    frames: frames.into(),
                    ..Tape::default()
                }),
            }
        }

        async fn connect_count(&self) -> usize {
            self.tape.lock().await.connect_count
        }

        async fn acked(&self) -> Vec<String> {
            self.tape.lock().await.acked.clone()
        }
    }

    #[async_trait]
    impl GatewayTransport for PlaybackTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut tape = self.tape.lock().await;
            tape.connect_count += 1;
            tape.connects.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Frame {
            self.tape.lock().await.frames.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            self.tape.lock().await.acked.push(envelope_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn wallet_codec() -> TokenCodec {
        TokenCodec::new(b"runner-test-key", DEFAULT_TTL_SECS)
    }

    fn wallet_dispatcher(ledger: SharedLedger) -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(SlashCommandHandler::new(LedgerWalletService::new(
            ledger.clone(),
            wallet_codec(),
            Notifier::disabled(),
        )));
        dispatcher.register(ComponentClickHandler::new(TransferClickService::new(
            ledger,
            wallet_codec(),
            Notifier::disabled(),
        )));
        dispatcher
    }

    fn balance_frame(envelope_id: &str, user_id: &str) -> Frame {
        Ok(Some(GatewayEnvelope {
            envelope_id: envelope_id.to_owned(),
            event: GatewayEvent::SlashCommand(SlashCommandPayload {
                command: "balance".to_owned(),
                options: Vec::new(),
                channel_id: "C-WALLET".to_owned(),
                user_id: user_id.to_owned(),
                request_id: format!("req-{envelope_id}"),
            }),
        }))
    }

    fn confirm_frame(envelope_id: &str, custom_id: &str, user_id: &str) -> Frame {
        Ok(Some(GatewayEnvelope {
            envelope_id: envelope_id.to_owned(),
            event: GatewayEvent::ComponentClick(ComponentClickEvent {
                channel_id: "C-WALLET".to_owned(),
                message_id: "M-PROMPT".to_owned(),
                user_id: user_id.to_owned(),
                custom_id: custom_id.to_owned(),
                request_id: format!("req-{envelope_id}"),
            }),
        }))
    }

    fn zero_delay(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn confirm_click_from_the_wire_moves_funds() {
        let ledger = SharedLedger::new(Ledger::seeded("501", 900));
        let confirm_id = wallet_codec().encode_confirm("501", "502", 350, Utc::now());

        let transport = Arc::new(PlaybackTransport::new(
            vec![Ok(())],
            vec![
                balance_frame("fr-1", "501"),
                confirm_frame("fr-2", &confirm_id, "501"),
                Ok(None),
            ],
        ));
        let runner =
            GatewayRunner::new(transport.clone(), wallet_dispatcher(ledger.clone()), zero_delay(0));

        runner.start().await.expect("runner");

        assert_eq!(transport.acked().await, vec!["fr-1", "fr-2"]);
        assert_eq!(ledger.balance("501"), 550);
        assert_eq!(ledger.balance("502"), 350);
    }

    #[tokio::test]
    async fn session_is_reopened_after_a_refused_handshake() {
        let ledger = SharedLedger::new(Ledger::seeded("501", 900));
        let confirm_id = wallet_codec().encode_confirm("501", "502", 100, Utc::now());

        let transport = Arc::new(PlaybackTransport::new(
            vec![Err(TransportError::Connect("handshake refused".to_owned())), Ok(())],
            vec![confirm_frame("fr-1", &confirm_id, "501"), Ok(None)],
        ));
        let runner =
            GatewayRunner::new(transport.clone(), wallet_dispatcher(ledger.clone()), zero_delay(3));

        runner.start().await.expect("runner");

        assert_eq!(transport.connect_count().await, 2);
        assert_eq!(ledger.balance("502"), 100);
    }

    #[tokio::test]
    async fn mid_stream_read_error_starts_a_fresh_session() {
        let ledger = SharedLedger::new(Ledger::seeded("501", 900));
        let confirm_id = wallet_codec().encode_confirm("501", "502", 250, Utc::now());

        let transport = Arc::new(PlaybackTransport::new(
            vec![Ok(()), Ok(())],
            vec![
                balance_frame("fr-1", "501"),
                Err(TransportError::Receive("wire reset mid-read".to_owned())),
                confirm_frame("fr-2", &confirm_id, "501"),
                Ok(None),
            ],
        ));
        let runner =
            GatewayRunner::new(transport.clone(), wallet_dispatcher(ledger.clone()), zero_delay(2));

        runner.start().await.expect("runner");

        assert_eq!(transport.connect_count().await, 2);
        assert_eq!(transport.acked().await, vec!["fr-1", "fr-2"]);
        assert_eq!(ledger.balance("501"), 650);
        assert_eq!(ledger.balance("502"), 250);
    }

    #[tokio::test]
    async fn spent_retry_budget_degrades_instead_of_crashing() {
        let transport = Arc::new(PlaybackTransport::new(
            vec![
                Err(TransportError::Connect("wire down".to_owned())),
                Err(TransportError::Connect("wire still down".to_owned())),
            ],
            vec![],
        ));
        let runner =
            GatewayRunner::new(transport.clone(), EventDispatcher::default(), zero_delay(1));

        runner.start().await.expect("runner must degrade, not crash");
        assert_eq!(transport.connect_count().await, 2);
    }

    #[test]
    fn reconnect_delay_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy { max_retries: 8, base_delay_ms: 50, max_delay_ms: 400 };
        assert_eq!(policy.delay_for(0).as_millis(), 50);
        assert_eq!(policy.delay_for(1).as_millis(), 100);
        assert_eq!(policy.delay_for(2).as_millis(), 200);
        assert_eq!(policy.delay_for(5).as_millis(), 400);
    }
}
