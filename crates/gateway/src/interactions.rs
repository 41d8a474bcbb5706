use async_trait::async_trait;
use thiserror::Error;
use tipjar_core::{ProposalAction, SharedLedger, TokenCodec};

use crate::embeds::{self, MessageTemplate};
use crate::notify::{AuditNotice, Notifier, NoticeAction};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentClickEvent {
    pub channel_id: String,
    pub message_id: String,
    pub user_id: String,
    pub custom_id: String,
    pub request_id: String,
}

/// How the surface should present the outcome of a click: replace the
/// prompt message, or reply only to the clicking user and leave the prompt
/// (and its proposal) intact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickResponse {
    Update(MessageTemplate),
    Ephemeral(MessageTemplate),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClickError {
    #[error("component click service failed: {0}")]
    Service(String),
}

#[async_trait]
pub trait ComponentClickService: Send + Sync {
    async fn handle_click(
        &self,
        event: &ComponentClickEvent,
    ) -> Result<Option<ClickResponse>, ClickError>;
}

#[derive(Default)]
pub struct NoopComponentClickService;

#[async_trait]
impl ComponentClickService for NoopComponentClickService {
    async fn handle_click(
        &self,
        _event: &ComponentClickEvent,
    ) -> Result<Option<ClickResponse>, ClickError> {
        Ok(None)
    }
}

/// Executes the confirm/cancel handshake against the shared ledger.
///
/// The proposal state lives entirely in the signed `custom_id`; decoding
/// recovers it, authorization restricts it to the proposer, and a confirm
/// runs the transfer with the current balances (which may have drifted
/// since the prompt was shown).
pub struct TransferClickService {
    ledger: SharedLedger,
    codec: TokenCodec,
    notifier: Notifier,
}

impl TransferClickService {
    pub fn new(ledger: SharedLedger, codec: TokenCodec, notifier: Notifier) -> Self {
        Self { ledger, codec, notifier }
    }
}

#[async_trait]
impl ComponentClickService for TransferClickService {
    async fn handle_click(
        &self,
        event: &ComponentClickEvent,
    ) -> Result<Option<ClickResponse>, ClickError> {
        if !TokenCodec::recognizes(&event.custom_id) {
            return Ok(None);
        }

        let token = match self.codec.decode(&event.custom_id) {
            Ok(token) => token,
            Err(error) => {
                return Ok(Some(ClickResponse::Ephemeral(embeds::error_message(
                    error.user_message(),
                ))));
            }
        };

        // A rejected actor does not consume the proposal; the proposer can
        // still confirm or cancel the same message.
        if let Err(error) = token.authorize(&event.user_id) {
            return Ok(Some(ClickResponse::Ephemeral(embeds::error_message(
                error.user_message(),
            ))));
        }

        match token.action {
            ProposalAction::Confirm { receiver_id, amount } => {
                match self.ledger.transfer(&token.sender_id, &receiver_id, amount) {
                    Ok(_outcome) => {
                        self.notifier.notice(
                            AuditNotice::new(NoticeAction::TransferConfirmed, &token.sender_id)
                                .with_detail("To", embeds::mention(&receiver_id))
                                .with_detail("Amount", amount.to_string()),
                        );
                        Ok(Some(ClickResponse::Update(embeds::transfer_complete_message(
                            &token.sender_id,
                            &receiver_id,
                            amount,
                        ))))
                    }
                    // Balance drifted since the proposal. Terminal: the
                    // prompt is replaced and its buttons removed.
                    Err(error) => Ok(Some(ClickResponse::Update(
                        embeds::transfer_failed_message(error.user_message()),
                    ))),
                }
            }
            ProposalAction::Cancel => {
                self.notifier
                    .notice(AuditNotice::new(NoticeAction::TransferCancelled, &token.sender_id));
                Ok(Some(ClickResponse::Update(embeds::transfer_cancelled_message())))
            }
        }
    }
}
