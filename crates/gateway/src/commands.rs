use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tipjar_core::{SharedLedger, TokenCodec, TransferError};

use crate::embeds::{self, MessageTemplate};
use crate::notify::{AuditNotice, Notifier, NoticeAction};

pub const BALANCE_COMMAND: &str = "balance";
pub const PAY_COMMAND: &str = "pay";

pub const RECIPIENT_OPTION: &str = "recipient";
pub const AMOUNT_OPTION: &str = "amount";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub options: Vec<CommandOption>,
    pub channel_id: String,
    pub user_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOption {
    pub name: String,
    pub value: OptionValue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    /// A user mention option; `bot` is resolved by the platform.
    User { id: String, bot: bool },
    Integer(i64),
    Text(String),
}

/// A `/pay` invocation as received, before any precondition check. Options
/// stay optional here so the service can report `MissingFields` itself
/// instead of relying on platform-side required-option enforcement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PayRequest {
    pub receiver_id: Option<String>,
    pub receiver_is_bot: bool,
    pub amount: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletCommand {
    Balance,
    Pay(PayRequest),
    Unknown { command: String },
}

pub fn classify_wallet_command(payload: &SlashCommandPayload) -> WalletCommand {
    match payload.command.trim_start_matches('/') {
        BALANCE_COMMAND => WalletCommand::Balance,
        PAY_COMMAND => {
            let mut request = PayRequest::default();
            for option in &payload.options {
                match (option.name.as_str(), &option.value) {
                    (RECIPIENT_OPTION, OptionValue::User { id, bot }) => {
                        request.receiver_id = Some(id.clone());
                        request.receiver_is_bot = *bot;
                    }
                    (AMOUNT_OPTION, OptionValue::Integer(amount)) => {
                        request.amount = Some(*amount);
                    }
                    _ => {}
                }
            }
            WalletCommand::Pay(request)
        }
        other => WalletCommand::Unknown { command: other.to_owned() },
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

#[async_trait]
pub trait WalletCommandService: Send + Sync {
    async fn balance(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn pay(
        &self,
        request: PayRequest,
        payload: &SlashCommandPayload,
    ) -> Result<MessageTemplate, CommandRouteError>;
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: WalletCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<MessageTemplate, CommandRouteError> {
        match classify_wallet_command(payload) {
            WalletCommand::Balance => self.service.balance(payload).await,
            WalletCommand::Pay(request) => self.service.pay(request, payload).await,
            WalletCommand::Unknown { command } => Ok(embeds::error_message(&format!(
                "Unknown command `/{command}`. Try `/balance` or `/pay`."
            ))),
        }
    }
}

#[derive(Default)]
pub struct NoopWalletCommandService;

#[async_trait]
impl WalletCommandService for NoopWalletCommandService {
    async fn balance(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(embeds::balance_message(&payload.user_id, 0))
    }

    async fn pay(
        &self,
        _request: PayRequest,
        _payload: &SlashCommandPayload,
    ) -> Result<MessageTemplate, CommandRouteError> {
        Ok(embeds::error_message("Transfers are not available yet."))
    }
}

/// The real command service: reads and proposes against the shared ledger,
/// mints signed confirmation tokens, and mirrors actions to the notifier.
pub struct LedgerWalletService {
    ledger: SharedLedger,
    codec: TokenCodec,
    notifier: Notifier,
}

impl LedgerWalletService {
    pub fn new(ledger: SharedLedger, codec: TokenCodec, notifier: Notifier) -> Self {
        Self { ledger, codec, notifier }
    }

    /// Pre-flight checks for `/pay`, in the same order the transfer itself
    /// validates: fields present, amount positive, then the chat-surface
    /// bot check and a funds check so the prompt is not shown for a
    /// transfer that cannot succeed.
    fn validate_pay(
        &self,
        sender_id: &str,
        request: &PayRequest,
    ) -> Result<(String, u64), TransferError> {
        let (Some(receiver_id), Some(amount)) = (&request.receiver_id, request.amount) else {
            return Err(TransferError::MissingFields);
        };

        let amount = u64::try_from(amount).map_err(|_| TransferError::InvalidAmount)?;
        if amount == 0 {
            return Err(TransferError::InvalidAmount);
        }

        if request.receiver_is_bot {
            return Err(TransferError::IneligibleRecipient);
        }

        if self.ledger.balance(sender_id) < amount {
            return Err(TransferError::InsufficientFunds);
        }

        Ok((receiver_id.clone(), amount))
    }
}

#[async_trait]
impl WalletCommandService for LedgerWalletService {
    async fn balance(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let balance = self.ledger.balance(&payload.user_id);

        self.notifier.notice(
            AuditNotice::new(NoticeAction::BalanceChecked, &payload.user_id)
                .with_detail("Balance", balance.to_string()),
        );

        Ok(embeds::balance_message(&payload.user_id, balance))
    }

    async fn pay(
        &self,
        request: PayRequest,
        payload: &SlashCommandPayload,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let (receiver_id, amount) = match self.validate_pay(&payload.user_id, &request) {
            Ok(validated) => validated,
            Err(error) => return Ok(embeds::error_message(error.user_message())),
        };

        let issued_at = Utc::now();
        let confirm_id =
            self.codec.encode_confirm(&payload.user_id, &receiver_id, amount, issued_at);
        let cancel_id = self.codec.encode_cancel(&payload.user_id, issued_at);

        self.notifier.notice(
            AuditNotice::new(NoticeAction::TransferRequested, &payload.user_id)
                .with_detail("To", embeds::mention(&receiver_id))
                .with_detail("Amount", amount.to_string()),
        );

        Ok(embeds::transfer_prompt_message(
            &payload.user_id,
            &receiver_id,
            amount,
            &confirm_id,
            &cancel_id,
        ))
    }
}
