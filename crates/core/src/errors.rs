use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("required transfer fields are missing")]
    MissingFields,
    #[error("transfer amount must be a positive integer")]
    InvalidAmount,
    #[error("sender balance is lower than the transfer amount")]
    InsufficientFunds,
    #[error("recipient cannot receive transfers")]
    IneligibleRecipient,
    #[error("credit would overflow the receiver balance")]
    BalanceOverflow,
}

impl TransferError {
    /// Plain-text message shown to the command invoker (ephemeral).
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingFields => "Recipient and amount are both required.",
            Self::InvalidAmount => "The amount must be a positive whole number.",
            Self::InsufficientFunds => "You do not have enough funds for this transfer.",
            Self::IneligibleRecipient => "You cannot send funds to a bot.",
            Self::BalanceOverflow => "The recipient's balance cannot hold this amount.",
        }
    }

    /// Short reason string returned in the HTTP `error` field.
    pub fn api_message(&self) -> &'static str {
        match self {
            Self::MissingFields => "missing fields",
            Self::InvalidAmount => "invalid amount",
            Self::InsufficientFunds => "insufficient funds",
            Self::IneligibleRecipient => "ineligible recipient",
            Self::BalanceOverflow => "balance overflow",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("confirmation token is malformed")]
    Malformed,
    #[error("confirmation token signature does not verify")]
    BadSignature,
    #[error("confirmation token has expired")]
    Expired,
}

impl TokenError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Malformed | Self::BadSignature => {
                "This confirmation is no longer valid. Start the transfer again."
            }
            Self::Expired => "This confirmation has expired. Start the transfer again.",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfirmError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("only the proposer may act on this confirmation")]
    Unauthorized,
}

impl ConfirmError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Token(token) => token.user_message(),
            Self::Transfer(transfer) => transfer.user_message(),
            Self::Unauthorized => "These buttons belong to someone else's transfer.",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ConfirmError, TokenError, TransferError};

    #[test]
    fn transfer_errors_map_to_stable_api_reasons() {
        assert_eq!(TransferError::MissingFields.api_message(), "missing fields");
        assert_eq!(TransferError::InvalidAmount.api_message(), "invalid amount");
        assert_eq!(TransferError::InsufficientFunds.api_message(), "insufficient funds");
        assert_eq!(TransferError::IneligibleRecipient.api_message(), "ineligible recipient");
        assert_eq!(TransferError::BalanceOverflow.api_message(), "balance overflow");
    }

    #[test]
    fn confirm_error_delegates_user_messages() {
        let expired = ConfirmError::from(TokenError::Expired);
        assert_eq!(expired.user_message(), TokenError::Expired.user_message());

        let funds = ConfirmError::from(TransferError::InsufficientFunds);
        assert_eq!(funds.user_message(), TransferError::InsufficientFunds.user_message());
    }

    #[test]
    fn unauthorized_message_does_not_leak_token_contents() {
        assert!(!ConfirmError::Unauthorized.user_message().contains('_'));
    }
}
