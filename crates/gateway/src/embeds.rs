use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

pub const COLOR_BALANCE: u32 = 0x00BF_FF;
pub const COLOR_PROMPT: u32 = 0x00C0_9A;
pub const COLOR_COMPLETE: u32 = 0x5CD8_5C;
pub const COLOR_CANCELLED: u32 = 0xFF00_00;
pub const COLOR_LOG: u32 = 0x3498_DB;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

// The wire format wants the numeric style codes, not names.
impl Serialize for ButtonStyle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            Self::Primary => 1,
            Self::Secondary => 2,
            Self::Success => 3,
            Self::Danger => 4,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    component_type: u8,
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self { component_type: 2, custom_id: custom_id.into(), label: label.into(), style }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    component_type: u8,
    pub components: Vec<Button>,
}

impl ActionRow {
    pub fn new(components: Vec<Button>) -> Self {
        Self { component_type: 1, components }
    }
}

/// A fully rendered reply: plain content, embeds, button rows, and whether
/// it should be visible only to the invoker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
    #[serde(skip)]
    pub ephemeral: bool,
}

pub struct EmbedBuilder {
    embed: Embed,
}

impl EmbedBuilder {
    pub fn new(color: u32) -> Self {
        Self {
            embed: Embed {
                title: None,
                description: None,
                color,
                fields: Vec::new(),
                footer: None,
                timestamp: None,
            },
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.embed.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.embed.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.embed.fields.push(EmbedField { name: name.into(), value: value.into(), inline: true });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.embed.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    pub fn timestamp_now(mut self) -> Self {
        self.embed.timestamp = Some(Utc::now());
        self
    }

    pub fn build(self) -> Embed {
        self.embed
    }
}

pub fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

pub fn balance_message(user_id: &str, balance: u64) -> MessageTemplate {
    MessageTemplate {
        content: None,
        embeds: vec![EmbedBuilder::new(COLOR_BALANCE)
            .title("💰 Current balance")
            .description(format!("{} has a balance of **{balance}**.", mention(user_id)))
            .build()],
        components: Vec::new(),
        ephemeral: false,
    }
}

pub fn transfer_prompt_message(
    sender_id: &str,
    receiver_id: &str,
    amount: u64,
    confirm_custom_id: &str,
    cancel_custom_id: &str,
) -> MessageTemplate {
    MessageTemplate {
        content: None,
        embeds: vec![EmbedBuilder::new(COLOR_PROMPT)
            .title("💸 Confirm transfer")
            .field("From", mention(sender_id))
            .field("To", mention(receiver_id))
            .field("Amount", amount.to_string())
            .footer("Use the buttons below to confirm or cancel this transfer.")
            .build()],
        components: vec![ActionRow::new(vec![
            Button::new(confirm_custom_id, "✅ Send", ButtonStyle::Success),
            Button::new(cancel_custom_id, "❌ Cancel", ButtonStyle::Danger),
        ])],
        ephemeral: false,
    }
}

pub fn transfer_complete_message(
    sender_id: &str,
    receiver_id: &str,
    amount: u64,
) -> MessageTemplate {
    MessageTemplate {
        content: None,
        embeds: vec![EmbedBuilder::new(COLOR_COMPLETE)
            .title("✅ Transfer complete")
            .field("From", mention(sender_id))
            .field("To", mention(receiver_id))
            .field("Amount", amount.to_string())
            .timestamp_now()
            .build()],
        components: Vec::new(),
        ephemeral: false,
    }
}

/// Terminal failure shown in place of the prompt; clears the buttons.
pub fn transfer_failed_message(reason: &str) -> MessageTemplate {
    MessageTemplate {
        content: Some(format!("❌ Transfer failed: {reason}")),
        embeds: Vec::new(),
        components: Vec::new(),
        ephemeral: false,
    }
}

pub fn transfer_cancelled_message() -> MessageTemplate {
    MessageTemplate {
        content: Some("🚫 The transfer was cancelled.".to_owned()),
        embeds: Vec::new(),
        components: Vec::new(),
        ephemeral: false,
    }
}

/// Invoker-only plain-text error.
pub fn error_message(reason: &str) -> MessageTemplate {
    MessageTemplate {
        content: Some(format!("❌ {reason}")),
        embeds: Vec::new(),
        components: Vec::new(),
        ephemeral: true,
    }
}
