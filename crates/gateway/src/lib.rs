//! Chat-surface adapter for the tipjar ledger.
//!
//! This crate translates gateway events into core calls and back:
//! - **Runner** (`runner`) - transport trait + reconnecting event pump
//! - **Events** (`events`) - one dispatch table keyed by interaction kind
//! - **Commands** (`commands`) - `/balance` and `/pay` slash commands
//! - **Interactions** (`interactions`) - confirm/cancel button clicks
//! - **Embeds** (`embeds`) - rich message builders (embeds, buttons)
//! - **Notify** (`notify`) - best-effort audit notices to the log channel
//!
//! # Architecture
//!
//! ```text
//! Gateway events → EventDispatcher → Handlers → SharedLedger
//!                       ↓                          ↓
//!                 Embed templates ← Response   Notifier (fire-and-forget)
//! ```
//!
//! Handlers run one at a time per envelope; the ledger lock is held for the
//! whole debit+credit pair, so no interaction can observe a half-applied
//! transfer. Notifier delivery is decoupled onto a worker task and can
//! neither fail nor delay the mutation that triggered it.

pub mod commands;
pub mod embeds;
pub mod events;
pub mod interactions;
pub mod notify;
pub mod runner;
