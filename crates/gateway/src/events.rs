use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::commands::{
    CommandRouteError, CommandRouter, NoopWalletCommandService, SlashCommandPayload,
    WalletCommandService,
};
use crate::embeds::MessageTemplate;
use crate::interactions::{
    ClickError, ClickResponse, ComponentClickEvent, ComponentClickService,
    NoopComponentClickService,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayEnvelope {
    pub envelope_id: String,
    pub event: GatewayEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    SlashCommand(SlashCommandPayload),
    ComponentClick(ComponentClickEvent),
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn kind(&self) -> GatewayEventKind {
        match self {
            Self::SlashCommand(_) => GatewayEventKind::SlashCommand,
            Self::ComponentClick(_) => GatewayEventKind::ComponentClick,
            Self::Unsupported { .. } => GatewayEventKind::Unsupported,
        }
    }

    /// The acting user, for ingress log correlation.
    pub fn actor_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.user_id),
            Self::ComponentClick(event) => Some(&event.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GatewayEventKind {
    SlashCommand,
    ComponentClick,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// Reply to the interaction with a new message.
    Responded(MessageTemplate),
    /// Replace the message the interaction came from.
    Updated(MessageTemplate),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error(transparent)]
    Click(#[from] ClickError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_kind(&self) -> GatewayEventKind;
    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// Single dispatch table keyed by interaction kind. Commands and button
/// clicks register here side by side instead of as separate top-level
/// listeners.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<GatewayEventKind, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_kind(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.kind()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher() -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(NoopWalletCommandService));
    dispatcher.register(ComponentClickHandler::new(NoopComponentClickService));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: WalletCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: WalletCommandService + 'static,
{
    fn event_kind(&self) -> GatewayEventKind {
        GatewayEventKind::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.router.route(payload).await?;
        Ok(HandlerResult::Responded(message))
    }
}

pub struct ComponentClickHandler<S> {
    service: S,
}

impl<S> ComponentClickHandler<S>
where
    S: ComponentClickService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ComponentClickHandler<S>
where
    S: ComponentClickService + 'static,
{
    fn event_kind(&self) -> GatewayEventKind {
        GatewayEventKind::ComponentClick
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ComponentClick(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let response = self.service.handle_click(event).await?;
        Ok(match response {
            Some(ClickResponse::Update(message)) => HandlerResult::Updated(message),
            Some(ClickResponse::Ephemeral(message)) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{CommandOption, OptionValue, SlashCommandPayload};
    use crate::events::{
        default_dispatcher, EventContext, GatewayEnvelope, GatewayEvent, HandlerResult,
    };
    use crate::interactions::ComponentClickEvent;

    fn command_envelope() -> GatewayEnvelope {
        GatewayEnvelope {
            envelope_id: "env-1".to_owned(),
            event: GatewayEvent::SlashCommand(SlashCommandPayload {
                command: "balance".to_owned(),
                options: Vec::new(),
                channel_id: "C1".to_owned(),
                user_id: "111".to_owned(),
                request_id: "req-1".to_owned(),
            }),
        }
    }

    #[tokio::test]
    async fn one_table_routes_commands_and_clicks() {
        let dispatcher = default_dispatcher();
        assert_eq!(dispatcher.handler_count(), 2);

        let responded = dispatcher
            .dispatch(&command_envelope(), &EventContext::default())
            .await
            .expect("dispatch command");
        assert!(matches!(responded, HandlerResult::Responded(_)));

        let click = GatewayEnvelope {
            envelope_id: "env-2".to_owned(),
            event: GatewayEvent::ComponentClick(ComponentClickEvent {
                channel_id: "C1".to_owned(),
                message_id: "M1".to_owned(),
                user_id: "111".to_owned(),
                custom_id: "confirm_x".to_owned(),
                request_id: "req-2".to_owned(),
            }),
        };
        let processed =
            dispatcher.dispatch(&click, &EventContext::default()).await.expect("dispatch click");
        assert_eq!(processed, HandlerResult::Processed);
    }

    #[tokio::test]
    async fn unsupported_events_are_ignored() {
        let dispatcher = default_dispatcher();
        let envelope = GatewayEnvelope {
            envelope_id: "env-3".to_owned(),
            event: GatewayEvent::Unsupported { event_type: "presence_update".to_owned() },
        };

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
    }

    #[test]
    fn actor_id_follows_the_event_payload() {
        assert_eq!(command_envelope().event.actor_id(), Some("111"));
        assert_eq!(
            GatewayEvent::Unsupported { event_type: "x".to_owned() }.actor_id(),
            None
        );
    }

    #[test]
    fn pay_command_envelope_round_trips_options() {
        let envelope = GatewayEnvelope {
            envelope_id: "env-4".to_owned(),
            event: GatewayEvent::SlashCommand(SlashCommandPayload {
                command: "pay".to_owned(),
                options: vec![CommandOption {
                    name: "amount".to_owned(),
                    value: OptionValue::Integer(25),
                }],
                channel_id: "C1".to_owned(),
                user_id: "111".to_owned(),
                request_id: "req-4".to_owned(),
            }),
        };

        let GatewayEvent::SlashCommand(payload) = &envelope.event else {
            panic!("expected slash command");
        };
        assert_eq!(payload.options[0].value, OptionValue::Integer(25));
    }
}
