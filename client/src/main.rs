//! Scripted demo session.
//!
//! Runs the client against an in-process stand-in for the queue server:
//! connect (with one refused attempt), log in, queue for an event, get
//! called, confirm, survive a link drop, then leave and log out.

use anyhow::{Context, bail};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use ticketline::{
    ChannelTransport, ClientConfig, ClientEnvironment, LoggingNotifier, TicketState,
    TicketsClient, reconnect_with_backoff,
};
use ticketline_core::environment::SystemClock;
use ticketline_core::protocol::{
    ClientCommand, ServerMessage, TicketPayload, encode_server_message,
};
use ticketline_core::types::{
    EventId, EventSubscription, Ticket, TicketId, TicketStatus, UserTicketSummary,
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT: EventId = EventId::new(42);
const TICKET: TicketId = TicketId::new(7);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticketline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    ticketline::metrics::describe_metrics();

    let config = ClientConfig::from_env().context("loading configuration")?;
    info!(server_url = %config.server_url, "Configuration loaded");

    let (transport, outbound) = ChannelTransport::channel();
    let transport = Arc::new(transport);
    let client = Arc::new(TicketsClient::new(
        ClientEnvironment {
            notifier: Arc::new(LoggingNotifier),
            transport: transport.clone(),
            clock: Arc::new(SystemClock),
        },
        &config,
    ));
    let server = tokio::spawn(simulated_server(Arc::clone(&client), outbound));

    let policy = config.reconnect_policy();
    connect(&policy, &transport, &client).await?;

    let username = if config.username.is_empty() {
        "demo".to_string()
    } else {
        config.username.clone()
    };
    client.login(username, "secret").await?;
    info!(status = %client.status_text(), "Logged in");

    client.subscribe_event(EventSubscription::new(
        "Escape Room",
        Ticket::new(TICKET, EVENT),
    ))?;

    let called = wait_for(&client, TicketState::is_called).await?;
    info!(title = %called.last_message_title, "{}", called.last_message);
    client.confirm(called.ticket())?;

    let accepted = wait_for(&client, TicketState::is_accepted).await?;
    info!(title = %accepted.last_message_title, "{}", accepted.last_message);

    warn!("Simulating link loss");
    transport.set_connected(false);
    client.connection_changed(false);
    connect(&policy, &transport, &client).await?;
    let requeued = wait_for(&client, |t| t.status() == TicketStatus::Activated).await?;
    info!(title = %requeued.last_message_title, "Resubscribed after reconnect");

    if let Some(summary) = client.summary(EVENT) {
        info!(position = ?summary.position, waiting = summary.waiting, "Queue summary");
    }

    client.unsubscribe_event(EVENT);
    client.logout();
    info!(status = %client.status_text(), stopped = client.is_stopped(), "Logged out");

    server.await.context("server task")?;
    Ok(())
}

/// Bring the link up, refusing the first attempt of each connect
async fn connect(
    policy: &ticketline::ReconnectPolicy,
    transport: &ChannelTransport,
    client: &TicketsClient,
) -> anyhow::Result<()> {
    let attempts = AtomicU32::new(0);
    let attempts = &attempts;
    reconnect_with_backoff(policy, move || async move {
        if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            Err("connection refused")
        } else {
            Ok(())
        }
    })
    .await
    .map_err(anyhow::Error::msg)?;

    transport.set_connected(true);
    client.connection_changed(true);
    Ok(())
}

/// Poll the demo ticket until `predicate` holds
async fn wait_for<P>(client: &TicketsClient, predicate: P) -> anyhow::Result<TicketState>
where
    P: Fn(&TicketState) -> bool,
{
    for _ in 0..200 {
        if let Some(ticket) = client.ticket(EVENT).filter(|t| predicate(t)) {
            return Ok(ticket);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bail!("ticket never reached the expected state")
}

fn ticket_frame(ticket: &Ticket, state: TicketStatus, wrap: fn(TicketPayload) -> ServerMessage) -> ServerMessage {
    wrap(TicketPayload {
        ticket: ticket.clone().with_state(state),
    })
}

/// Stand-in for the queue server: answers commands with pushed frames
async fn simulated_server(
    client: Arc<TicketsClient>,
    mut outbound: mpsc::UnboundedReceiver<ClientCommand>,
) {
    let ticket = Ticket::new(TICKET, EVENT).with_participants(["demo"]);
    let push = |message: ServerMessage| match encode_server_message(&message) {
        Ok(frame) => {
            client.handle_frame(&frame).ok();
        },
        Err(error) => warn!(%error, "Server failed to encode frame"),
    };

    while let Some(command) = outbound.recv().await {
        info!(?command, "Server received");
        match command {
            ClientCommand::Login { .. } => push(ServerMessage::Identified(true)),
            ClientCommand::SubscribeEvent { event_id } => {
                let mut summary = UserTicketSummary::new(event_id);
                summary.position = Some(1);
                summary.waiting = 3;
                push(ServerMessage::TicketSummaries(summary));

                let current = client.ticket(event_id).map(|t| t.status());
                push(ticket_frame(&ticket, TicketStatus::Activated, ServerMessage::TicketActivated));
                if current == Some(TicketStatus::Pending) {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    push(ticket_frame(&ticket, TicketStatus::Called, ServerMessage::TicketCalled));
                }
            },
            ClientCommand::Confirm { ticket } => {
                push(ticket_frame(&ticket, TicketStatus::Confirmed, ServerMessage::TicketAccepted));
            },
            ClientCommand::Skip { ticket } => {
                push(ticket_frame(&ticket, TicketStatus::Activated, ServerMessage::TicketSkipped));
            },
            ClientCommand::UnsubscribeEvent { .. } => {
                push(ticket_frame(&ticket, TicketStatus::Deleted, ServerMessage::TicketDeleted));
            },
            ClientCommand::Disconnect => {
                push(ServerMessage::Connected(false));
                break;
            },
        }
    }
}
