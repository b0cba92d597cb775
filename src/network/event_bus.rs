//! Event Bus for Internal Communication
//!
//! Broadcast channel used by wallet loops to report progress while the run
//! is in flight. Nothing on the bus is needed for correctness: the fleet
//! totals come from the joined worker results.

use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event types that can be broadcast through the system
#[derive(Debug, Clone)]
pub enum Event {
    // Worker lifecycle
    WorkerStarted {
        worker_id: usize,
        wallet: String,
        planned: u32,
    },
    OperationFinished {
        worker_id: usize,
        cycle: u32,
        success: bool,
        amount_in: u64,
        received: u64,
    },
    WorkerFinished {
        worker_id: usize,
        successful: u32,
        failed: u32,
        volume: u64,
        interrupted: bool,
    },

    // Funding
    WalletFunded {
        wallet: String,
        channel: &'static str,
    },

    // System
    ShutdownRequested,
}

/// Event bus for broadcasting events to multiple subscribers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event
    pub fn publish(&self, event: Event) {
        match self.sender.send(event) {
            Ok(count) => {
                debug!("Event sent to {} receivers", count);
            }
            Err(_) => {
                // No receivers
                debug!("No event receivers");
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Event processor that handles events from the bus
pub struct EventProcessor {
    receiver: broadcast::Receiver<Event>,
    name: String,
}

impl EventProcessor {
    pub fn new(bus: &EventBus, name: &str) -> Self {
        Self {
            receiver: bus.subscribe(),
            name: name.to_string(),
        }
    }

    /// Wait for the next event; `None` once every sender is gone
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(
                        "Event processor '{}' lagged by {} messages",
                        self.name, count
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for processor '{}'", self.name);
                    return None;
                }
            }
        }
    }
}

/// Helper to create typed event handlers
pub fn spawn_event_handler<F, Fut>(
    bus: &EventBus,
    name: &str,
    mut handler: F,
) -> tokio::task::JoinHandle<()>
where
    F: FnMut(Event) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let mut processor = EventProcessor::new(bus, name);
    let name = name.to_string();

    tokio::spawn(async move {
        debug!("Event handler '{}' started", name);
        while let Some(event) = processor.next().await {
            handler(event).await;
        }
        debug!("Event handler '{}' stopped", name);
    })
}
