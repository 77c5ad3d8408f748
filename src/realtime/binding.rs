use tokio::sync::mpsc;

use super::connection::{ClosedEvent, HubConnection, HubEvent, SubscriptionId};

/// A group of handlers that is removed from the connection on drop.
///
/// Controllers keep one of these for as long as they want events.
pub struct RealtimeBinding {
    connection: HubConnection,
    subscriptions: Vec<SubscriptionId>,
}

impl RealtimeBinding {
    pub fn new(connection: &HubConnection) -> Self {
        Self {
            connection: connection.clone(),
            subscriptions: Vec::new(),
        }
    }

    pub fn on(
        &mut self,
        event: &str,
        handler: impl Fn(&HubEvent) + Send + Sync + 'static,
    ) -> &mut Self {
        let id = self.connection.subscribe(event, handler);
        self.subscriptions.push(id);
        self
    }

    pub fn channel(&mut self, event: &str) -> mpsc::UnboundedReceiver<HubEvent> {
        let (id, rx) = self.connection.subscribe_channel(event);
        self.subscriptions.push(id);
        rx
    }

    pub fn on_closed(
        &mut self,
        handler: impl Fn(&ClosedEvent) + Send + Sync + 'static,
    ) -> &mut Self {
        let id = self.connection.on_closed(handler);
        self.subscriptions.push(id);
        self
    }

    pub fn connection(&self) -> &HubConnection {
        &self.connection
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Drop for RealtimeBinding {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.connection.unsubscribe(id);
        }
    }
}
