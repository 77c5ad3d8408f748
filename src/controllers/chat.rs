use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::json;

use crate::api::{ApiClient, ApiError, ApiRequest, Empty, RetryPolicy};
use crate::models::{ChatMessage, Conversation, MessageRead, SendMessage};
use crate::realtime::{HubConnection, HubEvent, RealtimeBinding};
use crate::resource::Resource;

use super::cell::ResourceCell;
use super::fetch;
use super::reducer::Reducer;

pub const RECEIVE_MESSAGE: &str = "ReceiveMessage";
pub const MESSAGE_READ: &str = "MessageRead";
pub const SEND_MESSAGE: &str = "SendMessage";
pub const MARK_AS_READ: &str = "MarkAsRead";

/// Local changes to an open conversation's message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadIntent {
    Received(ChatMessage),
    Read(MessageRead),
}

pub struct ThreadReducer;

impl Reducer for ThreadReducer {
    type State = Vec<ChatMessage>;
    type Intent = ThreadIntent;

    fn reduce(mut messages: Vec<ChatMessage>, intent: ThreadIntent) -> Vec<ChatMessage> {
        match intent {
            ThreadIntent::Received(message) => {
                if !messages.iter().any(|m| m.id == message.id) {
                    messages.push(message);
                }
            }
            ThreadIntent::Read(receipt) => {
                for message in messages
                    .iter_mut()
                    .filter(|m| m.conversation_id == receipt.conversation_id)
                {
                    if receipt.message_id.map_or(true, |id| id == message.id) {
                        message.is_read = true;
                    }
                }
            }
        }
        messages
    }
}

/// How an outgoing message left the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the push channel; the server echoes it as `ReceiveMessage`.
    Pushed,
    /// Stored through the HTTP API.
    Stored(ChatMessage),
}

/// Support chat: inbox, one open thread and outgoing messages.
pub struct ChatController {
    api: ApiClient,
    connection: HubConnection,
    retry: RetryPolicy,
    conversations: ResourceCell<Vec<Conversation>>,
    messages: ResourceCell<Vec<ChatMessage>>,
    outgoing: ResourceCell<Delivery>,
    read_state: ResourceCell<Empty>,
    open_conversation: Mutex<Option<u64>>,
}

impl ChatController {
    pub fn new(api: ApiClient, connection: HubConnection) -> Self {
        Self {
            api,
            connection,
            retry: RetryPolicy::default(),
            conversations: ResourceCell::new(),
            messages: ResourceCell::new(),
            outgoing: ResourceCell::new(),
            read_state: ResourceCell::new(),
            open_conversation: Mutex::new(None),
        }
    }

    pub fn conversations(&self) -> &ResourceCell<Vec<Conversation>> {
        &self.conversations
    }

    pub fn messages(&self) -> &ResourceCell<Vec<ChatMessage>> {
        &self.messages
    }

    pub fn outgoing(&self) -> &ResourceCell<Delivery> {
        &self.outgoing
    }

    pub fn read_state(&self) -> &ResourceCell<Empty> {
        &self.read_state
    }

    pub async fn load_conversations(&self) -> Resource<Vec<Conversation>> {
        self.conversations
            .run(fetch(
                &self.api,
                &self.retry,
                ApiRequest::get("chat/conversations"),
            ))
            .await
    }

    pub async fn open(&self, conversation_id: u64) -> Resource<Vec<ChatMessage>> {
        *self.open_conversation.lock() = Some(conversation_id);
        let request = ApiRequest::get(format!("chat/conversations/{}/messages", conversation_id));
        self.messages
            .run(fetch(&self.api, &self.retry, request))
            .await
    }

    pub fn open_conversation(&self) -> Option<u64> {
        *self.open_conversation.lock()
    }

    /// Send over the push channel when connected, through the HTTP API
    /// otherwise.
    pub async fn send(&self, conversation_id: u64, content: &str) -> Resource<Delivery> {
        let content = content.trim();
        if content.is_empty() {
            let ticket = self.outgoing.begin();
            let err = ApiError::InvalidInput("message is empty".to_string());
            self.outgoing.settle(ticket, Err(err.clone()));
            return Resource::Error(err);
        }

        if self.connection.is_connected() {
            let ticket = self.outgoing.begin();
            self.connection
                .send(SEND_MESSAGE, vec![json!(conversation_id), json!(content)]);
            self.outgoing.settle(ticket, Ok(Delivery::Pushed));
            return Resource::Success(Delivery::Pushed);
        }

        tracing::debug!(conversation_id, "Hub offline, sending message over HTTP");
        let body = SendMessage {
            conversation_id,
            content: content.to_string(),
        };
        let outcome = self
            .outgoing
            .run(async {
                let message: ChatMessage = self
                    .api
                    .send(ApiRequest::post("chat/messages").json(&body))
                    .await?;
                Ok(Delivery::Stored(message))
            })
            .await;

        if let Some(Delivery::Stored(message)) = outcome.data() {
            self.apply(ThreadIntent::Received(message.clone()));
        }
        outcome
    }

    /// Mark a conversation read on the server, then locally once the
    /// server has it.
    pub async fn mark_read(&self, conversation_id: u64) -> Resource<Empty> {
        let outcome = if self.connection.is_connected() {
            let ticket = self.read_state.begin();
            self.connection
                .send(MARK_AS_READ, vec![json!(conversation_id)]);
            self.read_state.settle(ticket, Ok(Empty));
            Resource::Success(Empty)
        } else {
            let request = ApiRequest::put(format!("chat/conversations/{}/read", conversation_id));
            self.read_state.run(self.api.execute(request)).await
        };

        if outcome.is_success() {
            self.apply(ThreadIntent::Read(MessageRead {
                conversation_id,
                message_id: None,
            }));
        }
        outcome
    }

    /// Patch local state with `ReceiveMessage` and `MessageRead` events.
    ///
    /// Handlers run on the connection's dispatch task, one at a time.
    pub fn follow(self: &Arc<Self>, connection: &HubConnection) -> RealtimeBinding {
        let mut binding = RealtimeBinding::new(connection);

        let controller: Weak<Self> = Arc::downgrade(self);
        binding.on(RECEIVE_MESSAGE, move |event| {
            let Some(controller) = controller.upgrade() else {
                return;
            };
            match event.argument::<ChatMessage>(0) {
                Some(message) => controller.apply(ThreadIntent::Received(message)),
                None => tracing::warn!(event = %event.name, "Dropping message event without a message"),
            }
        });

        let controller: Weak<Self> = Arc::downgrade(self);
        binding.on(MESSAGE_READ, move |event| {
            let Some(controller) = controller.upgrade() else {
                return;
            };
            match read_receipt(event) {
                Some(receipt) => controller.apply(ThreadIntent::Read(receipt)),
                None => tracing::warn!(event = %event.name, "Dropping read receipt without a conversation"),
            }
        });

        binding
    }

    fn apply(&self, intent: ThreadIntent) {
        let open = self.open_conversation();
        self.patch_inbox(&intent, open);

        let conversation_id = match &intent {
            ThreadIntent::Received(message) => message.conversation_id,
            ThreadIntent::Read(receipt) => receipt.conversation_id,
        };
        if open != Some(conversation_id) {
            return;
        }

        self.messages.patch(|messages| {
            let before = messages.clone();
            *messages = ThreadReducer::reduce(std::mem::take(messages), intent);
            *messages != before
        });
    }

    fn patch_inbox(&self, intent: &ThreadIntent, open: Option<u64>) {
        self.conversations.patch(|conversations| {
            let mut changed = false;
            match intent {
                ThreadIntent::Received(message) => {
                    for c in conversations
                        .iter_mut()
                        .filter(|c| c.id == message.conversation_id)
                    {
                        c.last_message = Some(message.content.clone());
                        c.updated_at = message.sent_at.clone().or(c.updated_at.take());
                        if open != Some(c.id) {
                            c.unread_count += 1;
                        }
                        changed = true;
                    }
                }
                ThreadIntent::Read(receipt) if receipt.message_id.is_none() => {
                    for c in conversations
                        .iter_mut()
                        .filter(|c| c.id == receipt.conversation_id && c.unread_count > 0)
                    {
                        c.unread_count = 0;
                        changed = true;
                    }
                }
                ThreadIntent::Read(_) => {}
            }
            changed
        });
    }
}

/// `MessageRead` arrives either as one object or as positional
/// `(conversationId, messageId?)`.
fn read_receipt(event: &HubEvent) -> Option<MessageRead> {
    if let Some(Ok(receipt)) = event
        .arguments
        .first()
        .filter(|value| value.is_object())
        .map(|value| serde_json::from_value::<MessageRead>(value.clone()))
    {
        return Some(receipt);
    }
    let conversation_id = event.argument::<u64>(0)?;
    Some(MessageRead {
        conversation_id,
        message_id: event.argument::<u64>(1),
    })
}
