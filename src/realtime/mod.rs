//! Realtime event bridge.
//!
//! One persistent connection to the server's push hub, shared by every
//! controller. Events are delivered to named handlers and to a broadcast
//! stream; unexpected closes are reported, never raised.

mod binding;
mod connection;
mod hub;
mod protocol;
mod reconnect;

pub use binding::RealtimeBinding;
pub use connection::{
    ClosedEvent, ConnectionState, HubConnection, HubEvent, RealtimeError, SubscriptionId,
};
pub use hub::RealtimeHub;
pub use protocol::{
    encode_close, encode_invocation, encode_ping, handshake_request, parse_handshake_response,
    parse_message, split_frames, HubMessage, RECORD_SEPARATOR,
};
pub use reconnect::{ReconnectPolicy, ReconnectState, ReconnectSupervisor, SupervisorStatus};
