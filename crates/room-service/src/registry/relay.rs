//! Message relay.
//!
//! Appends a chat message to the room log and fans it out to every current
//! member, including the sender.

use super::arena::RoomArena;
use crate::errors::RoomError;
use crate::observability::metrics;

use common::protocol::{ChatMessage, ServerEvent};
use common::types::{Identity, RoomId};
use tracing::debug;

/// Store `content` in the room log and deliver it to all members.
///
/// The content is stored verbatim. Membership of the sender is not checked;
/// a non-member simply does not receive the fan-out.
///
/// # Errors
///
/// Returns `RoomError::NotFound` if the room does not exist. Nothing is
/// stored or delivered in that case.
pub fn relay_message(
    arena: &mut RoomArena,
    room_id: &RoomId,
    sender: Identity,
    content: String,
) -> Result<ChatMessage, RoomError> {
    let message = arena.append_message(room_id, sender, content)?;

    let members = arena.members(room_id);
    for member in &members {
        member.deliver(ServerEvent::NewMessage {
            message: message.clone(),
        });
    }

    debug!(
        target: "room.relay",
        room_id = %room_id,
        sender_id = %message.sender.id,
        message_id = %message.id.0,
        recipients = members.len(),
        "Message relayed"
    );
    metrics::record_message_relayed();

    Ok(message)
}
