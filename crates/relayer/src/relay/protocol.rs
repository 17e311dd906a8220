//! Inbound frame handling for a single connection.

use shared::{Frame, FrameError};

use super::{ConnectionId, Delivery, RelayError, RelayState};

/// What a text frame turned into.
#[derive(Debug)]
pub enum FrameOutcome {
    Subscribed { channel: String, new: bool },
    Routed(Delivery),
    /// Bad frame; logged and discarded, connection stays open.
    Rejected(FrameError),
}

/// Apply one text frame from `id`.
///
/// Subscribe frames update the registry and are echoed back to the sender.
/// Any other typed object is routed like a bridge event. Only a relay-side
/// failure is returned as `Err`; client mistakes never are.
pub fn handle_text(
    relay: &RelayState,
    id: ConnectionId,
    text: &str,
) -> Result<FrameOutcome, RelayError> {
    let frame = match Frame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(connection_id = %id, error = %e, "discarding frame");
            return Ok(FrameOutcome::Rejected(e));
        }
    };

    match frame {
        Frame::Subscribe { channel } => {
            let new = relay.subscribe(id, &channel)?;
            relay.send_to(
                id,
                &Frame::Subscribe {
                    channel: channel.clone(),
                },
            )?;
            Ok(FrameOutcome::Subscribed { channel, new })
        }
        Frame::Event(event) => Ok(FrameOutcome::Routed(relay.publish(&event)?)),
    }
}
