use async_trait::async_trait;

use crate::error::PeerError;
use crate::swap::messages::PeerMessage;

/// Peer transport capability. Inbound messages are delivered by the
/// transport calling `SwapService::on_message` with the sender's node id.
#[async_trait]
pub trait PeerCommunicator: Send + Sync {
    async fn send_message(&self, peer_node_id: &str, message: PeerMessage)
    -> Result<(), PeerError>;

    async fn list_peers(&self) -> Result<Vec<String>, PeerError>;
}
