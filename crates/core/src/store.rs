//! Persistence seam for conversations.

use crate::conversation::Conversation;
use crate::error::StoreError;

/// Somewhere conversations are written after every change.
///
/// `save` may assign the conversation's filename and refresh its touch time.
pub trait ConversationStore: Send + Sync {
    fn save(&self, conversation: &mut Conversation) -> Result<(), StoreError>;
}
