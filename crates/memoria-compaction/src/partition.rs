use memoria_core::{CompressionConfig, Message};

/// A history split into what must survive verbatim and what may be summarized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    /// System messages, then the trailing window, each in original order.
    pub important: Vec<Message>,
    /// Everything else, in original order.
    pub compressible: Vec<Message>,
}

/// Split `messages` into important and compressible parts.
///
/// System messages are important wherever they sit. Non-system messages in
/// the last `keep_recent_messages` positions are important too. Every input
/// message lands in exactly one of the two parts.
pub fn partition(messages: &[Message], config: &CompressionConfig) -> Partition {
    let recent_start = messages.len().saturating_sub(config.keep_recent_messages);

    let mut systems = Vec::new();
    let mut recent = Vec::new();
    let mut compressible = Vec::new();

    for (i, message) in messages.iter().enumerate() {
        if message.is_system() {
            systems.push(message.clone());
        } else if i >= recent_start {
            recent.push(message.clone());
        } else {
            compressible.push(message.clone());
        }
    }

    systems.extend(recent);
    Partition {
        important: systems,
        compressible,
    }
}
