use tokio::sync::watch;
use uuid::Uuid;

use crate::models::{ ChatMessage, Role };

/// Ordered messages of one conversation. Every mutation publishes a fresh
/// snapshot to subscribers.
pub struct MessageLog {
    messages: Vec<ChatMessage>,
    updates: watch::Sender<Vec<ChatMessage>>,
}

impl MessageLog {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            messages: Vec::new(),
            updates,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.updates.subscribe()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.publish();
    }

    /// Drops the whole conversation in favour of a single message.
    pub fn reset_to(&mut self, message: ChatMessage) {
        self.messages.clear();
        self.push(message);
    }

    /// Appends an empty model placeholder and hands out the turn that fills it.
    pub fn begin_turn(&mut self) -> Turn<'_> {
        let placeholder = ChatMessage::model(String::new());
        let id = placeholder.id;
        self.push(placeholder);
        Turn {
            log: self,
            id,
            text: String::new(),
        }
    }

    fn set_content(&mut self, id: Uuid, content: &str) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
            message.content.clear();
            message.content.push_str(content);
            self.publish();
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.messages.clone());
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-flight model reply. Chunks accumulate into the placeholder message
/// it was created with, addressed by id.
pub struct Turn<'a> {
    log: &'a mut MessageLog,
    id: Uuid,
    text: String,
}

impl Turn<'_> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn append(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.text.push_str(chunk);
        self.log.set_content(self.id, &self.text);
    }

    pub fn finalize(self) -> String {
        self.text
    }

    /// Replaces whatever streamed so far with `apology`.
    pub fn fail(self, apology: &str) {
        self.log.set_content(self.id, apology);
    }
}

pub fn last_model_message(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    messages.iter().rev().find(|m| m.role == Role::Model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_replace_the_placeholder_in_place() {
        let mut log = MessageLog::new();
        log.push(ChatMessage::user("hi"));

        let mut turn = log.begin_turn();
        for chunk in ["Hel", "lo ", "there"] {
            turn.append(chunk);
        }
        assert_eq!(turn.finalize(), "Hello there");

        assert_eq!(log.messages().len(), 2);
        let last = &log.messages()[1];
        assert_eq!(last.role, Role::Model);
        assert_eq!(last.content, "Hello there");
    }

    #[test]
    fn subscribers_see_monotonically_growing_text() {
        let mut log = MessageLog::new();
        let mut rx = log.subscribe();

        let mut turn = log.begin_turn();
        let mut seen = Vec::new();
        for chunk in ["Hel", "lo ", "there"] {
            turn.append(chunk);
            seen.push(rx.borrow_and_update().last().unwrap().content.clone());
        }
        assert_eq!(seen, vec!["Hel", "Hello ", "Hello there"]);
        assert_eq!(rx.borrow().len(), 1);
    }

    #[test]
    fn fail_swaps_partial_text_for_apology() {
        let mut log = MessageLog::new();
        let mut turn = log.begin_turn();
        turn.append("partial");
        turn.fail("sorry");
        assert_eq!(log.messages().len(), 1);
        assert_eq!(log.messages()[0].content, "sorry");
    }

    #[test]
    fn reset_to_leaves_a_single_message() {
        let mut log = MessageLog::new();
        log.push(ChatMessage::user("a"));
        log.push(ChatMessage::model("b"));
        log.reset_to(ChatMessage::model("only"));
        assert_eq!(log.messages().len(), 1);
        assert_eq!(last_model_message(log.messages()).unwrap().content, "only");
    }
}
