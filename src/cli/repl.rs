use std::error::Error;
use std::io::{ self, Write };
use tokio::io::{ AsyncBufReadExt, BufReader };
use uuid::Uuid;
use log::{ debug, warn };

use crate::app::AppController;
use crate::chat::SessionState;
use crate::error::PersonaError;
use crate::models::{ AgentPersona, ChatMessage, Role };

/// Renders a growing model message incrementally: only the text added since
/// the last render is written.
pub struct StreamPrinter<W: Write> {
    out: W,
    speaker: String,
    message_id: Option<Uuid>,
    printed: String,
}

impl<W: Write> StreamPrinter<W> {
    pub fn new(out: W, speaker: &str) -> Self {
        Self {
            out,
            speaker: speaker.to_string(),
            message_id: None,
            printed: String::new(),
        }
    }

    pub fn render(&mut self, messages: &[ChatMessage]) -> io::Result<()> {
        let Some(last) = messages.last() else {
            return Ok(());
        };
        if last.role != Role::Model {
            return Ok(());
        }
        if self.message_id != Some(last.id) {
            self.message_id = Some(last.id);
            self.printed.clear();
            write!(self.out, "{}> ", self.speaker)?;
        }
        match last.content.strip_prefix(self.printed.as_str()) {
            Some(delta) => write!(self.out, "{}", delta)?,
            // Not a continuation: the partial reply was swapped for an apology.
            None => write!(self.out, "\n{}> {}", self.speaker, last.content)?,
        }
        self.printed.clone_from(&last.content);
        self.out.flush()
    }

    pub fn finish_line(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Interactive chat on stdin/stdout until EOF or `/exit`.
pub async fn chat_loop(
    app: &mut AppController,
    agent: AgentPersona
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let speaker = agent.name.clone();
    println!("Chat with {} (type /exit to leave)", speaker);

    let session = app.start_chat(agent).await;
    let mut printer = StreamPrinter::new(io::stdout(), &speaker);
    printer.render(session.messages())?;
    printer.finish_line()?;
    if session.state() == SessionState::Failed {
        app.close_chat();
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input == "/exit" || input == "/quit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let Some(mut updates) = app.chat().map(|s| s.subscribe()) else {
            break;
        };
        let result = {
            let send = app.send_message(input);
            tokio::pin!(send);
            loop {
                tokio::select! {
                    biased;
                    result = &mut send => break result,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break (&mut send).await;
                        }
                        let snapshot = updates.borrow_and_update().clone();
                        printer.render(&snapshot)?;
                    }
                }
            }
        };
        let snapshot = updates.borrow_and_update().clone();
        printer.render(&snapshot)?;
        printer.finish_line()?;

        match result {
            Ok(reply) => debug!("Reply complete ({} chars)", reply.len()),
            Err(PersonaError::ChatSend(e)) => warn!("Message failed: {}", e),
            Err(e) => {
                warn!("{}", e);
            }
        }
    }

    app.close_chat();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(printer: StreamPrinter<Vec<u8>>) -> String {
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn prints_only_new_text() {
        let mut printer = StreamPrinter::new(Vec::new(), "Causa");
        let mut reply = ChatMessage::model("");
        let mut messages = vec![ChatMessage::user("hi")];
        printer.render(&messages).unwrap();

        messages.push(reply.clone());
        for chunk in ["Hel", "lo ", "there"] {
            reply.content.push_str(chunk);
            *messages.last_mut().unwrap() = reply.clone();
            printer.render(&messages).unwrap();
        }
        printer.render(&messages).unwrap();
        assert_eq!(output(printer), "Causa> Hello there");
    }

    #[test]
    fn replaced_text_is_reprinted() {
        let mut printer = StreamPrinter::new(Vec::new(), "Causa");
        let mut reply = ChatMessage::model("Half an");
        printer.render(std::slice::from_ref(&reply)).unwrap();
        reply.content = "I'm sorry, I encountered an error.".to_string();
        printer.render(std::slice::from_ref(&reply)).unwrap();
        assert_eq!(output(printer), "Causa> Half an\nCausa> I'm sorry, I encountered an error.");
    }

    #[test]
    fn each_new_message_gets_a_prefix() {
        let mut printer = StreamPrinter::new(Vec::new(), "Causa");
        printer.render(&[ChatMessage::model("One")]).unwrap();
        printer.finish_line().unwrap();
        printer.render(&[ChatMessage::model("Two")]).unwrap();
        assert_eq!(output(printer), "Causa> One\nCausa> Two");
    }
}
