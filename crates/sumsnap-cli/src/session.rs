use anyhow::Result;
use sumsnap::conversation::{ChatInput, Conversation, TurnOutcome};

use crate::prompt::{InputType, Prompt};

const INTERRUPTED: &str = "Interrupted: the partial reply was discarded.";

pub struct Session<'a> {
    conversation: Conversation,
    prompt: Box<dyn Prompt + 'a>,
}

impl<'a> Session<'a> {
    pub fn new(conversation: Conversation, prompt: Box<impl Prompt + 'a>) -> Self {
        Session {
            conversation,
            prompt,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.ready();

        loop {
            let input = self.prompt.get_input()?;
            let content = match input.input_type {
                InputType::Message => input.content,
                InputType::Exit => break,
                InputType::AskAgain => continue,
            };
            let Some(chat_input) = content.as_deref().and_then(ChatInput::parse) else {
                continue;
            };
            self.process(chat_input).await;
        }

        self.prompt.close();
        Ok(())
    }

    /// Run one turn; Ctrl-C while it runs stops the reply.
    async fn process(&mut self, input: ChatInput) {
        let canceller = self.conversation.canceller();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                canceller.cancel();
            }
        });

        let prompt = &mut self.prompt;
        prompt.show_busy();
        let outcome = self
            .conversation
            .send(input, |fragment| {
                prompt.hide_busy();
                prompt.render_fragment(fragment);
            })
            .await;
        watcher.abort();
        prompt.hide_busy();

        match outcome {
            Ok(TurnOutcome::Completed { .. }) => prompt.end_reply(),
            Ok(TurnOutcome::Cancelled) => prompt.render_notice(INTERRUPTED),
            Err(e) => prompt.render_notice(e.user_message()),
        }
    }

    #[cfg(test)]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}
