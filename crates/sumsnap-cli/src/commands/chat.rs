use anyhow::Result;
use console::style;
use std::sync::Arc;
use sumsnap::{conversation::Conversation, prompt::default_system_prompt};

use crate::client::HttpBackend;
use crate::prompt::rustyline::RustylinePrompt;
use crate::session::Session;

pub async fn handle_chat(server: &str, no_system_prompt: bool) -> Result<()> {
    let backend = Arc::new(HttpBackend::new(server)?);
    let mut conversation = Conversation::new(backend.clone(), backend);
    if !no_system_prompt {
        conversation = conversation.with_system_prompt(default_system_prompt()?);
    }

    println!(
        "Connected to {} {}",
        style(server).cyan(),
        style("- type /help for commands").dim()
    );

    let mut session = Session::new(conversation, Box::new(RustylinePrompt::new()?));
    session.start().await
}
