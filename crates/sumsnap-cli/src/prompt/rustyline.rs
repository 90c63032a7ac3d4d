use std::io::{self, Write};

use anyhow::Result;
use cliclack::spinner;
use console::style;
use rustyline::{error::ReadlineError, DefaultEditor};

use super::{Input, InputType, Prompt};

const PROMPT: &str = "\x1b[1m\x1b[38;5;30m(sumsnap)> \x1b[0m";

pub struct RustylinePrompt {
    editor: DefaultEditor,
    spinner: Option<cliclack::ProgressBar>,
}

impl RustylinePrompt {
    pub fn new() -> Result<Self> {
        Ok(RustylinePrompt {
            editor: DefaultEditor::new()?,
            spinner: None,
        })
    }
}

fn print_help() {
    println!("Commands:");
    println!("/web <query> - Search the web and answer from the results");
    println!("/exit - Exit the session");
    println!("/? | /help - Display this help message");
    println!("Ctrl+C - Stop the reply in progress (the partial reply is discarded)");
}

impl Prompt for RustylinePrompt {
    fn get_input(&mut self) -> Result<Input> {
        let message_text = match self.editor.readline(PROMPT) {
            Ok(text) => text,
            Err(ReadlineError::Interrupted) => {
                return Ok(Input {
                    input_type: InputType::AskAgain,
                    content: None,
                })
            }
            Err(ReadlineError::Eof) => {
                return Ok(Input {
                    input_type: InputType::Exit,
                    content: None,
                })
            }
            Err(e) => return Err(e.into()),
        };
        let message_text = message_text.trim();
        if !message_text.is_empty() {
            let _ = self.editor.add_history_entry(message_text);
        }

        if message_text.eq_ignore_ascii_case("/exit") || message_text.eq_ignore_ascii_case("/quit")
        {
            Ok(Input {
                input_type: InputType::Exit,
                content: None,
            })
        } else if message_text.eq_ignore_ascii_case("/?")
            || message_text.eq_ignore_ascii_case("/help")
        {
            print_help();
            Ok(Input {
                input_type: InputType::AskAgain,
                content: None,
            })
        } else {
            Ok(Input {
                input_type: InputType::Message,
                content: Some(message_text.to_string()),
            })
        }
    }

    fn render_fragment(&mut self, fragment: &str) {
        print!("{}", fragment);
        let _ = io::stdout().flush();
    }

    fn end_reply(&mut self) {
        println!("\n");
    }

    fn render_notice(&mut self, notice: &str) {
        println!("\n{}\n", style(notice).yellow());
    }

    fn show_busy(&mut self) {
        let busy = spinner();
        busy.start("thinking...");
        self.spinner = Some(busy);
    }

    fn hide_busy(&mut self) {
        if let Some(busy) = self.spinner.take() {
            busy.stop("");
        }
    }

    fn close(&self) {
        println!("{}", style("Goodbye.").dim());
    }
}
