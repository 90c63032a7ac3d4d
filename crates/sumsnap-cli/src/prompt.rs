use anyhow::Result;

pub mod rustyline;

/// Terminal surface for a chat session.
pub trait Prompt {
    fn get_input(&mut self) -> Result<Input>;
    /// Print one piece of the reply as it streams in.
    fn render_fragment(&mut self, fragment: &str);
    /// Called once the reply has ended cleanly.
    fn end_reply(&mut self);
    fn render_notice(&mut self, notice: &str);
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn close(&self);
    fn ready(&self) {
        println!("\n");
        println!("SumSnap is ready. Ask anything, or start a line with /web to search first.");
        println!("\n");
    }
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // None for control commands such as /exit
}

pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}
