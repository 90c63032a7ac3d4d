pub mod conversation;
pub mod errors;
pub mod models;
pub mod prompt;
pub mod prompt_template;
pub mod providers;
pub mod relay;
pub mod search;
pub mod waitlist;
