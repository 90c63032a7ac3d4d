use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

/// Templates shipped with the crate, keyed by file name under `src/prompts`.
const EMBEDDED: &[(&str, &str)] = &[
    ("system.md", include_str!("prompts/system.md")),
    ("web_context.md", include_str!("prompts/web_context.md")),
];

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    tera.render("inline_template", &context)
}

/// Render one of the templates compiled into the crate.
pub fn load_embedded_prompt<T: Serialize>(name: &str, context_data: &T) -> Result<String, TeraError> {
    let template = EMBEDDED
        .iter()
        .find(|(file, _)| *file == name)
        .map(|(_, body)| *body)
        .ok_or_else(|| TeraError::msg(format!("Unknown prompt template: {}", name)))?;
    load_prompt(template, context_data)
}
