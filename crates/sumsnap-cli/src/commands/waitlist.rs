use anyhow::Result;
use cliclack::spinner;
use console::style;
use sumsnap::waitlist::WaitlistEntry;

use crate::client::HttpBackend;

pub async fn handle_waitlist(
    server: &str,
    provided_name: Option<String>,
    provided_email: Option<String>,
) -> Result<()> {
    cliclack::intro(style(" join-the-waitlist ").on_cyan().black())?;

    let name = match provided_name {
        Some(name) => name,
        None => cliclack::input("What's your name?").interact()?,
    };
    let email = match provided_email {
        Some(email) => email,
        None => cliclack::input("Which email should we notify?")
            .placeholder("you@example.com")
            .interact()?,
    };

    let entry = WaitlistEntry::new(name, email);
    if let Err(e) = entry.validate() {
        cliclack::outro(style(e.user_message()).red())?;
        return Ok(());
    }

    let spin = spinner();
    spin.start("Submitting...");
    let backend = HttpBackend::new(server)?;
    let reply = backend.join_waitlist(&entry).await;
    spin.stop("");

    match reply {
        Ok(reply) if reply.success => cliclack::outro(reply.message)?,
        Ok(reply) => cliclack::outro(style(reply.message).red())?,
        Err(e) => {
            tracing::error!(error = %e, "waitlist request failed");
            cliclack::outro(style("Could not reach the SumSnap server. Please try again.").red())?
        }
    }
    Ok(())
}
