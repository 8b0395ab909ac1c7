use anyhow::Result;
use ovpanel::cli::{actions, actions::Action, start, telemetry};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let (action, globals) = start()?;

    // Handle the action
    let result = match action {
        Action::Server(args) => actions::server::handle(args, &globals).await,
        Action::AddAccount(args) => actions::account::handle(args, &globals).await,
    };

    telemetry::shutdown_tracer();

    result
}
