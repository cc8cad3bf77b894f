//! `docqa run`: ask one question and exit.
//!
//! Builds the same state the server uses, asks one question in a throwaway
//! session, prints the answer, and releases the tool-server session.

use std::sync::Arc;

use dq_domain::config::Config;

use crate::api::cookie::mint_token;
use crate::bootstrap;

pub async fn run(config: Arc<Config>, message: String) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config)?;
    let agent = state.agents.build(&mint_token())?;

    let answer = agent.chat(&message).await;
    agent.close().await;

    println!("{answer}");
    Ok(())
}
