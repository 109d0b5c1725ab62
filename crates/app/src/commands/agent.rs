use anyhow::Result;
use platwrap_agent::{AgentInvocation, AgentWrapper};
use tokio_util::sync::CancellationToken;

/// Run `args` through the external agent with inherited stdio.
pub(crate) async fn handle_agent_command(
    agent: &AgentWrapper,
    cancel: &CancellationToken,
    args: Vec<String>,
) -> Result<()> {
    agent.execute(cancel, AgentInvocation::new(args)).await?;
    Ok(())
}
