//! `init` command: create a swarm and its session.

use serde::Serialize;
use std::collections::HashMap;

use crate::cli::commands::{domain, AppContext, CommandResult};
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::{QueenType, Swarm, SwarmTopology};

#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub swarm_id: String,
    pub session_id: String,
    pub name: String,
    pub topology: String,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        format!(
            "Swarm '{}' initialized ({} topology)\n  swarm id:   {}\n  session id: {}",
            self.name, self.topology, self.swarm_id, self.session_id
        )
    }
}

/// Seed `.hive-mind/config.yaml` with the effective configuration so
/// later runs (and local overrides) have a file to edit. Existing
/// config files are left untouched.
async fn write_project_config(ctx: &AppContext) -> CommandResult<()> {
    let path = ctx.config.paths.root.join("config.yaml");
    if path.exists() {
        return Ok(());
    }

    tokio::fs::create_dir_all(&ctx.config.paths.root)
        .await
        .map_err(DomainError::from)?;
    let yaml = serde_yaml::to_string(&ctx.config)
        .map_err(|e| DomainError::Serialization(e.to_string()))?;
    tokio::fs::write(&path, yaml)
        .await
        .map_err(DomainError::from)?;

    Ok(())
}

pub async fn handle_init(
    ctx: &AppContext,
    name: String,
    topology: String,
    queen_type: String,
    max_workers: u32,
    json: bool,
) -> CommandResult<()> {
    let topology = SwarmTopology::from_str(&topology)
        .ok_or_else(|| DomainError::InvalidArgument(format!("unknown topology: {topology}")))?;
    let queen_type = QueenType::from_str(&queen_type)
        .ok_or_else(|| DomainError::InvalidArgument(format!("unknown queen type: {queen_type}")))?;

    let swarm = Swarm::new(&name)
        .with_topology(topology)
        .with_queen_type(queen_type)
        .with_max_workers(max_workers);
    swarm
        .validate()
        .map_err(DomainError::InvalidArgument)?;
    domain(ctx.swarms.create(&swarm).await)?;

    let session_id = domain(
        ctx.session_manager
            .create_session(swarm.id, &name, None, HashMap::new())
            .await,
    )?;

    write_project_config(ctx).await?;

    output(
        &InitOutput {
            swarm_id: swarm.id.to_string(),
            session_id,
            name,
            topology: topology.as_str().to_string(),
        },
        json,
    );
    Ok(())
}
