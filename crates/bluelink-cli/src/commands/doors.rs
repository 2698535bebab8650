//! Door lock commands

use anyhow::Result;
use bluelink_client::Vehicle;

use crate::output::OutputContext;

pub async fn lock(vehicle: &Vehicle, ctx: &OutputContext) -> Result<()> {
    ctx.success(&vehicle.lock().await?);
    Ok(())
}

pub async fn unlock(vehicle: &Vehicle, ctx: &OutputContext) -> Result<()> {
    ctx.success(&vehicle.unlock().await?);
    Ok(())
}
