//! Vehicle status and odometer queries

use anyhow::Result;
use bluelink_client::Vehicle;

use crate::output::{OdometerRow, OutputContext};

/// Print the raw vehicle status
///
/// With `refresh` the backend polls the car instead of answering from cache.
pub async fn status(vehicle: &Vehicle, refresh: bool, ctx: &OutputContext) -> Result<()> {
    let status = vehicle.status(refresh).await?;
    if status.is_null() {
        ctx.warn("Backend returned no vehicle status");
    } else {
        ctx.print_json(&status);
    }
    Ok(())
}

pub async fn odometer(vehicle: &Vehicle, ctx: &OutputContext) -> Result<()> {
    let reading = vehicle.odometer().await?;
    ctx.print_one(&OdometerRow {
        vin: vehicle.vin().to_string(),
        value: reading.value,
        unit: reading.unit,
    });
    Ok(())
}
