//! Remote start/stop commands

use anyhow::Result;
use bluelink_client::{StartOptions, Vehicle};
use bluelink_core::climate::{heat_zone_label, seat_status_label};

use crate::output::OutputContext;

/// Start the engine with climate settings
pub async fn start(vehicle: &Vehicle, options: &StartOptions, ctx: &OutputContext) -> Result<()> {
    let payload = vehicle.start_payload(options);
    let message = vehicle.send_start(&payload).await?;
    ctx.success(&message);

    let heating = payload["heating1"].as_u64().unwrap_or(0);
    let mut pairs = vec![
        ("Climate", if options.hvac { "on" } else { "off" }.to_string()),
        ("Temperature", payload["airTemp"]["value"].as_str().unwrap_or("-").to_string()),
        ("Heated features", describe(heating, heat_zone_label)),
    ];
    if let Some(seats) = payload["seatHeaterVentInfo"].as_object() {
        for (seat, status) in seats {
            pairs.push((seat.as_str(), describe(status.as_u64().unwrap_or(0), seat_status_label)));
        }
    }
    ctx.print_kv(&pairs);
    Ok(())
}

pub async fn stop(vehicle: &Vehicle, ctx: &OutputContext) -> Result<()> {
    let message = vehicle.stop().await?;
    ctx.success(&message);
    Ok(())
}

fn describe(code: u64, label: fn(u8) -> Option<&'static str>) -> String {
    let label = u8::try_from(code).ok().and_then(label).unwrap_or("unknown");
    format!("{} ({})", code, label)
}
