//! Login and PIN commands

use anyhow::{Context, Result};
use bluelink_client::SessionController;
use chrono::{Local, TimeZone};

use crate::output::OutputContext;

/// Log in and show the resulting session
pub async fn login(controller: &SessionController, ctx: &OutputContext) -> Result<()> {
    let session = controller.session();
    let env = controller.environment();

    ctx.success("Logged in");
    ctx.print_kv(&[
        ("Brand", env.brand.to_string()),
        ("Region", env.region.to_string()),
        ("Device", session.device_id.clone()),
        ("Token expires", format_timestamp(session.token_expires_at)),
    ]);
    Ok(())
}

/// Enter the PIN and show when the control token expires
pub async fn pin(
    controller: &SessionController,
    pin: Option<&str>,
    ctx: &OutputContext,
) -> Result<()> {
    let pin = pin.context("No PIN given (use --pin, BLUELINK_PIN or the config file)")?;
    controller.enter_pin(pin).await.context("PIN was not accepted")?;

    let session = controller.session();
    ctx.success("PIN accepted");
    ctx.print_kv(&[(
        "Control token expires",
        format_timestamp(session.control_token_expires_at),
    )]);
    Ok(())
}

fn format_timestamp(epoch_seconds: i64) -> String {
    Local
        .timestamp_opt(epoch_seconds, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
