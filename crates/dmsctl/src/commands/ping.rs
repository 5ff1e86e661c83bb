//! Ping command implementation

use anyhow::{bail, Result};

use super::Context;
use crate::output::{is_json_mode, print_error, print_json, print_success};

pub async fn execute(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;

    match client.ping().await {
        Ok(info) => {
            if is_json_mode() {
                print_json(&info);
            } else {
                let version = info["version"].as_str().unwrap_or("unknown");
                print_success(&format!(
                    "Sensor at {} is alive (v{})",
                    client.base_url(),
                    version
                ));
            }
            Ok(())
        }
        Err(e) => {
            print_error(&format!("Sensor at {} is not running: {}", client.base_url(), e));
            bail!("Sensor not running")
        }
    }
}
