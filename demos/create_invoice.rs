use std::time::Duration;

use charge_rs::config::ChargeConfig;
use charge_rs::lightning::{LightMoney, LightningClient};
use charge_rs::ChargeClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Usage: `create_invoice --connection "type=charge;server=...;api-token=..." --msat 1000`
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let connection = flag_value(&args, "--connection")
        .ok_or("--connection <connection string> is required")?;
    let msat: u64 = flag_value(&args, "--msat").as_deref().unwrap_or("1000").parse()?;
    let expiry: u64 = flag_value(&args, "--expiry").as_deref().unwrap_or("3600").parse()?;
    let description = flag_value(&args, "--description");

    let client = ChargeClient::from_config(connection.parse::<ChargeConfig>()?)?;
    let invoice = LightningClient::create_invoice(
        &client,
        LightMoney::from_msat(msat),
        description.as_deref(),
        Duration::from_secs(expiry),
        &CancellationToken::new(),
    )
    .await?;
    println!("{}", serde_json::to_string_pretty(&invoice)?);
    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|pair| pair[0] == flag)
        .map(|pair| pair[1].clone())
}
