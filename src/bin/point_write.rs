use std::{thread::sleep, time::Duration};

use anyhow::Result;
use clap::Parser;
use color_signal::control::ControlClient;
use log::{info, warn};
use rand::Rng;

/// Writes to a single pin of the control endpoint.
#[derive(Debug, Parser)]
#[command(about)]
struct Args {
    /// Endpoint base URL, e.g. http://172.172.23.5:2429
    base_url: String,

    /// Pin address, e.g. %QX0.4
    address: String,

    /// Value to write; random 0/1 when repeating without one
    value: Option<i32>,

    /// Log in with these credentials first
    #[arg(long, num_args = 2, value_names = ["USERNAME", "PASSWORD"])]
    login: Option<Vec<String>>,

    /// Keep writing every this many milliseconds
    #[arg(long)]
    repeat_ms: Option<u64>,

    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let client = ControlClient::new(&args.base_url, Duration::from_millis(args.timeout_ms))?;

    if let Some(credentials) = &args.login {
        client.login(&credentials[0], &credentials[1])?;
        info!("Logged in as {}", credentials[0]);
    }

    match args.repeat_ms {
        None => {
            let value = args.value.unwrap_or(1);
            client.point_write(&args.address, value)?;
            info!("{} <- {}", args.address, value);
        }
        Some(delay) => {
            info!(
                "Writing to {} every {} milliseconds. Press CTRL+C to quit.",
                args.address, delay
            );
            let mut rng = rand::thread_rng();
            loop {
                let value = args.value.unwrap_or_else(|| rng.gen_range(0..=1));
                match client.point_write(&args.address, value) {
                    Ok(()) => info!("{} <- {}", args.address, value),
                    Err(err) => warn!("{:#}", err),
                }
                sleep(Duration::from_millis(delay));
            }
        }
    }

    Ok(())
}
