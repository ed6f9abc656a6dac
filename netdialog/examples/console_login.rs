//! Console login example
//!
//! Connects to a terminal server port that hands the SSH session straight
//! to a device console, then negotiates the device's own login dialog.
//! On a BSP console it also hops to the management controller and back.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example console_login -- --host ts1 --port 2003 --user admin --password secret
//! cargo run --example console_login -- --host ts1 --port 2004 --platform cisco_bsp --bmc
//! ```

use std::env;
use std::time::Duration;

use netdialog::{Platform, SessionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let platform: Platform = args.platform.parse()?;

    println!("Opening console {}:{}...", args.host, args.port);
    let mut session = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .password(&args.password)
        .platform(platform)
        .timeout(Duration::from_secs(30))
        .prepare(false)
        .connect()
        .await?;

    let report = session.serial_login().await?;
    if report.standby {
        println!("Standby route processor, nothing more to do.");
        session.close();
        return Ok(());
    }

    let prompt = session.set_base_prompt().await?;
    println!("Logged in, prompt: {}", prompt);

    if args.bmc && platform == Platform::CiscoBsp {
        session.bsp_to_bmc().await?;
        session.set_base_prompt().await?;
        let uptime = session.send_command("uptime").await?;
        println!("BMC uptime: {}", uptime.result.trim());
        session.bmc_to_bsp().await?;
        session.set_base_prompt().await?;
    } else {
        let response = session.send_command("show clock").await?;
        println!("{}", response.result);
    }

    session.cleanup("exit").await?;
    Ok(())
}

struct Args {
    host: String,
    port: u16,
    user: String,
    password: String,
    platform: String,
    bmc: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 22,
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: String::new(),
            platform: "cisco_xr".to_string(),
            bmc: false,
        };

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--bmc" => parsed.bmc = true,
                "--help" => {
                    println!(
                        "usage: console_login --host <HOST> [--port <PORT>] [--user <USER>] \
                         [--password <PASS>] [--platform <NAME>] [--bmc]"
                    );
                    std::process::exit(0);
                }
                flag => {
                    i += 1;
                    let Some(value) = args.get(i).cloned() else {
                        eprintln!("Missing value for {}", flag);
                        break;
                    };
                    match flag {
                        "--host" | "-h" => parsed.host = value,
                        "--port" | "-p" => parsed.port = value.parse().unwrap_or(22),
                        "--user" | "-u" => parsed.user = value,
                        "--password" | "-P" => parsed.password = value,
                        "--platform" => parsed.platform = value,
                        _ => eprintln!("Unknown argument: {}", flag),
                    }
                }
            }
            i += 1;
        }
        parsed
    }
}
