//! IOS-XR configure and commit example
//!
//! Connects to an IOS-XR router, applies a loopback description, and
//! commits it with a comment.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example xr_commit -- --host r1 --user admin --password secret
//! ```
//!
//! Commit with an automatic rollback window:
//! ```bash
//! cargo run --example xr_commit -- --host r1 --user admin --password secret --confirmed 60
//! ```

use std::env;
use std::time::Duration;

use netdialog::{CommitRequest, ConfigSetOptions, HostKeyVerification, Platform, SessionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let platform: Platform = args.platform.parse()?;

    println!("Connecting to {}:{} as {}...", args.host, args.port, platform);
    let mut session = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .password(&args.password)
        .platform(platform)
        .timeout(Duration::from_secs(args.timeout))
        .host_key_verification(HostKeyVerification::AcceptNew)
        .connect()
        .await?;
    println!("Base prompt: {}\n", session.base_prompt());

    let version = session.send_command("show version brief").await?;
    println!("{}\n", version.result);

    let options = ConfigSetOptions::default();
    let lines = [
        "interface Loopback100".to_string(),
        format!("description {}", args.description),
    ];
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
    let output = session.send_config_set(&lines, options).await?;
    println!("{}", output);

    // Comments cannot be combined with a rollback window.
    let request = match args.confirmed {
        Some(delay) => CommitRequest::new().confirmed(delay),
        None => CommitRequest::new().comment("netdialog example"),
    };
    match session.commit(&request).await {
        Ok(output) => println!("Committed:\n{}", output),
        Err(e) if e.is_commit_error() => eprintln!("Commit rejected: {}", e),
        Err(e) => return Err(e.into()),
    }

    session.exit_config_mode(None, None, false).await?;
    session.cleanup("exit").await?;
    println!("Done!");
    Ok(())
}

struct Args {
    host: String,
    port: u16,
    user: String,
    password: String,
    platform: String,
    description: String,
    confirmed: Option<u32>,
    timeout: u64,
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
            description: "managed by netdialog".to_string(),
            confirmed: None,
            timeout: 30,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match (args[i].as_str(), value) {
                ("--host" | "-h", Some(v)) => parsed.host = v,
                ("--port" | "-p", Some(v)) => parsed.port = v.parse().unwrap_or(22),
                ("--user" | "-u", Some(v)) => parsed.user = v,
                ("--password" | "-P", Some(v)) => parsed.password = v,
                ("--platform", Some(v)) => parsed.platform = v,
                ("--description", Some(v)) => parsed.description = v,
                ("--confirmed", Some(v)) => parsed.confirmed = v.parse().ok(),
                ("--timeout" | "-t", Some(v)) => parsed.timeout = v.parse().unwrap_or(30),
                ("--help", _) => {
                    Self::print_help();
                    std::process::exit(0);
                }
                (other, _) => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }
        parsed
    }

    fn print_help() {
        println!(
            r#"netdialog xr_commit example

USAGE:
    cargo run --example xr_commit -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>          Target host [default: localhost]
    -p, --port <PORT>          SSH port [default: 22]
    -u, --user <USER>          Username [default: $USER]
    -P, --password <PASS>      Password
    --platform <NAME>          cisco_xr or cisco_vxr [default: cisco_xr]
    --description <TEXT>       Loopback100 description
    --confirmed <SECS>         Commit with a rollback window
    -t, --timeout <SECS>       Connection timeout [default: 30]
    --help                     Print this help message
"#
        );
    }
}
