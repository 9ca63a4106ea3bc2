//! tagpass command line.
//!
//! Runs the presentation engine against the mock backend so a credential
//! and URI can be exercised end to end without a radio.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tagpass_core::constants::NLEN_FIELD_SIZE;
use tagpass_emulator::{
    EmulationController, EmulatorConfig, ServiceStatus, TagService, TagServiceHandle,
};
use tagpass_hardware::mock::{BackendCall, MockBackend};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tagpass", version, about = "NFC credential presentation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Present a credential once on the mock backend.
    Present(PresentArgs),

    /// Print the NDEF file a URI encodes to.
    Encode(EncodeArgs),
}

#[derive(Debug, Args)]
struct PresentArgs {
    /// Credential bytes as hex, most significant byte first.
    #[arg(long)]
    uid: Credential,

    /// URI to serve while presenting.
    #[arg(long)]
    uri: Option<String>,

    #[arg(long, default_value_t = 1000)]
    duration_ms: u16,

    #[arg(long, default_value_t = 0)]
    cooldown_ms: u16,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the final status as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct EncodeArgs {
    uri: String,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Hex-encoded credential.
#[derive(Debug, Clone)]
struct Credential(Vec<u8>);

impl FromStr for Credential {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(digits).map(Credential)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Present(args) => present(args).await,
        Command::Encode(args) => encode(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<EmulatorConfig> {
    match path {
        Some(path) => EmulatorConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(EmulatorConfig::default()),
    }
}

async fn present(args: PresentArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let (backend, backend_handle) = MockBackend::new();
    let controller =
        EmulationController::new(backend, config).context("initialising emulation controller")?;

    let (service, task) = TagService::spawn(controller);
    let session = run_session(&service, &args).await;
    let status = service.status().await.ok();

    // Already gone if the session hit an unrecoverable error.
    let _ = service.shutdown().await;
    let service_result = task.await.context("tag service task panicked")?;

    for call in backend_handle.calls() {
        println!("{}", describe(&call));
    }
    if let Some(status) = status {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            println!("{}", summarize(&status));
        }
    }

    if let Err(e) = service_result {
        error!("Emulation aborted: {}", e);
        return Err(e).context("tag emulation aborted");
    }
    session
}

async fn run_session(service: &TagServiceHandle, args: &PresentArgs) -> Result<()> {
    if let Some(uri) = &args.uri {
        service
            .set_tag_uri(uri.as_str())
            .await
            .context("setting tag URI")?;
    }
    service
        .set_tag_uid(args.uid.0.clone())
        .await
        .context("setting tag UID")?;

    info!(
        "Presenting {} byte credential for {}ms",
        args.uid.0.len(),
        args.duration_ms
    );
    service
        .present_tag(args.duration_ms, args.cooldown_ms)
        .await
        .context("presenting tag")?;
    service.wait_until_idle().await?;
    info!("Presentation finished");
    Ok(())
}

fn encode(args: EncodeArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let payload = config
        .encoder()
        .encode(args.uri.as_bytes())
        .context("encoding URI")?;

    let used = NLEN_FIELD_SIZE + payload.message_len();
    println!(
        "{} ({} of {} bytes used)",
        hex::encode_upper(&payload.as_bytes()[..used]),
        used,
        payload.capacity()
    );
    Ok(())
}

fn describe(call: &BackendCall) -> String {
    match call {
        BackendCall::Setup => "setup".to_string(),
        BackendCall::SetIdentity { uid, size_class } => {
            format!("set_identity {} {}", size_class, hex::encode_upper(uid))
        }
        BackendCall::SetPayload { len } => format!("set_payload {len} bytes"),
        BackendCall::Start => "start".to_string(),
        BackendCall::Stop => "stop".to_string(),
    }
}

fn summarize(status: &ServiceStatus) -> String {
    format!(
        "presentation={} emulation={} start_failures={} stop_failures={}",
        status.presentation, status.emulation, status.start_failures, status.stop_failures
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagpass_core::SizeClass;

    #[test]
    fn test_parse_present_args() {
        let cli = Cli::try_parse_from([
            "tagpass",
            "present",
            "--uid",
            "0xEFBEADBA",
            "--uri",
            "https://tagpass.example",
            "--duration-ms",
            "250",
            "--cooldown-ms",
            "500",
        ])
        .unwrap();

        let Command::Present(args) = cli.command else {
            panic!("expected present");
        };
        assert_eq!(args.uid.0, vec![0xEF, 0xBE, 0xAD, 0xBA]);
        assert_eq!(args.duration_ms, 250);
        assert_eq!(args.cooldown_ms, 500);
        assert_eq!(args.uri.as_deref(), Some("https://tagpass.example"));
    }

    #[test]
    fn test_present_defaults() {
        let cli = Cli::try_parse_from(["tagpass", "present", "--uid", "0102"]).unwrap();
        let Command::Present(args) = cli.command else {
            panic!("expected present");
        };
        assert_eq!(args.duration_ms, 1000);
        assert_eq!(args.cooldown_ms, 0);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_rejects_bad_hex() {
        assert!(Cli::try_parse_from(["tagpass", "present", "--uid", "xyz"]).is_err());
        assert!(Cli::try_parse_from(["tagpass", "present", "--uid", "123"]).is_err());
    }

    #[test]
    fn test_rejects_duration_overflow() {
        let result =
            Cli::try_parse_from(["tagpass", "present", "--uid", "01", "--duration-ms", "70000"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_describe_calls() {
        let call = BackendCall::SetIdentity {
            uid: vec![0xBA, 0xAD, 0xBE, 0xEF],
            size_class: SizeClass::Single,
        };
        assert_eq!(describe(&call), "set_identity Single(4) BAADBEEF");
        assert_eq!(
            describe(&BackendCall::SetPayload { len: 256 }),
            "set_payload 256 bytes"
        );
    }
}
