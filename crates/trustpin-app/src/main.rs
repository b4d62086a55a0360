use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use trustpin::{Engine, LogLevel, PinningMode};

/// Verify a server certificate against a signed pinning policy.
#[derive(Parser)]
#[command(name = "trustpin", version)]
struct Args {
	/// Organization identifier the policy is published under
	#[arg(long)]
	organization_id: String,

	/// Project identifier within the organization
	#[arg(long)]
	project_id: String,

	/// Base64-encoded ECDSA P-256 public key (SubjectPublicKeyInfo DER)
	#[arg(long)]
	public_key: String,

	/// Behavior for hosts absent from the policy: strict or permissive
	#[arg(long, default_value = "strict")]
	mode: PinningMode,

	/// Hostname presented by the server
	#[arg(long)]
	host: String,

	/// Path to the server's leaf certificate in PEM form
	#[arg(long)]
	cert: PathBuf,

	/// Log severity: none, error, info or debug
	#[arg(long, default_value = "error")]
	log_level: LogLevel,
}

#[tokio::main]
async fn main() -> ExitCode {
	let args = Args::parse();
	trustpin::telemetry::init(args.log_level);
	match run(args).await {
		Ok(()) => {
			println!("trusted");
			ExitCode::SUCCESS
		},
		Err(err) => {
			eprintln!("verification failed: {err:#}");
			ExitCode::FAILURE
		},
	}
}

async fn run(args: Args) -> anyhow::Result<()> {
	let pem = std::fs::read_to_string(&args.cert)?;
	let engine = Engine::new();
	engine
		.setup(
			&args.organization_id,
			&args.project_id,
			&args.public_key,
			args.mode,
		)
		.await?;
	engine.verify(&args.host, &pem).await?;
	Ok(())
}
