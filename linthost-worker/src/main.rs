use anyhow::Result;
use clap::Parser;
use linthost_ipc::DispatcherVariant;

/// linthost worker: serves lint jobs over stdio
#[derive(Parser, Debug)]
#[command(name = "linthost-worker", version)]
struct Args {
    /// Engine entry point (v8, v8-flat or modern)
    #[arg(long, default_value = "modern")]
    dispatcher: DispatcherVariant,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    linthost_worker::run(args.dispatcher).await?;
    Ok(())
}
