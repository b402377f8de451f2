use clap::Parser;

/// OIDC login to AWS console federation service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Durable store file path
    #[arg(long)]
    pub store: Option<String>,

    /// Keep all state in memory; nothing is written to disk
    #[arg(long)]
    pub ephemeral: bool,

    /// Open the system browser and start the login flow after startup
    #[arg(long)]
    pub open: bool,
}
