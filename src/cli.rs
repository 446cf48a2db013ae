use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "xcore-wallet")]
#[command(version)]
#[command(about = "A terminal wallet for x42 cold staking delegation")]
pub struct Args {
    /// Tick rate in ticks per second
    #[arg(short, long, default_value_t = 4.0)]
    pub tick_rate: f64,

    /// Frame rate in frames per second
    #[arg(short, long, default_value_t = 30.0)]
    pub frame_rate: f64,

    /// Network to connect to (mainnet, testnet, regtest)
    /// If not specified, uses last selected network or defaults to mainnet
    #[arg(short, long)]
    pub network: Option<String>,

    /// Node API URL (overrides network default)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Wallet name on the node
    #[arg(short, long)]
    pub wallet: Option<String>,

    /// Data directory path
    #[arg(long)]
    pub data_dir: Option<String>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
