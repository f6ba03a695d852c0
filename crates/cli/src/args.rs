use clap::{Parser, Subcommand};
use perp_funding_sdk::{MarketAccounts, types::Pubkey};

pub(crate) const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

#[derive(Parser, Debug)]
#[command(name = "perp-funding-cli", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON-RPC endpoint to fetch accounts from
    #[arg(long, global = true, env = "RPC_URL", default_value_t = DEFAULT_RPC_URL.to_string())]
    pub rpc: String,

    /// Websocket endpoint for account subscriptions [default: derived from
    /// `--rpc`]
    #[arg(long, global = true, env = "WS_URL")]
    pub ws: Option<String>,

    /// Perp market account [default: SOL-PERP]
    #[arg(long, global = true)]
    pub market: Option<Pubkey>,

    /// Bids account of the market [default: SOL-PERP bids]
    #[arg(long, global = true)]
    pub bids: Option<Pubkey>,

    /// Asks account of the market [default: SOL-PERP asks]
    #[arg(long, global = true)]
    pub asks: Option<Pubkey>,

    /// Oracle account of the market [default: SOL-PERP oracle]
    #[arg(long, global = true)]
    pub oracle: Option<Pubkey>,

    /// Timeout of one batch fetch, in seconds
    #[arg(long, global = true, default_value_t = 10)]
    pub fetch_timeout: u64,
}

impl Cli {
    pub(crate) fn accounts(&self) -> MarketAccounts {
        let defaults = MarketAccounts::sol_perp();
        MarketAccounts::custom(
            self.market.unwrap_or(defaults.perp_market()),
            self.bids.unwrap_or(defaults.bids()),
            self.asks.unwrap_or(defaults.asks()),
            self.oracle.unwrap_or(defaults.oracle()),
        )
    }

    pub(crate) fn ws_url(&self) -> String {
        match &self.ws {
            Some(ws) => ws.clone(),
            None => self.rpc.replacen("https://", "wss://", 1).replacen("http://", "ws://", 1),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch market state once and print parameters, oracle, top of book
    /// and funding
    Snapshot {
        /// Number of price levels to display (0 = none)
        #[arg(short, long, default_value_t = 5)]
        depth: usize,
    },
    /// Show live order book
    Book {
        /// Number of price levels to display (0 = all)
        #[arg(short, long, default_value_t = 10)]
        depth: usize,

        /// Maximum orders to show per level (0 = all)
        #[arg(long, default_value_t = 10)]
        orders_per_level: usize,

        /// Whether to show expired orders
        #[arg(long, default_value_t = false)]
        show_expired: bool,

        /// Follow account subscriptions instead of polling
        #[arg(long, default_value_t = false)]
        subscribe: bool,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Sample the funding rate of the market and of Drift, and log one and
    /// five minute averages per venue
    Funding {
        /// Venue name attached to funding records
        #[arg(long, default_value = "mango")]
        venue: String,

        /// Drift perp market sampled next to the market [default: Drift
        /// SOL-PERP]
        #[arg(long)]
        drift_market: Option<Pubkey>,

        /// Sample the market only, without Drift
        #[arg(long, default_value_t = false)]
        no_drift: bool,

        /// Number of samples to take [default: unlimited, until terminated
        /// by (Ctrl+C)]
        #[arg(long)]
        num_samples: Option<u64>,
    },
}
