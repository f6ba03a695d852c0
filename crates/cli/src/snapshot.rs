use colored::Colorize;
use perp_funding_sdk::{funding::funding_apr, oracle::OracleDecoder, state::BookView};

use crate::{MarketSynchronizer, market_state};

pub(crate) fn render(
    synchronizer: &MarketSynchronizer,
    oracle_decoder: &OracleDecoder,
    depth: usize,
) -> anyhow::Result<()> {
    let state = market_state(synchronizer, oracle_decoder)?;
    let market = state.market();

    println!("{}\n", format!("{:#^96}", format!(" {} Snapshot ", market.name())).bold().purple());
    println!("{}", market);

    match state.bids().best() {
        Some(bid) => println!("Best BID: {}", bid),
        None => println!("Best BID: -"),
    }
    match state.asks().best() {
        Some(ask) => println!("Best ASK: {}", ask),
        None => println!("Best ASK: -"),
    }

    let rate = state.funding_rate();
    println!(
        "Funding: {:.6} %/day :: APR: {}\n",
        rate * 100.0,
        format!("{:.2} %", funding_apr(rate)).bold()
    );

    if depth > 0 {
        println!("{:#}", BookView::new(state.bids(), state.asks()).with_depth(depth).with_orders_per_level(4));
    }
    Ok(())
}
