use std::{io::Write, time::Duration};

use crossterm::{
    QueueableCommand,
    cursor::MoveTo,
    execute,
    style::Print,
    terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use perp_funding_sdk::{funding::funding_apr, oracle::OracleDecoder, state::BookView};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{MarketSynchronizer, market_state};

pub(crate) async fn render(
    synchronizer: &MarketSynchronizer,
    oracle_decoder: &OracleDecoder,
    depth: usize,
    orders_per_level: usize,
    show_expired: bool,
    interval: Duration,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, Clear(ClearType::All), MoveTo(0, 0))?;

    let mut last = None;
    while !cancellation_token.is_cancelled() {
        // No-op when following subscriptions
        if let Err(err) = synchronizer.poll().await {
            warn!(error = %err, "poll failed, showing previous state");
        }

        let snapshot = synchronizer.snapshot();
        if last.as_ref().is_none_or(|last| !snapshot.same_as(last)) {
            let state = market_state(synchronizer, oracle_decoder)?;
            let rate = state.funding_rate();

            stdout.queue(Clear(ClearType::All))?;
            stdout.queue(MoveTo(0, 0))?;

            // Market summary
            stdout.queue(Print(format!("{}", state.market())))?;
            stdout.queue(Print(format!(
                "Funding: {:.6} %/day :: APR: {:.2} %\n",
                rate * 100.0,
                funding_apr(rate)
            )))?;

            // Book
            let mut view = BookView::new(state.bids(), state.asks()).with_expired(show_expired);
            if depth > 0 {
                view = view.with_depth(depth);
            }
            if orders_per_level > 0 {
                view = view.with_orders_per_level(orders_per_level);
            }
            stdout.queue(Print(format!("{:#}", view)))?;
            stdout.flush()?;

            last = Some(snapshot);
        }

        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {},
        }
    }

    execute!(stdout, LeaveAlternateScreen)?;

    Ok(())
}
