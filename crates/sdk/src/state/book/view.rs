use std::iter;

use colored::Colorize;
use itertools::Itertools;
use tabled::{
    Table,
    settings::{
        Alignment, Panel, Style, Width,
        object::{Row, Rows},
    },
};

use super::BookSide;
use crate::state::PerpOrder;

/// View of both sides of a book.
///
/// Renders every order as a plain table by default, or a compact L3 table of
/// price levels with the `{:#}` alternate format, limited by depth and number
/// of orders per level.
pub struct BookView<'a> {
    bids: &'a BookSide,
    asks: &'a BookSide,
    depth: Option<usize>,
    orders_per_level: Option<usize>,
    show_expired: bool,
}

impl<'a> BookView<'a> {
    pub fn new(bids: &'a BookSide, asks: &'a BookSide) -> Self {
        Self { bids, asks, depth: None, orders_per_level: None, show_expired: false }
    }

    pub fn with_depth(self, depth: usize) -> Self { Self { depth: Some(depth), ..self } }

    pub fn with_orders_per_level(self, orders_per_level: usize) -> Self {
        Self { orders_per_level: Some(orders_per_level), ..self }
    }

    pub fn with_expired(self, show_expired: bool) -> Self { Self { show_expired, ..self } }

    fn levels(&self, side: &BookSide) -> Vec<(f64, Vec<PerpOrder>)> {
        let mut levels = Vec::new();
        let orders = side.items().filter(|o| self.show_expired || !o.is_expired());
        for (price, orders) in &orders.chunk_by(PerpOrder::price_lots) {
            if Some(levels.len()) == self.depth {
                break;
            }
            levels.push((side.pricing().price_lots_to_ui(price), orders.collect()));
        }
        levels
    }
}

impl std::fmt::Display for BookView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let spread_panel = |table: &mut Table, num_ask_rows: usize| {
            if let Some((best_ask, best_bid)) = self.asks.best().zip(self.bids.best()) {
                let (ask, bid) = (best_ask.ui_price(), best_bid.ui_price());
                table.with(Panel::horizontal(
                    num_ask_rows,
                    format!(
                        "Best ASK: {} :: Best BID: {} :: Spread: {} ({:.2} %)",
                        ask,
                        bid,
                        ask - bid,
                        (ask - bid) / ((ask + bid) / 2.0) * 100.0
                    ),
                ));
                table.modify(Row::from(num_ask_rows), Alignment::right());
            }
        };

        if f.alternate() {
            let level_orders = |orders: &[PerpOrder]| {
                let mut out = String::with_capacity(64 * orders.len());
                for (i, order) in orders.iter().take(self.orders_per_level.unwrap_or(orders.len())).enumerate() {
                    if i > 0 && i % 4 == 0 {
                        out.push('\n');
                    }
                    if order.is_expired() || order.is_invalid_peg() {
                        out.push_str(format!("{:#} ", order).strikethrough().to_string().as_str());
                    } else {
                        out.push_str(format!("{:#} ", order).as_str());
                    }
                }
                out
            };

            let rows = |side: &BookSide, paint: fn(String) -> String| {
                let mut cumulative = 0.0;
                let mut num_orders = 0;
                let rows = self
                    .levels(side)
                    .iter()
                    .map(|(price, orders)| {
                        let size: f64 = orders.iter().map(PerpOrder::ui_size).sum();
                        cumulative += size;
                        num_orders += orders.len();
                        vec![
                            paint(price.to_string()),
                            paint(size.to_string()),
                            paint(cumulative.to_string()),
                            paint(orders.len().to_string()),
                            level_orders(orders),
                        ]
                    })
                    .collect::<Vec<_>>();
                (rows, cumulative, num_orders)
            };

            let (asks, ask_size, num_ask_orders) = rows(self.asks, |s| s.red().to_string());
            let (bids, bid_size, num_bid_orders) = rows(self.bids, |s| s.green().to_string());
            let num_ask_levels = asks.len();

            let header = vec![
                "Price".to_string(),
                "Size".to_string(),
                "Cum Size".to_string(),
                "Num Orders".to_string(),
                "Orders".to_string(),
            ];
            let mut table =
                Table::from_iter(iter::once(&header).chain(asks.iter().rev()).chain(bids.iter()));

            let (ask_pct, bid_pct) = if ask_size + bid_size > 0.0 {
                let total = ask_size + bid_size;
                (ask_size / total * 100.0, bid_size / total * 100.0)
            } else {
                (0.0, 0.0)
            };
            table.with(Panel::header(format!(
                "Total orders: {} :: ASK orders: {}, levels: {}, size: {} ({:.1}%) :: BID orders: \
                 {}, levels: {}, size: {} ({:.1}%)",
                num_ask_orders + num_bid_orders,
                num_ask_orders,
                num_ask_levels,
                ask_size,
                ask_pct,
                num_bid_orders,
                bids.len(),
                bid_size,
                bid_pct,
            )));
            table.modify(Rows::first(), Alignment::right());

            // Panel header and column names come first
            spread_panel(&mut table, num_ask_levels + 2);

            if let Some(max_width) = f.width() {
                table.with(Width::wrap(max_width));
            }

            table.with(Style::modern());
            writeln!(f, "{}", table)
        } else {
            let visible = |o: &PerpOrder| self.show_expired || !o.is_expired();
            let ask_orders = self.asks.items().filter(visible).collect::<Vec<_>>();
            let num_ask_orders = ask_orders.len();
            let mut table =
                Table::new(ask_orders.into_iter().rev().chain(self.bids.items().filter(visible)));
            spread_panel(&mut table, num_ask_orders + 1);
            table.with(Style::sharp());
            writeln!(f, "{}", table)
        }
    }
}
