use chrono::NaiveDate;
use serde::Serialize;

use super::failure;
use crate::api::JournalBackend;
use crate::models::{Journal, Session, Trade, TradeFilters};

/// Column order of [`TradeRecord`]. Written even when there are no rows.
const HEADER: [&str; 14] = [
    "trade_date",
    "account_id",
    "asset",
    "killzone",
    "direction",
    "market_phase",
    "setup",
    "risk_pct",
    "rr",
    "outcome",
    "pnl_money",
    "htf_screenshot_url",
    "ltf_screenshot_url",
    "comment",
];

#[derive(Debug, Serialize)]
struct TradeRecord<'a> {
    trade_date: NaiveDate,
    account_id: &'a str,
    asset: &'a str,
    killzone: &'static str,
    direction: &'static str,
    market_phase: &'static str,
    setup: &'a str,
    risk_pct: f64,
    rr: f64,
    outcome: &'static str,
    pnl_money: f64,
    htf_screenshot_url: &'a str,
    ltf_screenshot_url: &'a str,
    comment: &'a str,
}

impl<'a> From<&'a Trade> for TradeRecord<'a> {
    fn from(trade: &'a Trade) -> Self {
        TradeRecord {
            trade_date: trade.trade_date,
            account_id: trade.account_id.as_deref().unwrap_or_default(),
            asset: &trade.asset,
            killzone: trade.killzone.as_str(),
            direction: trade.direction.as_str(),
            market_phase: trade.market_phase.as_str(),
            setup: trade.setup.as_deref().unwrap_or_default(),
            risk_pct: trade.risk_pct,
            rr: trade.rr,
            outcome: trade.outcome.as_str(),
            pnl_money: trade.pnl_money,
            htf_screenshot_url: trade.htf_screenshot_url.as_deref().unwrap_or_default(),
            ltf_screenshot_url: trade.ltf_screenshot_url.as_deref().unwrap_or_default(),
            comment: trade.comment.as_deref().unwrap_or_default(),
        }
    }
}

pub fn trades_to_csv(trades: &[Trade]) -> Result<String, String> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(vec![]);
    wtr.write_record(HEADER)
        .map_err(|e| format!("CSV serialization error: {}", e))?;
    for trade in trades {
        wtr.serialize(TradeRecord::from(trade))
            .map_err(|e| format!("CSV serialization error: {}", e))?;
    }
    let data = wtr.into_inner().map_err(|e| format!("CSV writer error: {}", e))?;
    String::from_utf8(data).map_err(|e| e.to_string())
}

pub fn export_filename(journal: Journal, today: NaiveDate) -> String {
    format!("{}_{}.csv", journal.table(), today.format("%Y-%m-%d"))
}

pub async fn export_trades(
    backend: &dyn JournalBackend,
    session: &Session,
    journal: Journal,
    filters: &TradeFilters,
) -> Result<String, String> {
    let trades = backend
        .list_trades(session, journal, filters)
        .await
        .map_err(|e| failure("Export trades", e))?;

    log::info!("Exporting {} {} rows", trades.len(), journal.table());
    trades_to_csv(&trades)
}
