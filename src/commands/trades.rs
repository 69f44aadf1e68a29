use super::failure;
use crate::api::JournalBackend;
use crate::models::{Journal, Session, Trade, TradeFilters, TradeForm};

pub async fn list_trades(
    backend: &dyn JournalBackend,
    session: &Session,
    journal: Journal,
    filters: &TradeFilters,
) -> Result<Vec<Trade>, String> {
    if let (Some(start), Some(end)) = (filters.start_date, filters.end_date) {
        if start > end {
            return Err("Start date must not be after end date.".to_string());
        }
    }

    backend
        .list_trades(session, journal, filters)
        .await
        .map_err(|e| failure("Load trades", e))
}

pub async fn create_trade(
    backend: &dyn JournalBackend,
    session: &Session,
    journal: Journal,
    form: &TradeForm,
) -> Result<Trade, String> {
    let draft = form.validate(journal)?;
    let trade = backend
        .insert_trade(session, journal, &draft)
        .await
        .map_err(|e| failure("Save trade", e))?;

    log::info!("Saved {} trade {} ({})", journal.table(), trade.id, trade.outcome);
    Ok(trade)
}

pub async fn update_trade(
    backend: &dyn JournalBackend,
    session: &Session,
    journal: Journal,
    id: &str,
    form: &TradeForm,
) -> Result<Trade, String> {
    let draft = form.validate(journal)?;
    backend
        .update_trade(session, journal, id, &draft)
        .await
        .map_err(|e| failure("Update trade", e))
}

pub async fn delete_trade(backend: &dyn JournalBackend, session: &Session, journal: Journal, id: &str) -> Result<(), String> {
    backend
        .delete_trade(session, journal, id)
        .await
        .map_err(|e| failure("Delete trade", e))?;

    log::info!("Deleted {} trade {}", journal.table(), id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::local_backend::tests::{account_draft, register};
    use crate::db::LocalBackend;
    use crate::models::{Outcome, Phase};
    use chrono::NaiveDate;

    fn form(date: &str, outcome: Outcome, pnl: &str, account_id: Option<&str>) -> TradeForm {
        TradeForm {
            account_id: account_id.map(str::to_string),
            trade_date: date.to_string(),
            asset: "NAS100".to_string(),
            outcome,
            pnl_money: pnl.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_live_trade_crud() {
        let backend = LocalBackend::in_memory().unwrap();
        let session = register(&backend, "me@mail.com").await;
        let account = backend
            .insert_account(&session, &account_draft("L1", Phase::Live, 10000.0, 10000.0))
            .await
            .unwrap();

        let missing_account = create_trade(&backend, &session, Journal::Live, &form("2026-10-05", Outcome::TakeProfit, "100", None)).await;
        assert!(missing_account.is_err());

        let trade = create_trade(
            &backend,
            &session,
            Journal::Live,
            &form("2026-10-05", Outcome::StopLoss, "120", Some(&account.id)),
        )
        .await
        .unwrap();
        assert_eq!(trade.pnl_money, -120.0);
        assert_eq!(trade.account_id.as_deref(), Some(account.id.as_str()));

        let updated = update_trade(
            &backend,
            &session,
            Journal::Live,
            &trade.id,
            &form("2026-10-05", Outcome::BreakEvenPlus, "-5", Some(&account.id)),
        )
        .await
        .unwrap();
        assert_eq!(updated.pnl_money, 5.0);

        let trades = list_trades(&backend, &session, Journal::Live, &TradeFilters::default()).await.unwrap();
        assert_eq!(trades.len(), 1);

        delete_trade(&backend, &session, Journal::Live, &trade.id).await.unwrap();
        assert!(list_trades(&backend, &session, Journal::Live, &TradeFilters::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_backtest_trades_are_separate() {
        let backend = LocalBackend::in_memory().unwrap();
        let session = register(&backend, "me@mail.com").await;

        create_trade(&backend, &session, Journal::Backtest, &form("2026-10-06", Outcome::TakeProfit, "300", None))
            .await
            .unwrap();

        assert_eq!(list_trades(&backend, &session, Journal::Backtest, &TradeFilters::default()).await.unwrap().len(), 1);
        assert!(list_trades(&backend, &session, Journal::Live, &TradeFilters::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filters() {
        let backend = LocalBackend::in_memory().unwrap();
        let session = register(&backend, "me@mail.com").await;

        for (date, outcome) in [("2026-10-01", Outcome::TakeProfit), ("2026-10-02", Outcome::StopLoss), ("2026-10-03", Outcome::TakeProfit)] {
            create_trade(&backend, &session, Journal::Backtest, &form(date, outcome, "10", None))
                .await
                .unwrap();
        }

        let wins = TradeFilters {
            outcome: Some(Outcome::TakeProfit),
            ..Default::default()
        };
        assert_eq!(list_trades(&backend, &session, Journal::Backtest, &wins).await.unwrap().len(), 2);

        let backwards = TradeFilters::between(
            NaiveDate::from_ymd_opt(2026, 10, 3).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
        );
        assert!(list_trades(&backend, &session, Journal::Backtest, &backwards).await.is_err());
    }
}
