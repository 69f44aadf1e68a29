#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = prop_journal_lib::run().await;
    if let Err(err) = &result {
        log::error!("{:#}", err);
    }
    result
}
