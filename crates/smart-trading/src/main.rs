mod cli;
mod spider;

// remote imports
use clap::Parser;
use cli::{Cli, TraceLevel};
use smart_trading_spider::config::Config;
use tracing::{subscriber, trace, Level};
use tracing_subscriber::FmtSubscriber;

////////////////////////////////////////////////////////////////////////////

// preprocess the trace level
fn preprocess(trace_level: Level) -> anyhow::Result<()> {
    let my_subscriber = FmtSubscriber::builder()
        .with_max_level(trace_level)
        .with_file(true)
        .with_line_number(true)
        .finish();
    subscriber::set_global_default(my_subscriber)?;
    Ok(())
}

////////////////////////////////////////////////////////////////////////////

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // set the trace level
    if let Some(trace_level) = cli.trace {
        preprocess(match trace_level {
            TraceLevel::DEBUG => Level::DEBUG,
            TraceLevel::ERROR => Level::ERROR,
            TraceLevel::INFO => Level::INFO,
            TraceLevel::TRACE => Level::TRACE,
            TraceLevel::WARN => Level::WARN,
        })?;
    }
    trace!("command line input recorded: {cli:?}");

    // if no trace level provided, use tui
    let tui = cli.trace.is_none();

    // reads .env as well
    let config = Config::from_env();

    // read cli inputs
    use cli::Commands::*;
    match cli.command {
        // `smart-trading prices --price-type <daily|intraday> ...`
        Prices {
            tickers_list,
            stock_index,
            price_type,
            interval,
            after_hours,
            start_date,
            save_csv,
            write_db,
        } => {
            let args = spider::PricesArgs {
                tickers_list,
                stock_index,
                price_type,
                interval,
                after_hours,
                start_date,
                save_csv,
                write_db,
            };
            spider::prices(&config, args, tui).await?;
        }

        // `smart-trading earnings [--earnings-bootstrap]`
        Earnings {
            earnings_bootstrap,
            stock_index,
            save_csv,
        } => {
            spider::earnings(&config, stock_index, earnings_bootstrap, save_csv, tui).await?;
        }

        Tickers { stock_index } => spider::tickers(&config, stock_index, tui).await?,

        Init => spider::init(&config, tui).await?,
    }

    Ok(())
}
