use clap::Parser;
use tokio::task::LocalSet;

use routerd::app_context::AppContext;
use routerd::cli::Cli;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // The whole data plane is cooperative on this one thread.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build Tokio runtime");

    let local = LocalSet::new();
    rt.block_on(local.run_until(async {
        match AppContext::bootstrap(cli)? {
            Some(ctx) => ctx.run().await,
            None => Ok(()),
        }
    }))
}
