use std::rc::Rc;

use miette::IntoDiagnostic;

use routerd_config::{print, RouterConfig};

use crate::cli::Cli;
use crate::endpoint::ipc::IpcBinder;
use crate::endpoint::DropHook;
use crate::framing::FramerRegistry;
use crate::metrics::{self, RouterMetrics};
use crate::router::Router;

const PROTOCOL_LIBRARY_PATH_ENV: &str = "PROTOCOL_LIBRARY_PATH";
const PROTOCOL_LIBRARY_PATH_DEFAULT: &str = "/usr/lib/endpoint_protocols";

pub struct AppContext {
    cli: Cli,
    config: RouterConfig,
}

impl AppContext {
    /// Load and resolve the configuration. Returns `None` when `--print`
    /// asked for a config dump instead of a running daemon.
    pub fn bootstrap(cli: Cli) -> miette::Result<Option<AppContext>> {
        tracing::info!(
            file = %cli.file.display(),
            name = %cli.name,
            "loading configuration"
        );

        let config = routerd_config::load(&cli.file)?;

        if cli.print {
            print!("{}", print::render(&config));
            return Ok(None);
        }

        Ok(Some(AppContext { cli, config }))
    }

    /// Bind, build, attach, then run until a signal arrives. Must be called
    /// from within a `LocalSet`.
    pub async fn run(self) -> miette::Result<()> {
        let metrics = Rc::new(RouterMetrics::new(&self.cli.name));
        let drop_hook: DropHook = {
            let metrics = metrics.clone();
            Rc::new(move |bytes| metrics.record_dropped(bytes))
        };

        let mut binder = IpcBinder::new(drop_hook);

        // Protocol plug-ins live out of process for now; only the built-in
        // framers are registered, but the conventional path is still
        // surfaced for operators expecting it.
        let protocol_path = std::env::var(PROTOCOL_LIBRARY_PATH_ENV)
            .unwrap_or_else(|_| PROTOCOL_LIBRARY_PATH_DEFAULT.to_owned());
        let framers = FramerRegistry::with_builtins();
        tracing::debug!(
            path = %protocol_path,
            framers = ?framers.names(),
            "protocol registry ready"
        );

        let router = Router::create(&self.config, &mut binder, &framers, self.cli.sbp)?;
        metrics.set_port_counts(router.skip_framer_ports, router.accept_last_ports);

        tracing::info!(
            router = %router.name,
            ports = router.port_count(),
            sbp_framing = self.cli.sbp,
            "router running"
        );

        router.attach(&metrics);
        tokio::task::spawn_local(metrics::flush_loop(metrics));

        wait_for_shutdown().await.into_diagnostic()?;
        tracing::info!("shutting down");

        Ok(())
    }
}

async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = interrupt.recv() => tracing::info!("caught SIGINT"),
        _ = terminate.recv() => tracing::info!("caught SIGTERM"),
        _ = quit.recv() => tracing::info!("caught SIGQUIT"),
    }

    Ok(())
}
