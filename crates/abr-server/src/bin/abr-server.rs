//! Binary entrypoint for the ABR business search HTTP server.
//!
//! Dispatches on the hidden `--worker` marker (§4.6.1): with no marker,
//! this process is the primary — it forks and supervises the worker
//! processes and serves no requests itself. With `--worker`, it is one of
//! those forked children — it builds its own `Repository` pool and serves
//! the four endpoints in §6.1 until told to shut down.

use clap::Parser;

use abr_server::{init_logging, process, run_worker, ServerConfig};

fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {error}");
        }
        std::process::exit(1);
    }

    if config.worker {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(async {
            let listener = process::worker_listener(&config)?;
            run_worker(config, listener).await
        })
    } else {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(process::run_primary(&config))
    }
}
