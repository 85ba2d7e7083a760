use registry_sync::cli::{Args, Runner};
use registry_sync::logging::Logger;
use std::fs::File;
use std::process;

const EXIT_FATAL: i32 = 2;

fn init_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()));

    if let Some(path) = &args.logfile {
        let file = File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse_args();
    let console = if args.quiet {
        Logger::new_quiet()
    } else {
        Logger::new(args.verbose)
    };

    if let Err(e) = init_logging(&args) {
        console.error(&format!("Cannot set up logging: {}", e));
        process::exit(EXIT_FATAL);
    }

    let runner = match args.resolve_config().and_then(Runner::new) {
        Ok(runner) => runner,
        Err(e) => {
            console.error(&e.to_string());
            if args.local_url.is_none() || args.remote_url.is_none() {
                Args::print_examples();
            }
            process::exit(EXIT_FATAL);
        }
    };

    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling outstanding work");
            cancel.cancel();
        }
    });

    match runner.run().await {
        Ok(report) => process::exit(report.exit_code()),
        Err(e) => {
            console.error(&e.to_string());
            process::exit(EXIT_FATAL);
        }
    }
}
