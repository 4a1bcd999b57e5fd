use clap::Parser;
use miette::Result;
use rsdb::cli::{Cli, Commands, GlobalOpts};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    // Install miette's fancy error handler for beautiful diagnostics
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(&global);

    match cli.command {
        Commands::Check(args) => rsdb::cli::commands::check::run(args, &global),
        Commands::Enums(args) => rsdb::cli::commands::enums::run(args, &global),
        Commands::Convert(args) => rsdb::cli::commands::convert::run(args),
        Commands::Schema(args) => rsdb::cli::commands::schema::run(args, &global),
        Commands::Completions(args) => rsdb::cli::commands::completions::run(args),
    }
}

/// Log to stderr; `RSDB_LOG` overrides the level chosen by -q/-v
fn init_logging(global: &GlobalOpts) {
    let default_level = if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("RSDB_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
