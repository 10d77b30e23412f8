use clap::{Parser, Subcommand};
use lantern::{Site, config, output};
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "lantern")]
#[command(about = "Static site generator with cascading data and pluggable template engines")]
#[command(long_about = "\
Static site generator with cascading data and pluggable template engines

Your source tree is the site. Markdown and Tera files become pages, data
files cascade down the directories they live in, and layouts wrap pages
from the includes directory.

Project structure:

  site/
  ├── _config.toml                 # Site config (optional)
  ├── _data.yml                    # Data for every page
  ├── _includes/                   # Layouts and partials
  │   └── layouts/base.tera
  ├── _components/                 # Components, called with comp(name=...)
  │   └── card.tera
  ├── index.md                     # Page → /
  ├── 010-guides/                  # Prefix sets `order`, stripped from URLs
  │   ├── _data.toml               # Data for pages in guides/
  │   └── 002-install.md           # Page → /guides/install/
  ├── blog/
  │   ├── index.tera               # `paginate` expands into /blog/page-2/ ...
  │   └── 2024-03-09_launch.md     # Prefix sets `date`
  ├── css/site.css                 # Asset → /css/site.css
  └── img/                         # Copied by a [[copy]] rule

Data precedence (last wins):
  parent directory data → directory data → name prefix → front matter

Run 'lantern gen-config' to generate a documented _config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root containing _config.toml
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Print debug logs to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: scan → render → process → write
    Build,
    /// Validate the source tree without rendering or writing
    Check,
    /// Print a stock _config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Command::Build => {
            let mut site = Site::load(&cli.root)?;
            init_thread_pool(&site.config().processing);
            println!("==> Building {}", cli.root.display());

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_build_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = site.build(Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            output::print_build_report(&result?, site.root());
        }
        Command::Check => {
            let site = Site::load(&cli.root)?;
            let source = site.root().join(&site.config().src);
            println!("==> Checking {}", source.display());
            let scanned = site.scan()?;
            output::print_scan_output(&scanned, &source);
            println!("==> Source is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Send library logs to stderr. `RUST_LOG` sets the filter, defaulting to
/// `warn`; `--verbose` raises it to DEBUG.
fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::EnvFilter;

    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if verbose {
        filter = filter.add_directive(tracing::Level::DEBUG.into());
    }
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
