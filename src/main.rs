use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tutorial_tools::cache::HttpFetcher;
use tutorial_tools::config::{self, CONFIG_FILENAME};
use tutorial_tools::driver::Driver;
use tutorial_tools::output;

/// Template roots plus the branch to build for.
#[derive(clap::Args, Clone)]
struct RootArgs {
    /// Template roots to process (`intro` for `.template.intro.ipynb`)
    #[arg(required = true, value_name = "ROOT")]
    roots: Vec<String>,

    /// Branch to build for; defaults to the current git branch
    #[arg(long)]
    branch: Option<String>,
}

#[derive(Parser)]
#[command(name = "tutorial-tools")]
#[command(version)]
#[command(about = "Build tutorial docs, scripts, and notebooks from notebook templates")]
#[command(long_about = "\
Build tutorial docs, scripts, and notebooks from notebook templates

Run from a tutorial's doc directory. Each template root <root> is read from
.template.<root>.ipynb and produces:

  <root>.md             doxygen markdown for the HTML pages
  <root>.py / <root>.sh runnable script (only if there are code cells)
  <root>.ipynb          notebook for download
  <root>-colab.ipynb    notebook for Google Colab (only if it differs)

Cell directives (first line of a cell, optionally behind '#'):
  %%htmlexclude / %%htmlonly    HTML docs
  %%nbexclude / %%nbonly        downloadable notebook
  %%colabexclude / %%colabonly  Colab notebook (colabonly cells skip the script)

Markdown line directives:
  %gencelloutputs   run code cells and store their outputs
  %intersphinx URL  resolve @ref links against URL/objects.inv

Run 'tutorial-tools gen-config' to generate a documented tutorial-tools.toml.")]
struct Cli {
    /// Tutorial doc directory
    #[arg(long, default_value = ".", global = true)]
    dir: PathBuf,

    /// Config file (default: <dir>/tutorial-tools.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every stage to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate markdown, scripts, and notebooks, then build the HTML docs
    Build(RootArgs),
    /// Generate markdown, scripts, and notebooks only
    Notebooks(RootArgs),
    /// Write the Doxyfile for the given templates without running doxygen
    Doxyfile(RootArgs),
    /// Build the HTML docs of a plain doxygen doc directory
    Docs {
        /// Branch to build for; defaults to the current git branch
        #[arg(long)]
        branch: Option<String>,
    },
    /// Print a stock tutorial-tools.toml with all options documented
    GenConfig,
}

/// Doc directory, config, and network transport for one run.
struct Session {
    dir: PathBuf,
    config: config::ToolConfig,
    fetcher: HttpFetcher,
}

impl Session {
    fn open(dir: &Path, config_path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = dir.canonicalize()?;
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.join(CONFIG_FILENAME));
        log::debug!("Config: {}", config_path.display());
        let config = config::load_config(&config_path)?;
        let fetcher = HttpFetcher::new()?;
        Ok(Self {
            dir,
            config,
            fetcher,
        })
    }

    fn driver(&self) -> Driver<'_, HttpFetcher> {
        Driver::new(&self.dir, self.config.clone(), &self.fetcher)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Build(args) => {
            let session = Session::open(&cli.dir, config_path)?;
            let report = session.driver().build(&args.roots, args.branch.as_deref())?;
            output::print_build_report(&report, &session.dir);
        }
        Command::Notebooks(args) => {
            let session = Session::open(&cli.dir, config_path)?;
            let report = session
                .driver()
                .notebooks(&args.roots, args.branch.as_deref())?;
            output::print_notebook_report(&report, &session.dir);
        }
        Command::Doxyfile(args) => {
            let session = Session::open(&cli.dir, config_path)?;
            let report = session
                .driver()
                .doxyfile(&args.roots, args.branch.as_deref())?;
            output::print_doxyfile_report(&report, &session.dir);
        }
        Command::Docs { branch } => {
            let session = Session::open(&cli.dir, config_path)?;
            let report = session.driver().docs(branch.as_deref())?;
            output::print_docs_report(&report, &session.dir);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}
