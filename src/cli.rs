use std::{io::Write, path::PathBuf, process::ExitCode};

use chrono::Local;
use clap::{CommandFactory, Parser, error::ErrorKind};
use log::LevelFilter;

use epub_scrub::{
    batch::{BatchDriver, BatchOptions},
    pattern::PAGE_NUMBER_PATTERNS,
    types::Pattern,
};

const EXAMPLES: &str = r#"Examples:
  epub-scrub book.epub --remove "unwanted text"
  epub-scrub book.epub --remove "pattern1" --remove "pattern2"
  epub-scrub "*.epub" --regex --remove "Page \d+"
  epub-scrub book.epub --remove "text" --case-insensitive
  epub-scrub book.epub --remove "text" --dry-run --verbose"#;

#[derive(Parser, Debug)]
#[command(
    name = "epub-scrub",
    version,
    about = "Remove text patterns from EPUB files",
    after_help = EXAMPLES
)]
pub struct CliArgs {
    /// EPUB file(s) or glob patterns to process
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<String>,

    /// Text pattern to remove (can be specified multiple times)
    #[arg(short = 'r', long = "remove", value_name = "PATTERN", allow_hyphen_values = true)]
    pub patterns: Vec<String>,

    /// Treat patterns as regular expressions
    #[arg(long, default_value_t = false)]
    pub regex: bool,

    /// Output file path (single file only)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Suffix for output files
    #[arg(long, default_value = "_cleaned", allow_hyphen_values = true)]
    pub output_suffix: String,

    /// Case-insensitive matching
    #[arg(long, default_value_t = false)]
    pub case_insensitive: bool,

    /// Do not create backup files
    #[arg(long, default_value_t = false)]
    pub no_backup: bool,

    /// Preview changes without modifying files
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Show detailed processing information
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Remove common page number patterns (implies --regex)
    #[arg(long, default_value_t = false)]
    pub remove_page_numbers: bool,
}

impl CliArgs {
    /// Checks argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), clap::Error> {
        if self.patterns.is_empty() && !self.remove_page_numbers {
            return Err(CliArgs::command().error(
                ErrorKind::MissingRequiredArgument,
                "No patterns specified. Use --remove or --remove-page-numbers",
            ));
        }

        if self.output.is_some() && self.files.len() > 1 {
            return Err(CliArgs::command().error(
                ErrorKind::ArgumentConflict,
                "--output can only be used with a single file",
            ));
        }

        Ok(())
    }

    /// The user's patterns followed by the page number shorthand, if requested
    pub fn build_patterns(&self) -> Vec<Pattern> {
        let use_regex = self.regex || self.remove_page_numbers;

        let mut patterns = self
            .patterns
            .iter()
            .map(|text| Pattern {
                text: text.clone(),
                is_regex: use_regex,
            })
            .collect::<Vec<_>>();

        if self.remove_page_numbers {
            patterns.extend(PAGE_NUMBER_PATTERNS.iter().map(|text| Pattern::regex(text)));
        }

        patterns
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            patterns: self.build_patterns(),
            case_sensitive: !self.case_insensitive,
            backup: !self.no_backup,
            dry_run: self.dry_run,
            output: self.output.clone(),
            output_suffix: self.output_suffix.clone(),
        }
    }
}

/// Installs the stdout logger
///
/// This crate logs at info level with `--verbose` and only warnings and
/// errors otherwise. `RUST_LOG` overrides both.
fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module("epub_scrub", level)
        .parse_default_env()
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

pub fn run(args: CliArgs) -> ExitCode {
    if let Err(err) = args.validate() {
        err.exit();
    }

    init_logger(args.verbose);

    let mut driver = BatchDriver::new(args.batch_options());
    let successful = driver.run(&args.files);

    println!();
    println!("{}", driver.report().summary(driver.options().dry_run));

    if successful > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
