//! Batch Driver
//!
//! Resolves command line arguments into EPUB files and scrubs them one after
//! another. A failing file is logged and skipped; the remaining files are
//! still processed.

use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::{
    archive::transform,
    error::ScrubError,
    types::{ArchiveJob, Pattern, ProcessingReport},
    utils::is_epub_file,
};

/// Settings shared by every job of a run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub patterns: Vec<Pattern>,
    pub case_sensitive: bool,
    pub backup: bool,
    pub dry_run: bool,

    /// Explicit output path, honoured only when a single file is processed
    pub output: Option<PathBuf>,

    pub output_suffix: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            patterns: vec![],
            case_sensitive: true,
            backup: true,
            dry_run: false,
            output: None,
            output_suffix: "_cleaned".to_string(),
        }
    }
}

/// Runs jobs over a list of files and accumulates a [ProcessingReport]
pub struct BatchDriver {
    options: BatchOptions,
    report: ProcessingReport,
}

impl BatchDriver {
    pub fn new(options: BatchOptions) -> Self {
        Self {
            options,
            report: ProcessingReport::default(),
        }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn report(&self) -> &ProcessingReport {
        &self.report
    }

    /// Resolves `file_args` against the current directory and processes them
    ///
    /// # Return
    /// The number of files that were changed, or would be in dry-run mode
    pub fn run(&mut self, file_args: &[String]) -> usize {
        let cwd = match std::env::current_dir() {
            Ok(cwd) => cwd,
            Err(err) => {
                error!("Unable to determine the current directory: {}", err);
                return 0;
            }
        };

        self.run_in(file_args, &cwd)
    }

    /// Same as [BatchDriver::run], resolving globs relative to `cwd`
    pub fn run_in(&mut self, file_args: &[String], cwd: &Path) -> usize {
        let files = resolve_inputs(file_args, cwd);
        if files.is_empty() {
            error!("{}", ScrubError::NoInputFiles);
            return 0;
        }

        info!("Found {} EPUB file(s) to process", files.len());
        self.process(&files)
    }

    /// Processes already resolved files in order
    pub fn process(&mut self, files: &[PathBuf]) -> usize {
        let single = files.len() == 1;
        let mut successful = 0;

        for file in files {
            let job = ArchiveJob {
                input: file.clone(),
                output: if single {
                    self.options.output.clone()
                } else {
                    None
                },
                patterns: self.options.patterns.clone(),
                case_sensitive: self.options.case_sensitive,
                backup: self.options.backup,
                dry_run: self.options.dry_run,
                output_suffix: self.options.output_suffix.clone(),
            };

            if transform(&job, &mut self.report) {
                successful += 1;
            }
        }

        successful
    }
}

/// Turns command line arguments into a list of EPUB files
///
/// - an existing file with an `.epub` extension is taken as is
/// - an argument containing `*`, `?` or `[` is expanded as a glob relative
///   to `cwd`, keeping regular files
/// - anything else is skipped with a warning
pub fn resolve_inputs(file_args: &[String], cwd: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for arg in file_args {
        let path = cwd.join(arg);

        if path.is_file() && is_epub_file(&path) {
            files.push(path);
        } else if arg.contains(['*', '?', '[']) {
            let pattern = path.to_string_lossy();
            let matches = match glob::glob(&pattern) {
                Ok(matches) => matches,
                Err(err) => {
                    warn!("Warning: {} is not a valid glob pattern: {}", arg, err);
                    continue;
                }
            };

            let before = files.len();
            for entry in matches {
                match entry {
                    Ok(path) if path.is_file() => files.push(path),
                    Ok(_) => {}
                    Err(err) => warn!("Warning: unable to read {}", err),
                }
            }

            if files.len() == before {
                warn!("Warning: {} did not match any file", arg);
            }
        } else {
            warn!("Warning: {} is not a valid EPUB file", arg);
        }
    }

    files
}
