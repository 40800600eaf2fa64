use std::path::PathBuf;

/// A text pattern to remove from chapter text
///
/// Whether a pattern is matched case-sensitively is decided for the whole
/// run, not per pattern, so it is carried by [ArchiveJob] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// The literal text or regular expression source
    pub text: String,

    /// Treat `text` as a regular expression instead of a literal
    pub is_regex: bool,
}

impl Pattern {
    pub fn literal(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_regex: false,
        }
    }

    pub fn regex(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_regex: true,
        }
    }
}

/// The result of removing patterns from a piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// The text with every match removed
    pub text: String,

    /// Number of removed occurrences
    pub count: usize,
}

impl MatchResult {
    pub fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            count: 0,
        }
    }
}

/// Everything needed to scrub a single EPUB file
///
/// Built once per input file from the command line configuration and never
/// modified while the job runs.
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    /// The EPUB file to read
    pub input: PathBuf,

    /// Explicit output path
    ///
    /// When `None`, the output name is derived from the input name
    /// and `output_suffix`.
    pub output: Option<PathBuf>,

    /// Patterns to remove, applied in order
    pub patterns: Vec<Pattern>,

    pub case_sensitive: bool,

    /// Copy the original file to `<name>.bak` before writing the output
    pub backup: bool,

    /// Count matches without writing any file
    pub dry_run: bool,

    /// Suffix appended to the input file stem to derive the output name
    pub output_suffix: String,
}

impl ArchiveJob {
    /// The path the cleaned archive will be written to
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }

        let stem = self
            .input
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_name = match self.input.extension() {
            Some(ext) => format!("{}{}.{}", stem, self.output_suffix, ext.to_string_lossy()),
            None => format!("{}{}", stem, self.output_suffix),
        };

        self.input.with_file_name(file_name)
    }

    /// The path the original file is copied to when backups are enabled
    pub fn backup_path(&self) -> PathBuf {
        let mut file_name = self
            .input
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push(".bak");

        self.input.with_file_name(file_name)
    }
}

/// What a finished job did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// No pattern matched anywhere in the archive, nothing was written
    NoMatches,

    /// Matches were found but dry-run mode kept everything untouched
    DryRun {
        changes: usize,
        modified: Vec<String>,
    },

    /// The cleaned archive was written
    Written {
        changes: usize,
        modified: Vec<String>,
        output: PathBuf,
        backup: Option<PathBuf>,
    },
}

/// Aggregated results of a batch run
///
/// Owned by the batch driver and updated once per finished job.
#[derive(Debug, Default, Clone)]
pub struct ProcessingReport {
    /// Total removed occurrences over all jobs, including dry-run jobs
    pub total_changes: usize,

    /// Names of the chapter files that had matches
    pub modified_files: Vec<String>,

    /// Paths of the written output archives
    pub output_files: Vec<PathBuf>,

    /// Jobs that changed (or in dry-run would change) an archive
    pub successful: usize,

    /// Jobs that aborted with an error
    pub failed: usize,
}

impl ProcessingReport {
    pub fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::NoMatches => {}
            JobOutcome::DryRun { changes, modified } => {
                self.total_changes += changes;
                self.modified_files.extend(modified.iter().cloned());
                self.successful += 1;
            }
            JobOutcome::Written {
                changes,
                modified,
                output,
                ..
            } => {
                self.total_changes += changes;
                self.modified_files.extend(modified.iter().cloned());
                self.output_files.push(output.clone());
                self.successful += 1;
            }
        }
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Renders the summary block printed at the end of a run
    pub fn summary(&self, dry_run: bool) -> String {
        let mut lines = vec!["=".repeat(50)];

        if dry_run {
            lines.push("DRY RUN SUMMARY".to_string());
            lines.push(format!("Would process: {} file(s)", self.successful));
            lines.push(format!("Total changes: {}", self.total_changes));
        } else {
            lines.push("PROCESSING SUMMARY".to_string());
            lines.push(format!(
                "Successfully processed: {} file(s)",
                self.successful
            ));
            lines.push(format!("Total changes made: {}", self.total_changes));

            if !self.output_files.is_empty() {
                lines.push(String::new());
                lines.push("Output files:".to_string());
                for file in self.output_files.iter().take(10) {
                    let name = file
                        .file_name()
                        .map(|name| name.to_string_lossy().to_string())
                        .unwrap_or_else(|| file.to_string_lossy().to_string());
                    lines.push(format!("  - {}", name));
                }
            }
        }

        if self.failed > 0 {
            lines.push(format!("Failed: {} file(s)", self.failed));
        }

        lines.join("\n")
    }
}
