//! Archive Transformer
//!
//! Scrubs a single EPUB file. The archive is extracted into a scratch
//! directory, every HTML/XHTML chapter is passed through the markup
//! rewriter, and the whole scratch tree is packed into a new archive.
//!
//! ## Notes
//!
//! - The scratch directory is a [TempDir] and is removed when the job ends,
//!   whichever way it ends.
//! - The output archive is first written to a temporary file next to its
//!   final location and only renamed into place when complete, so a failed
//!   job never leaves a partial output behind.
//! - Files that are not chapters are copied into the new archive unchanged,
//!   and chapters without matches are not rewritten at all.

use std::{
    fs::{self, File},
    io::{self, BufReader, Read, Seek, Write},
    path::{Path, PathBuf},
};

use log::{debug, error, info};
use tempfile::{NamedTempFile, TempDir};
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::FileOptions};

use crate::{
    error::ScrubError,
    markup::rewrite_with,
    pattern::PatternSet,
    types::{ArchiveJob, JobOutcome, ProcessingReport},
    utils::{DecodeBytes, archive_entry_name, is_markup_file},
};

/// Name of the entry EPUB readers expect first and uncompressed
const MIMETYPE_ENTRY: &str = "mimetype";

/// Runs a job and records its outcome in the report
///
/// Errors are logged with the file name and counted as failures, they never
/// reach the caller.
///
/// # Return
/// - `true`: at least one occurrence was removed (or would be, in dry-run mode)
/// - `false`: nothing matched, or the job failed
pub fn transform(job: &ArchiveJob, report: &mut ProcessingReport) -> bool {
    let name = display_name(&job.input);
    info!("Processing: {}", name);

    match try_transform(job) {
        Ok(outcome) => {
            report.record(&outcome);
            !matches!(outcome, JobOutcome::NoMatches)
        }
        Err(err) => {
            error!("Error processing {}: {}", name, err);
            report.record_failure();
            false
        }
    }
}

/// Runs a job, returning what it did
///
/// # Return
/// - `Ok(JobOutcome)`: The job finished, possibly without any match
/// - `Err(ScrubError)`: The input is not a ZIP file, a pattern is invalid,
///   or reading or writing failed
pub fn try_transform(job: &ArchiveJob) -> Result<JobOutcome, ScrubError> {
    let mut archive = open_archive(&job.input)?;
    let patterns = PatternSet::compile(&job.patterns, job.case_sensitive)?;

    let scratch = tempfile::Builder::new().prefix("epub-scrub-").tempdir()?;
    extract_entries(&mut archive, scratch.path())?;

    let (changes, modified) = rewrite_chapters(scratch.path(), &patterns, job.dry_run)?;

    if changes == 0 {
        info!("No matching text found to remove.");
        return Ok(JobOutcome::NoMatches);
    }

    info!("Total changes: {} in {} files", changes, modified.len());

    if job.dry_run {
        info!("DRY RUN: No files were actually modified.");
        info!(
            "Would modify: {}{}",
            modified.iter().take(5).cloned().collect::<Vec<_>>().join(", "),
            if modified.len() > 5 { "..." } else { "" }
        );
        return Ok(JobOutcome::DryRun { changes, modified });
    }

    let backup = if job.backup {
        let backup_path = job.backup_path();
        fs::copy(&job.input, &backup_path)?;
        info!("Backup saved: {}", display_name(&backup_path));
        Some(backup_path)
    } else {
        None
    };

    let output = job.output_path();
    pack_directory(&scratch, &output)?;
    info!("Output saved: {}", display_name(&output));

    Ok(JobOutcome::Written {
        changes,
        modified,
        output,
        backup,
    })
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>, ScrubError> {
    let file = File::open(path)?;

    ZipArchive::new(BufReader::new(file)).map_err(|source| ScrubError::InvalidArchive {
        path: path.to_string_lossy().to_string(),
        source,
    })
}

/// Extracts every entry of the archive below `root`
///
/// Stored unix modes are not applied: files and directories are created with
/// the default permissions, so read-only entries can still be rewritten.
/// Entry names that would escape `root` fail the job.
fn extract_entries<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    root: &Path,
) -> Result<(), ScrubError> {
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative_path) = entry.enclosed_name() else {
            return Err(ScrubError::IOError {
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unsafe entry name \"{}\"", entry.name()),
                ),
            });
        };

        let target = root.join(relative_path);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!("Extracting {}", entry.name());
        let mut file = File::create(&target)?;
        io::copy(&mut entry, &mut file)?;
    }

    Ok(())
}

/// Rewrites every chapter below `root`
///
/// Chapters are visited in sorted order. A changed chapter is written back in
/// place unless `dry_run` is set.
///
/// # Return
/// - `Ok((changes, modified))`: total removed occurrences and the names of
///   the chapters that had any
fn rewrite_chapters(
    root: &Path,
    patterns: &PatternSet,
    dry_run: bool,
) -> Result<(usize, Vec<String>), ScrubError> {
    let mut total_changes = 0;
    let mut modified = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_markup_file(path) {
            continue;
        }

        let content = fs::read(path)?.decode_lossy();
        let result = rewrite_with(&content, patterns)?;
        if result.count == 0 {
            continue;
        }

        let name = display_name(path);
        info!("  Modified: {} ({} changes)", name, result.count);

        if !dry_run {
            fs::write(path, result.text)?;
        }

        total_changes += result.count;
        modified.push(name);
    }

    Ok((total_changes, modified))
}

/// Packs a directory tree into a new EPUB file
///
/// Every regular file becomes an entry named by its path relative to the
/// scratch root. A top-level `mimetype` file is stored first and
/// uncompressed; everything else is deflated.
fn pack_directory(scratch: &TempDir, output_path: &Path) -> Result<(), ScrubError> {
    let root = scratch.path();

    let parent = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !parent.exists() {
        fs::create_dir_all(&parent)?;
    }

    let staging = NamedTempFile::new_in(&parent)?;
    let mut zip = ZipWriter::new(staging);
    let deflated = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
    let stored = FileOptions::<()>::default().compression_method(CompressionMethod::Stored);

    let mimetype = root.join(MIMETYPE_ENTRY);
    if mimetype.is_file() {
        zip.start_file(MIMETYPE_ENTRY, stored)?;
        zip.write_all(&fs::read(&mimetype)?)?;
    }

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path == mimetype {
            continue;
        }

        let target_path = archive_entry_name(root, path)?;
        zip.start_file(target_path, deflated)?;
        zip.write_all(&fs::read(path)?)?;
    }

    let staging = zip.finish()?;
    staging.persist(output_path)?;

    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
