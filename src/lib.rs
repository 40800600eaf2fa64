//! EPUB text scrubbing
//!
//! A library and command line tool that removes literal or regular
//! expression text patterns from the chapters of EPUB files.
//!
//! An EPUB file is a ZIP archive of HTML/XHTML chapters plus metadata,
//! stylesheets, fonts and images. Scrubbing extracts the archive, removes
//! the patterns from the text nodes of every chapter and packs everything
//! into a new archive. Anything that is not chapter text is left untouched.
//!
//! ## Quick Start
//!
//! ```rust, no_run
//! # fn main() {
//! use epub_scrub::{
//!     batch::{BatchDriver, BatchOptions},
//!     types::Pattern,
//! };
//!
//! let mut driver = BatchDriver::new(BatchOptions {
//!     patterns: vec![Pattern::regex(r"Page\s+\d+")],
//!     ..BatchOptions::default()
//! });
//!
//! let successful = driver.run(&["book.epub".to_string()]);
//! println!("{}", driver.report().summary(false));
//! # let _ = successful;
//! # }
//! ```
//!
//! ## Modules
//!
//! - [pattern]: removes patterns from a single string
//! - [markup]: applies the patterns to every text node of a document
//! - [archive]: rewrites one EPUB file
//! - [batch]: resolves file arguments and runs the archive jobs

pub(crate) mod utils;

pub mod archive;
pub mod batch;
pub mod error;
pub mod markup;
pub mod pattern;
pub mod types;
