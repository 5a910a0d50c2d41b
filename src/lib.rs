//! # saslineage
//!
//! A library for extracting dataset-level lineage from SAS programs.
//!
//! # Features
//!
//! - Tokenize SAS source with qualified names, quoted paths and comments handled.
//! - Parse `DATA`, `SET`/`MERGE`/`UPDATE`/`MODIFY`, `INFILE` and `PROC` steps,
//!   recovering from malformed statements instead of failing.
//! - Resolve which dataset each read feeds, flagging reads that happen before any target.
//! - Merge the lineage of many files into one graph with cycle reporting and
//!   depth-bounded ancestor/descendant queries.
//!
//! # Example
//!
//! ```rust
//! use saslineage::{
//!     graph::Node,
//!     lineage::{SourceFile, extract_lineage},
//! };
//!
//! let files = [SourceFile::new(
//!     "sales.sas",
//!     r#"
//!         data sales;
//!             set orders customers;
//!         run;
//!
//!         data report;
//!             set sales;
//!             infile "exports/fx rates.csv";
//!         run;
//!     "#,
//! )];
//!
//! let extraction = extract_lineage(&files, true);
//! assert_eq!(extraction.edges.len(), 4);
//! assert!(extraction.warnings.is_empty());
//!
//! let report = Node::Dataset("report".to_owned());
//! let upstream = extraction.graph.ancestors_of(&report, 8);
//! assert_eq!(upstream.len(), 4);
//! ```
pub mod ast;
pub mod config;
pub mod graph;
pub mod lineage;
pub mod parser;
pub mod scanner;
pub mod test_utils;
pub mod warning;
