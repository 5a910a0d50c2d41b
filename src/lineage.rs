use indexmap::IndexSet;
use rayon::prelude::*;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::ast::{ParseToken, Statement};
use crate::graph::LineageGraph;
use crate::parser::parse_sas;
use crate::warning::{Diagnostic, Warning, WarningKind};

/// What a lineage edge reads from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeSource {
    Dataset(String),
    File(String),
}

/// `target` is derived from `source`. A missing target marks an orphan reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineageEdge {
    pub target: Option<String>,
    pub source: EdgeSource,
    pub origin_file: String,
}

impl LineageEdge {
    pub fn from_dataset(target: Option<&str>, source: &str, origin_file: &str) -> Self {
        Self {
            target: target.map(normalize_identifier),
            source: EdgeSource::Dataset(normalize_identifier(source)),
            origin_file: origin_file.to_owned(),
        }
    }

    pub fn from_file(target: Option<&str>, path: &str, origin_file: &str) -> Self {
        Self {
            target: target.map(normalize_identifier),
            source: EdgeSource::File(path.to_owned()),
            origin_file: origin_file.to_owned(),
        }
    }

    pub fn source_dataset(&self) -> Option<&str> {
        match &self.source {
            EdgeSource::Dataset(name) => Some(name),
            EdgeSource::File(_) => None,
        }
    }

    pub fn source_file(&self) -> Option<&str> {
        match &self.source {
            EdgeSource::File(path) => Some(path),
            EdgeSource::Dataset(_) => None,
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.target.is_none()
    }
}

impl Serialize for LineageEdge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_struct("LineageEdge", 4)?;
        record.serialize_field("target", &self.target)?;
        record.serialize_field("source", &self.source_dataset())?;
        record.serialize_field("source_file", &self.source_file())?;
        record.serialize_field("origin_file", &self.origin_file)?;
        record.end()
    }
}

/// Dataset names are case-insensitive; file paths are not normalized.
pub fn normalize_identifier(name: &str) -> String {
    name.to_lowercase()
}

/// Walks the statements of one file, tracking the dataset currently being defined.
#[derive(Debug)]
pub struct Resolver<'a> {
    file_id: &'a str,
    current_target: Option<String>,
    edges: Vec<LineageEdge>,
    warnings: Vec<Warning>,
}

impl<'a> Resolver<'a> {
    pub fn new(file_id: &'a str) -> Self {
        Self {
            file_id,
            current_target: None,
            edges: vec![],
            warnings: vec![],
        }
    }

    pub fn current_target(&self) -> Option<&str> {
        self.current_target.as_deref()
    }

    fn check_orphan(&mut self, keyword: &ParseToken, read: &str) {
        if self.current_target.is_none() {
            let diagnostic = Diagnostic::new(
                WarningKind::OrphanReference,
                keyword.line,
                keyword.col,
                format!(
                    "`{}` reads {} before any `DATA` statement defined a target.",
                    keyword.lexeme.to_uppercase(),
                    read
                ),
            );
            self.warnings.push(diagnostic.into_warning(self.file_id));
        }
    }

    pub fn resolve_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::DatasetDef(def) => {
                self.current_target = Some(normalize_identifier(&def.name.lexeme));
            }
            Statement::ReadSource(read) => {
                let read_names = read
                    .names
                    .iter()
                    .map(|name| format!("`{}`", name.lexeme))
                    .collect::<Vec<String>>()
                    .join(", ");
                self.check_orphan(&read.keyword, &read_names);
                for name in &read.names {
                    self.edges.push(LineageEdge::from_dataset(
                        self.current_target.as_deref(),
                        &name.lexeme,
                        self.file_id,
                    ));
                }
            }
            Statement::ReadFile(read) => {
                self.check_orphan(&read.keyword, &format!("file \"{}\"", read.path.lexeme));
                self.edges.push(LineageEdge::from_file(
                    self.current_target.as_deref(),
                    &read.path.lexeme,
                    self.file_id,
                ));
            }
            Statement::ProcStep(step) => {
                for output in &step.outputs {
                    for input in &step.inputs {
                        self.edges.push(LineageEdge::from_dataset(
                            Some(&output.lexeme),
                            &input.lexeme,
                            self.file_id,
                        ));
                    }
                }
            }
            Statement::Other => {}
        }
    }

    pub fn finish(self) -> (Vec<LineageEdge>, Vec<Warning>) {
        (self.edges, self.warnings)
    }
}

pub fn resolve(statements: &[Statement], file_id: &str) -> (Vec<LineageEdge>, Vec<Warning>) {
    let mut resolver = Resolver::new(file_id);
    statements
        .iter()
        .for_each(|statement| resolver.resolve_statement(statement));
    resolver.finish()
}

/// A file whose content has already been read and decoded.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileLineage {
    pub file: String,
    pub edges: Vec<LineageEdge>,
    pub warnings: Vec<Warning>,
}

pub fn extract_file_lineage(file: &SourceFile) -> FileLineage {
    let (statements, diagnostics) = parse_sas(&file.content);
    let mut warnings: Vec<Warning> = diagnostics
        .into_iter()
        .map(|diagnostic| diagnostic.into_warning(&file.name))
        .collect();
    let (edges, resolve_warnings) = resolve(&statements, &file.name);
    warnings.extend(resolve_warnings);
    warnings.sort_by_key(|warning| (warning.line, warning.col));

    log::debug!(
        "Extracted {} edges and {} warnings from {}",
        edges.len(),
        warnings.len(),
        file.name
    );
    FileLineage {
        file: file.name.clone(),
        edges,
        warnings,
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub edges: Vec<LineageEdge>,
    pub warnings: Vec<Warning>,
    pub graph: LineageGraph,
}

/// Extracts lineage from every file and merges it into a single graph.
///
/// Files are processed independently (in parallel when `parallel` is set);
/// their results are merged in input order so the output does not depend on
/// scheduling. Identical edges and warnings are reported once.
pub fn extract_lineage(files: &[SourceFile], parallel: bool) -> Extraction {
    let file_lineages: Vec<FileLineage> = if parallel {
        files.par_iter().map(extract_file_lineage).collect()
    } else {
        files.iter().map(extract_file_lineage).collect()
    };

    let mut graph = LineageGraph::default();
    let mut warnings = IndexSet::new();
    for file_lineage in file_lineages {
        graph.merge(file_lineage.edges);
        warnings.extend(file_lineage.warnings);
    }

    Extraction {
        edges: graph.edges().cloned().collect(),
        warnings: warnings.into_iter().collect(),
        graph,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_text(text: &str) -> (Vec<LineageEdge>, Vec<Warning>) {
        let (statements, _) = parse_sas(text);
        resolve(&statements, "test.sas")
    }

    #[test]
    fn edges_follow_current_target() {
        let (edges, warnings) = resolve_text("data sales; set orders customers; data b; set sales;");
        assert!(warnings.is_empty());
        assert_eq!(
            edges,
            vec![
                LineageEdge::from_dataset(Some("sales"), "orders", "test.sas"),
                LineageEdge::from_dataset(Some("sales"), "customers", "test.sas"),
                LineageEdge::from_dataset(Some("b"), "sales", "test.sas"),
            ]
        );
    }

    #[test]
    fn identifiers_are_normalized() {
        let (edges, _) = resolve_text("DATA Work.Sales; SET Lib.Orders; INFILE 'Raw/File.CSV';");
        assert_eq!(edges[0].target.as_deref(), Some("work.sales"));
        assert_eq!(edges[0].source_dataset(), Some("lib.orders"));
        assert_eq!(edges[1].source_file(), Some("Raw/File.CSV"));
        assert_eq!(edges[1].source_dataset(), None);
    }

    #[test]
    fn orphan_reads_keep_edges() {
        let (edges, warnings) = resolve_text("merge a b;\ninfile \"raw.csv\";");
        assert_eq!(edges.len(), 3);
        assert!(edges.iter().all(LineageEdge::is_orphan));
        assert_eq!(warnings.len(), 2);
        assert!(warnings
            .iter()
            .all(|w| w.kind == WarningKind::OrphanReference && w.file == "test.sas"));
        assert_eq!(warnings[1].line, 2);
    }

    #[test]
    fn proc_steps_link_outputs_to_inputs() {
        let (edges, warnings) = resolve_text("proc sort data=raw out=sorted; run;");
        assert!(warnings.is_empty());
        assert_eq!(
            edges,
            vec![LineageEdge::from_dataset(Some("sorted"), "raw", "test.sas")]
        );
    }

    #[test]
    fn resolver_starts_without_target() {
        let (statements, _) = parse_sas("data a; set b; data c;");
        let mut resolver = Resolver::new("f.sas");
        assert_eq!(resolver.current_target(), None);
        resolver.resolve_statement(&statements[0]);
        assert_eq!(resolver.current_target(), Some("a"));
        statements[1..]
            .iter()
            .for_each(|statement| resolver.resolve_statement(statement));
        assert_eq!(resolver.current_target(), Some("c"));
        let (edges, warnings) = resolver.finish();
        assert_eq!(edges.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn target_does_not_leak_between_files() {
        let files = [
            SourceFile::new("a.sas", "data a; set x;"),
            SourceFile::new("b.sas", "set y;"),
        ];
        let extraction = extract_lineage(&files, true);
        assert_eq!(extraction.edges.len(), 2);
        assert_eq!(extraction.edges[1].target, None);
        assert_eq!(extraction.warnings.len(), 1);
        assert_eq!(extraction.warnings[0].file, "b.sas");
    }

    #[test]
    fn edge_serializes_as_flat_record() {
        let edge = LineageEdge::from_file(Some("a"), "raw.csv", "f.sas");
        let json = serde_json::to_string(&edge).unwrap();
        assert_eq!(
            json,
            r#"{"target":"a","source":null,"source_file":"raw.csv","origin_file":"f.sas"}"#
        );
    }
}
