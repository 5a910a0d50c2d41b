use std::fmt::Display;

use serde::Deserialize;

use crate::lineage::{LineageEdge, SourceFile};
use crate::warning::{Warning, WarningKind};

pub const LINEAGE_TESTS_FILE: &str = "tests/lineage_tests.toml";

#[derive(Deserialize, Debug, Clone)]
pub struct TestFile {
    pub name: String,
    pub content: String,
}

impl From<&TestFile> for SourceFile {
    fn from(file: &TestFile) -> Self {
        SourceFile::new(file.name.clone(), file.content.clone())
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestEdge {
    pub target: Option<String>,
    pub source: Option<String>,
    pub source_file: Option<String>,
    pub origin_file: String,
}

impl From<&LineageEdge> for TestEdge {
    fn from(edge: &LineageEdge) -> Self {
        TestEdge {
            target: edge.target.clone(),
            source: edge.source_dataset().map(str::to_owned),
            source_file: edge.source_file().map(str::to_owned),
            origin_file: edge.origin_file.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestWarning {
    pub file: String,
    pub line: u32,
    pub kind: WarningKind,
}

impl From<&Warning> for TestWarning {
    fn from(warning: &Warning) -> Self {
        TestWarning {
            file: warning.file.clone(),
            line: warning.line,
            kind: warning.kind,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TestLineage {
    pub name: String,
    pub files: Vec<TestFile>,
    #[serde(default)]
    pub edges: Vec<TestEdge>,
    #[serde(default)]
    pub warnings: Vec<TestWarning>,
    #[serde(default)]
    pub cycles: Vec<Vec<String>>,
}

impl TestLineage {
    pub fn source_files(&self) -> Vec<SourceFile> {
        self.files.iter().map(SourceFile::from).collect()
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TestLineageData {
    pub tests: Vec<TestLineage>,
}

impl Display for TestLineageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
