use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::anyhow;
use clap::Parser as ClapParser;
use clap::{Subcommand, ValueEnum};
use saslineage::config::Config;
use saslineage::graph::{Cycle, LineageGraph, Node};
use saslineage::lineage::{Extraction, LineageEdge, SourceFile, extract_lineage, normalize_identifier};
use saslineage::warning::Warning;
use serde::Serialize;
use walkdir::WalkDir;

#[derive(clap::Parser)]
#[command(name = "saslineage")]
#[command(about = "SAS dataset lineage extractor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract lineage from one or more SAS files.
    Extract(ExtractCommand),
    /// Walk the lineage graph upstream or downstream from a dataset or file.
    Query(QueryCommand),
}

#[derive(clap::Args)]
struct InputArgs {
    /// Path to the SAS file or directory containing SAS files.
    #[arg(value_name = "SAS_[FILE|DIR]")]
    sas: PathBuf,
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Process files one at a time instead of in parallel.
    #[arg(long)]
    sequential: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Dot,
}

#[derive(Clone, Copy, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
enum Direction {
    Upstream,
    Downstream,
}

#[derive(clap::Args)]
struct ExtractCommand {
    #[command(flatten)]
    input: InputArgs,
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    /// Pretty-print JSON output.
    #[arg(long)]
    pretty: bool,
}

#[derive(clap::Args)]
struct QueryCommand {
    #[command(flatten)]
    input: InputArgs,
    /// Dataset name, or file path when `--file` is set.
    #[arg(long)]
    node: String,
    /// Treat `--node` as an external file path.
    #[arg(long)]
    file: bool,
    #[arg(long, value_enum, default_value_t = Direction::Upstream)]
    direction: Direction,
    /// Maximum number of hops (defaults to the config value).
    #[arg(long)]
    max_depth: Option<usize>,
    /// Pretty-print the output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
struct ExtractOutput<'a> {
    edges: &'a [LineageEdge],
    warnings: &'a [Warning],
    cycles: Vec<Cycle>,
}

#[derive(Serialize)]
struct QueryOutput<'a> {
    node: &'a Node,
    direction: Direction,
    max_depth: usize,
    nodes: Vec<Node>,
    edges: Vec<&'a LineageEdge>,
}

fn read_source_file(path: &Path) -> anyhow::Result<SourceFile> {
    let bytes = std::fs::read(path)
        .map_err(|_| anyhow!("Failed to read sas file {}", path.display()))?;
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(err) => {
            log::warn!(
                "File {} is not valid UTF-8, invalid bytes were replaced.",
                path.display()
            );
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    };
    Ok(SourceFile::new(path.display().to_string(), content))
}

fn read_source_files(input: &InputArgs, config: &Config) -> anyhow::Result<Vec<SourceFile>> {
    if !input.sas.is_dir() {
        return Ok(vec![read_source_file(&input.sas)?]);
    }

    let mut files = vec![];
    for entry in WalkDir::new(&input.sas).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Skipping unreadable directory entry: {}", err);
                continue;
            }
        };
        if entry.file_type().is_file() && config.matches_extension(entry.path()) {
            files.push(read_source_file(entry.path())?);
        }
    }
    log::info!("Found {} files in {}", files.len(), input.sas.display());
    Ok(files)
}

fn run_extraction(input: &InputArgs) -> anyhow::Result<(Config, Extraction)> {
    let config = match &input.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let files = read_source_files(input, &config)?;
    let extraction = extract_lineage(&files, config.parallel && !input.sequential);
    for warning in &extraction.warnings {
        log::warn!("{}", warning);
    }
    Ok((config, extraction))
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<String> {
    let out_str = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(out_str)
}

fn render_csv(edges: &[LineageEdge]) -> anyhow::Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    writer.write_record(["target", "source", "source_file", "origin_file"])?;
    for edge in edges {
        writer.serialize(edge)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("Failed to write csv output due to error: {}", err))?;
    Ok(String::from_utf8(bytes)?)
}

fn dot_id(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

fn render_dot(graph: &LineageGraph) -> String {
    let mut out = String::from("digraph lineage {\n    rankdir=LR;\n");
    for node in graph.nodes() {
        let shape = match node {
            Node::Dataset(_) => "box",
            Node::File(_) => "note",
        };
        out.push_str(&format!("    {} [shape={}];\n", dot_id(node.name()), shape));
    }
    let mut has_orphans = false;
    for edge in graph.edges() {
        let source = Node::from(&edge.source);
        match &edge.target {
            Some(target) => out.push_str(&format!(
                "    {} -> {};\n",
                dot_id(source.name()),
                dot_id(target)
            )),
            None => {
                has_orphans = true;
                out.push_str(&format!(
                    "    {} -> \"?\" [style=dashed];\n",
                    dot_id(source.name())
                ));
            }
        }
    }
    if has_orphans {
        out.push_str("    \"?\" [shape=plaintext];\n");
    }
    out.push_str("}\n");
    out
}

fn main() -> anyhow::Result<()> {
    let now = Instant::now();

    env_logger::init();
    let cli = Cli::parse();

    let out_str = match &cli.command {
        Commands::Extract(extract_command) => {
            let (_, extraction) = run_extraction(&extract_command.input)?;
            match extract_command.format {
                OutputFormat::Json => to_json(
                    &ExtractOutput {
                        edges: &extraction.edges,
                        warnings: &extraction.warnings,
                        cycles: extraction.graph.cycles(),
                    },
                    extract_command.pretty,
                )?,
                OutputFormat::Csv => render_csv(&extraction.edges)?,
                OutputFormat::Dot => render_dot(&extraction.graph),
            }
        }
        Commands::Query(query_command) => {
            let (config, extraction) = run_extraction(&query_command.input)?;
            let node = if query_command.file {
                Node::File(query_command.node.clone())
            } else {
                Node::Dataset(normalize_identifier(&query_command.node))
            };
            if !extraction.graph.contains(&node) {
                return Err(anyhow!("Node `{}` not found in lineage graph", node));
            }
            let max_depth = query_command.max_depth.unwrap_or(config.max_depth);
            let nodes = match query_command.direction {
                Direction::Upstream => extraction.graph.ancestors_of(&node, max_depth),
                Direction::Downstream => extraction.graph.descendants_of(&node, max_depth),
            };
            to_json(
                &QueryOutput {
                    node: &node,
                    direction: query_command.direction,
                    max_depth,
                    nodes,
                    edges: extraction.graph.edges_for(&node),
                },
                query_command.pretty,
            )?
        }
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", out_str.trim_end())?;

    let elapsed = now.elapsed();
    log::info!("Elapsed: {:.2?}", elapsed);

    Ok(())
}
