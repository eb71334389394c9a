mod callgraph;
mod descriptor;
mod engine;
mod ir;
mod opcodes;
mod output;
mod scan;
mod telemetry;
#[cfg(test)]
mod test_harness;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use crate::callgraph::interfaces::DispatchPolicy;
use crate::engine::{CallGraphEngine, EngineConfig};
use crate::output::{EdgeSink, OutputFormat, WriterSink};
use crate::telemetry::{Telemetry, init_logging};

const ANNOTATION_OUTPUT_SUFFIX: &str = "-annotation.txt";

/// CLI arguments for jcallgraph execution.
#[derive(Parser, Debug)]
#[command(
    name = "jcallgraph",
    about = "Static call graph extraction for JVM class files and JAR archives.",
    version
)]
struct Cli {
    /// JAR files, class directories or single class files, in processing order.
    #[arg(value_name = "ARCHIVE", required = true)]
    archives: Vec<PathBuf>,
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    annotation_output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Resolve each archive against its own callee usage only.
    #[arg(long)]
    isolate_usage: bool,
    #[arg(long, value_enum, default_value_t = DispatchPolicy::BothCalled)]
    interface_dispatch: DispatchPolicy,
    #[arg(long)]
    class_references: bool,
    /// OTLP HTTP endpoint receiving traces.
    #[arg(long, value_name = "URL")]
    otel: Option<String>,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    timing: bool,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            carry_usage_index: !self.isolate_usage,
            interface_dispatch: self.interface_dispatch,
            class_references: self.class_references,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);
    let telemetry = match cli.otel.clone() {
        Some(endpoint) => Some(Arc::new(Telemetry::new(endpoint)?)),
        None => None,
    };
    let result = run(cli, telemetry.clone());
    if let Some(telemetry) = telemetry
        && let Err(err) = telemetry.shutdown()
    {
        warn!("{err:#}");
    }
    result
}

fn run(cli: Cli, telemetry: Option<Arc<Telemetry>>) -> Result<()> {
    let started_at = Instant::now();
    let edges = output_writer(cli.output.as_deref())?;
    let annotations = match annotation_output_path(&cli) {
        Some(path) => Some(file_writer(&path)?),
        None => None,
    };
    let mut sink = WriterSink::new(cli.format, edges, annotations);
    let mut engine = CallGraphEngine::new(cli.engine_config(), telemetry);

    let mut archive_count = 0;
    let mut class_count = 0;
    let mut edge_count = 0;
    for archive in &cli.archives {
        let processed = engine.process_archive(archive, &mut sink);
        // Records of earlier archives stay in the output even when a later one fails.
        sink.flush()?;
        if let Some(summary) = processed? {
            archive_count += 1;
            class_count += summary.classes;
            edge_count += summary.total_edges();
        }
    }

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} archives={} classes={} edges={}",
            started_at.elapsed().as_millis(),
            archive_count,
            class_count,
            edge_count
        );
    }

    Ok(())
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(BufWriter::new(io::stdout()))),
        Some(path) => file_writer(path),
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn file_writer(path: &Path) -> Result<Box<dyn Write>> {
    let file = File::create(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Explicit annotation path, else one derived from a file `--output`.
fn annotation_output_path(cli: &Cli) -> Option<PathBuf> {
    if let Some(path) = &cli.annotation_output {
        return Some(path.clone());
    }
    let output = cli.output.as_deref()?;
    if output == Path::new("-") {
        return None;
    }
    let mut derived = output.as_os_str().to_os_string();
    derived.push(ANNOTATION_OUTPUT_SUFFIX);
    Some(PathBuf::from(derived))
}
