use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use tracing::warn;

use crate::callgraph::edge::CallEdge;

/// Receives the records of a call graph run in processing order.
pub(crate) trait EdgeSink {
    /// Header preceding everything emitted for one archive.
    fn archive(&mut self, index: usize, path: &Path) -> Result<()>;
    fn class_reference(&mut self, class_name: &str, referenced: &str) -> Result<()>;
    fn edge(&mut self, edge: &CallEdge) -> Result<()>;
    /// One annotation type observed on a method.
    fn annotation(&mut self, method: &str, annotation: &str) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Encoding of emitted records.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// One `J:` / `C:` / `M:` line per record.
    #[default]
    Text,
    /// One JSON object per line with a `record` discriminator.
    Jsonl,
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record<'a> {
    Archive {
        index: usize,
        path: String,
    },
    ClassReference {
        class: &'a str,
        referenced: &'a str,
    },
    Edge(&'a CallEdge),
    Annotation {
        method: &'a str,
        annotation: &'a str,
    },
}

/// Sink writing edges to one stream and annotations to an optional second one.
pub(crate) struct WriterSink {
    format: OutputFormat,
    edges: Box<dyn Write>,
    annotations: Option<Box<dyn Write>>,
    /// Annotations received since the last flush without a stream to go to.
    dropped_annotations: usize,
}

impl WriterSink {
    pub(crate) fn new(
        format: OutputFormat,
        edges: Box<dyn Write>,
        annotations: Option<Box<dyn Write>>,
    ) -> Self {
        Self {
            format,
            edges,
            annotations,
            dropped_annotations: 0,
        }
    }

    fn write_json(writer: &mut dyn Write, record: &Record<'_>) -> Result<()> {
        serde_json::to_writer(&mut *writer, record).context("failed to serialize record")?;
        writer.write_all(b"\n").context("failed to write record")
    }
}

impl EdgeSink for WriterSink {
    fn archive(&mut self, index: usize, path: &Path) -> Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.edges, "J:{} {}", index, path.display())
                .context("failed to write archive header"),
            OutputFormat::Jsonl => Self::write_json(
                &mut *self.edges,
                &Record::Archive {
                    index,
                    path: path.display().to_string(),
                },
            ),
        }
    }

    fn class_reference(&mut self, class_name: &str, referenced: &str) -> Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.edges, "C:{} {}", class_name, referenced)
                .context("failed to write class reference"),
            OutputFormat::Jsonl => Self::write_json(
                &mut *self.edges,
                &Record::ClassReference {
                    class: class_name,
                    referenced,
                },
            ),
        }
    }

    fn edge(&mut self, edge: &CallEdge) -> Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.edges, "{edge}").context("failed to write edge"),
            OutputFormat::Jsonl => Self::write_json(&mut *self.edges, &Record::Edge(edge)),
        }
    }

    fn annotation(&mut self, method: &str, annotation: &str) -> Result<()> {
        let Some(writer) = self.annotations.as_mut() else {
            self.dropped_annotations += 1;
            return Ok(());
        };
        match self.format {
            OutputFormat::Text => writeln!(writer, "{} {}", method, annotation)
                .context("failed to write annotation"),
            OutputFormat::Jsonl => {
                Self::write_json(&mut **writer, &Record::Annotation { method, annotation })
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.edges.flush().context("failed to flush edge output")?;
        if let Some(writer) = self.annotations.as_mut() {
            writer.flush().context("failed to flush annotation output")?;
        }
        if self.dropped_annotations > 0 {
            warn!(
                "discarded {} method annotations: no annotation output configured",
                self.dropped_annotations
            );
            self.dropped_annotations = 0;
        }
        Ok(())
    }
}
