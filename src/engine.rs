use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use tracing::{debug, info};

use crate::callgraph::context::{CalleeUsageIndex, ResolutionContext};
use crate::callgraph::hierarchy::{propagate_interface_methods, register_class, resolve_hierarchy};
use crate::callgraph::index::build_relationship_index;
use crate::callgraph::interfaces::{DispatchPolicy, resolve_interface_calls};
use crate::callgraph::visitor::visit_class;
use crate::ir::Class;
use crate::output::EdgeSink;
use crate::scan::{canonical_archive_path, scan_archive};
use crate::telemetry::{Telemetry, with_span};

/// Settings of one call graph run.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EngineConfig {
    /// Keep callee usage from earlier archives when resolving later ones.
    pub(crate) carry_usage_index: bool,
    pub(crate) interface_dispatch: DispatchPolicy,
    pub(crate) class_references: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            carry_usage_index: true,
            interface_dispatch: DispatchPolicy::default(),
            class_references: false,
        }
    }
}

/// Counts reported for one processed archive.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct ArchiveSummary {
    pub(crate) index: usize,
    pub(crate) classes: usize,
    pub(crate) extracted_edges: usize,
    pub(crate) hierarchy_edges: usize,
    pub(crate) interface_edges: usize,
}

impl ArchiveSummary {
    pub(crate) fn total_edges(&self) -> usize {
        self.extracted_edges + self.hierarchy_edges + self.interface_edges
    }
}

/// Sequences archives through the call graph passes.
///
/// Each archive gets a fresh resolution context; only the usage index may
/// survive from one archive to the next.
pub(crate) struct CallGraphEngine {
    config: EngineConfig,
    usage: CalleeUsageIndex,
    seen_archives: BTreeSet<PathBuf>,
    archive_count: usize,
    telemetry: Option<Arc<Telemetry>>,
}

impl CallGraphEngine {
    pub(crate) fn new(config: EngineConfig, telemetry: Option<Arc<Telemetry>>) -> Self {
        Self {
            config,
            usage: CalleeUsageIndex::default(),
            seen_archives: BTreeSet::new(),
            archive_count: 0,
            telemetry,
        }
    }

    /// Decodes and processes one archive. Returns `None` for a duplicate path.
    pub(crate) fn process_archive(
        &mut self,
        path: &Path,
        sink: &mut dyn EdgeSink,
    ) -> Result<Option<ArchiveSummary>> {
        let canonical = canonical_archive_path(path)?;
        if !self.seen_archives.insert(canonical.clone()) {
            info!("skipping already processed archive {}", canonical.display());
            return Ok(None);
        }
        self.archive_count += 1;
        let archive_index = self.archive_count;
        info!("processing archive {} {}", archive_index, canonical.display());

        let telemetry = self.telemetry.clone();
        let attributes = [
            KeyValue::new("jcallgraph.archive_index", archive_index as i64),
            KeyValue::new("jcallgraph.archive_path", canonical.display().to_string()),
        ];
        let summary = with_span(telemetry.as_deref(), "archive", &attributes, || {
            sink.archive(archive_index, &canonical)?;
            let classes = with_span(telemetry.as_deref(), "scan", &attributes, || {
                scan_archive(&canonical)
            })?;
            self.process_classes(archive_index, &classes, sink)
        })
        .with_context(|| format!("failed to process {}", canonical.display()))?;
        Ok(Some(summary))
    }

    /// Runs every pass over the decoded classes of one archive.
    pub(crate) fn process_classes(
        &mut self,
        archive_index: usize,
        classes: &[Class],
        sink: &mut dyn EdgeSink,
    ) -> Result<ArchiveSummary> {
        let telemetry = self.telemetry.clone();
        let telemetry = telemetry.as_deref();
        let usage = if self.config.carry_usage_index {
            std::mem::take(&mut self.usage)
        } else {
            CalleeUsageIndex::default()
        };
        let mut context = ResolutionContext::with_usage(usage);
        let mut summary = ArchiveSummary {
            index: archive_index,
            classes: classes.len(),
            ..ArchiveSummary::default()
        };

        with_span(
            telemetry,
            "pre_pass",
            &[KeyValue::new("jcallgraph.classes", classes.len() as i64)],
            || build_relationship_index(&mut context, classes),
        );

        summary.extracted_edges = with_span(telemetry, "visit", &[], || -> Result<usize> {
            let mut count = 0;
            for class in classes {
                debug!("visiting class {}", class.name);
                register_class(&mut context, class);
                if self.config.class_references {
                    for referenced in &class.referenced_classes {
                        sink.class_reference(&class.name, referenced)?;
                    }
                }
                for edge in visit_class(&mut context, class, archive_index) {
                    sink.edge(&edge)?;
                    count += 1;
                }
            }
            Ok(count)
        })?;

        summary.hierarchy_edges = with_span(telemetry, "hierarchy", &[], || -> Result<usize> {
            propagate_interface_methods(&mut context);
            let edges = resolve_hierarchy(&mut context)?;
            for edge in &edges {
                sink.edge(edge)?;
            }
            Ok(edges.len())
        })?;

        summary.interface_edges = with_span(telemetry, "interfaces", &[], || -> Result<usize> {
            let edges = resolve_interface_calls(&context, self.config.interface_dispatch);
            for edge in &edges {
                sink.edge(edge)?;
            }
            Ok(edges.len())
        })?;

        for (method, annotations) in &context.annotations {
            for annotation in annotations {
                sink.annotation(method, annotation)?;
            }
        }

        info!(
            "archive {}: classes={} extracted={} hierarchy={} interfaces={} usage_classes={}",
            archive_index,
            summary.classes,
            summary.extracted_edges,
            summary.hierarchy_edges,
            summary.interface_edges,
            context.usage.class_count()
        );
        if self.config.carry_usage_index {
            self.usage = context.into_usage();
        }
        Ok(summary)
    }
}
