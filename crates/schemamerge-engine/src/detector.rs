//! Detection pipeline
//!
//! Parses and builds both snapshots, compares the graphs, runs the rule
//! registry and assembles the [`DetectionReport`]. The pipeline never fails
//! from the caller's point of view: errors and panics become an error report
//! that blocks the merge.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use schemamerge_core::{
    AnalysisSection, DetectionError, DetectionReport, DetectorConfig, ErrorKind, PerformanceSection,
};
use schemamerge_graph::{GraphBuilder, SchemaGraph};
use schemamerge_sql::{Normalizer, StatementParser};

use crate::comparator::GraphComparator;
use crate::registry::RuleRegistry;
use crate::rules::ConflictRule;

/// Graph name of the base snapshot
pub const GRAPH_A: &str = "schema_a";

/// Graph name of the target snapshot
pub const GRAPH_B: &str = "schema_b";

/// One parsed and built schema snapshot
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub graph: SchemaGraph,
    pub statements: usize,
    pub skipped: usize,
    pub parse_time: Duration,
    pub build_time: Duration,
}

/// Schema conflict detector
#[derive(Debug)]
pub struct Detector {
    config: DetectorConfig,
    parser: StatementParser,
    builder: GraphBuilder,
    comparator: GraphComparator,
    registry: RuleRegistry,
}

impl Detector {
    /// Detector with rules R1 to R7
    ///
    /// Invalid configuration is rejected here, before any input is read.
    pub fn new(config: DetectorConfig) -> Result<Self, DetectionError> {
        let registry = RuleRegistry::with_default_rules(&config)?;
        Self::assemble(config, registry)
    }

    /// Detector with an explicit rule list
    pub fn with_rules(config: DetectorConfig, rules: Vec<Box<dyn ConflictRule>>) -> Result<Self, DetectionError> {
        let registry = RuleRegistry::new(rules, &config)?;
        Self::assemble(config, registry)
    }

    fn assemble(config: DetectorConfig, registry: RuleRegistry) -> Result<Self, DetectionError> {
        config.validate()?;

        let normalizer = Normalizer::with_tokenizer_options(config.normalizer.clone(), &config.tokenizer);

        Ok(Self {
            parser: StatementParser::with_normalizer(normalizer),
            builder: GraphBuilder::new(),
            comparator: GraphComparator::new(config.matcher.clone()),
            registry,
            config,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Parse `sql` and build its graph
    pub fn snapshot(&self, sql: &str, name: &str) -> Snapshot {
        let started = Instant::now();
        let parsed = self.parser.parse_script(sql);
        let parse_time = started.elapsed();

        let started = Instant::now();
        let graph = self.builder.build_from_objects(&parsed.objects, name);
        let build_time = started.elapsed();

        Snapshot {
            graph,
            statements: parsed.statements,
            skipped: parsed.skipped.len(),
            parse_time,
            build_time,
        }
    }

    /// Detect conflicts between base schema `sql_a` and target schema `sql_b`
    pub fn detect(&self, sql_a: &str, sql_b: &str) -> DetectionReport {
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(sql_a, sql_b, started)));
        let (kind, message) = match outcome {
            Ok(Ok(report)) => return report,
            Ok(Err(e)) => (e.kind(), e.to_string()),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                (ErrorKind::InternalError, message)
            }
        };

        error!(kind = %kind, error = %message, "Detection failed");
        DetectionReport::from_error(kind, message).with_performance(PerformanceSection {
            total_time: started.elapsed().as_secs_f64(),
            ..PerformanceSection::default()
        })
    }

    fn run(&self, sql_a: &str, sql_b: &str, started: Instant) -> Result<DetectionReport, DetectionError> {
        let (snapshot_a, snapshot_b) = if self.config.detector.parallel_snapshots {
            std::thread::scope(|scope| {
                let handle = scope.spawn(|| self.snapshot(sql_a, GRAPH_A));
                let snapshot_b = self.snapshot(sql_b, GRAPH_B);
                match handle.join() {
                    Ok(snapshot_a) => (snapshot_a, snapshot_b),
                    Err(payload) => panic::resume_unwind(payload),
                }
            })
        } else {
            (self.snapshot(sql_a, GRAPH_A), self.snapshot(sql_b, GRAPH_B))
        };

        debug!(
            vertices_a = snapshot_a.graph.vertex_count(),
            vertices_b = snapshot_b.graph.vertex_count(),
            "Snapshots built"
        );

        let comparison_started = Instant::now();
        let delta = self.comparator.compare(&snapshot_a.graph, &snapshot_b.graph)?;
        let comparison_time = comparison_started.elapsed();

        let rules_started = Instant::now();
        let result = self.registry.apply_all(&delta, &snapshot_a.graph, &snapshot_b.graph);
        let rule_application_time = rules_started.elapsed();

        let analysis = AnalysisSection {
            delta: delta.summary(),
            graph_a: snapshot_a.graph.counts(),
            graph_b: snapshot_b.graph.counts(),
            rules_applied: result.rules_applied(),
            statements_skipped: snapshot_a.skipped + snapshot_b.skipped,
        };

        let performance = PerformanceSection {
            parsing_time: (snapshot_a.parse_time + snapshot_b.parse_time).as_secs_f64(),
            graph_building_time: (snapshot_a.build_time + snapshot_b.build_time).as_secs_f64(),
            comparison_time: comparison_time.as_secs_f64(),
            rule_application_time: rule_application_time.as_secs_f64(),
            total_time: started.elapsed().as_secs_f64(),
        };

        let report = DetectionReport::from_conflicts(result.conflicts, self.config.detector.max_conflicts_in_report)
            .with_statistics(result.statistics)
            .with_analysis(analysis)
            .with_performance(performance);

        info!(
            conflicts = report.summary.total_conflicts,
            critical = report.summary.critical,
            merge_blocked = report.merge_blocked(),
            "Detection complete"
        );

        Ok(report)
    }
}
