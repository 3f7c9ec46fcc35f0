//! Rule registry
//!
//! Holds the configured rules, runs the enabled ones in the configured
//! order and post-processes their output. A rule that fails or panics
//! contributes no conflicts and is marked as not applied; the other rules
//! still run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use schemamerge_core::{
    ConflictLevel, ConflictRecord, DetectionError, DetectorConfig, RegistryConfig, RuleOrder,
    RuleSettings, RuleStatistics,
};
use schemamerge_graph::SchemaGraph;

use crate::delta::Delta;
use crate::rules::{default_rules, ConflictRule};

/// Rule name stamped on the global truncation note
const SYSTEM_LIMITER: &str = "System limiter";

/// Counts over one `apply_all` run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySummary {
    /// Conflicts returned, including truncation notes
    pub total_conflicts: usize,
    pub total_rules: usize,
    pub enabled_rules: usize,
}

/// Output of [`RuleRegistry::apply_all`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryResult {
    pub conflicts: Vec<ConflictRecord>,

    /// One entry per enabled rule, in execution order
    pub statistics: Vec<RuleStatistics>,

    pub summary: RegistrySummary,
}

impl RegistryResult {
    /// Rules that ran without failing
    pub fn rules_applied(&self) -> usize {
        self.statistics.iter().filter(|s| s.applied).count()
    }
}

/// Configured set of conflict rules keyed by id
pub struct RuleRegistry {
    rules: BTreeMap<String, Box<dyn ConflictRule>>,
    settings: BTreeMap<String, RuleSettings>,
    config: RegistryConfig,
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

impl RuleRegistry {
    /// Build a registry from an explicit rule list
    ///
    /// Fails on duplicate rule ids and on `custom_order` entries that name
    /// no rule.
    pub fn new(rules: Vec<Box<dyn ConflictRule>>, config: &DetectorConfig) -> Result<Self, DetectionError> {
        let mut by_id: BTreeMap<String, Box<dyn ConflictRule>> = BTreeMap::new();
        for rule in rules {
            let id = rule.id().to_string();
            if by_id.contains_key(&id) {
                return Err(DetectionError::validation("rules", format!("duplicate rule id {}", id)));
            }
            by_id.insert(id, rule);
        }

        if config.registry.rule_order == RuleOrder::Custom {
            if let Some(unknown) = config.registry.custom_order.iter().find(|id| !by_id.contains_key(*id)) {
                return Err(DetectionError::validation(
                    "registry.custom_order",
                    format!("unknown rule id {}", unknown),
                ));
            }
        }

        let settings = by_id.keys().map(|id| (id.clone(), config.rule_settings(id))).collect();

        Ok(Self {
            rules: by_id,
            settings,
            config: config.registry.clone(),
        })
    }

    /// Registry with rules R1 to R7
    pub fn with_default_rules(config: &DetectorConfig) -> Result<Self, DetectionError> {
        Self::new(default_rules(config), config)
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }

    pub fn get(&self, id: &str) -> Option<&dyn ConflictRule> {
        self.rules.get(id).map(|rule| rule.as_ref())
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.settings.get(id).map_or(false, |s| s.enabled)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn enabled_rules(&self) -> usize {
        self.rules.keys().filter(|id| self.is_enabled(id)).count()
    }

    /// Level a rule's conflicts are reported at
    fn effective_level(&self, rule: &dyn ConflictRule) -> ConflictLevel {
        self.settings
            .get(rule.id())
            .and_then(|s| s.level)
            .unwrap_or_else(|| rule.default_level())
    }

    /// Enabled rule ids in execution order
    pub fn execution_order(&self) -> Vec<&str> {
        let mut order: Vec<&dyn ConflictRule> = self
            .rules
            .values()
            .map(|rule| rule.as_ref())
            .filter(|rule| self.is_enabled(rule.id()))
            .collect();

        match self.config.rule_order {
            RuleOrder::ById => {}
            RuleOrder::ByCriticality => {
                // Stable sort keeps id order within a level
                order.sort_by(|a, b| self.effective_level(*b).cmp(&self.effective_level(*a)));
            }
            RuleOrder::Custom => {
                let position = |id: &str| {
                    self.config
                        .custom_order
                        .iter()
                        .position(|c| c == id)
                        .unwrap_or(usize::MAX)
                };
                order.sort_by_key(|rule| position(rule.id()));
            }
        }

        order.into_iter().map(|rule| rule.id()).collect()
    }

    /// Run every enabled rule
    pub fn apply_all(&self, delta: &Delta<'_>, graph_a: &SchemaGraph, graph_b: &SchemaGraph) -> RegistryResult {
        let mut conflicts = Vec::new();
        let mut statistics = Vec::new();

        for id in self.execution_order() {
            let (Some(rule), Some(settings)) = (self.get(id), self.settings.get(id)) else {
                continue;
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| rule.apply(delta, graph_a, graph_b)));
            let raw = match outcome {
                Ok(Ok(raw)) => raw,
                Ok(Err(e)) => {
                    let error = match e {
                        DetectionError::RuleApplication { .. } => e,
                        other => DetectionError::rule(id, other.to_string()),
                    };
                    warn!(rule = id, error = %error, "Rule failed");
                    statistics.push(failed(rule, error.to_string()));
                    continue;
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(rule = id, error = %message, "Rule panicked");
                    statistics.push(failed(rule, format!("rule panicked: {}", message)));
                    continue;
                }
            };

            let total_raw = raw.len();
            let processed = self.post_process(rule, settings, raw);
            let total_reported = total_raw.min(settings.max_reports_per_rule);

            debug!(rule = id, found = total_raw, reported = total_reported, "Rule applied");

            statistics.push(RuleStatistics {
                rule_id: id.to_string(),
                rule_name: rule.name().to_string(),
                applied: true,
                conflicts_found: processed.len(),
                total_raw: Some(total_raw),
                total_reported: Some(total_reported),
                error: None,
            });
            conflicts.extend(processed);
        }

        let max_total = self.config.max_total_conflicts;
        if conflicts.len() > max_total {
            let total = conflicts.len();
            conflicts.truncate(max_total);
            let note = ConflictRecord::system(
                ConflictLevel::Low,
                format!("{}: {} conflicts found, showing first {}", SYSTEM_LIMITER, total, max_total),
            )
            .with_rule_name(SYSTEM_LIMITER);
            conflicts.push(truncation_note(note, total, max_total));
        }

        RegistryResult {
            summary: RegistrySummary {
                total_conflicts: conflicts.len(),
                total_rules: self.len(),
                enabled_rules: self.enabled_rules(),
            },
            conflicts,
            statistics,
        }
    }

    /// Stamp defaults, apply settings and truncate one rule's output
    fn post_process(
        &self,
        rule: &dyn ConflictRule,
        settings: &RuleSettings,
        raw: Vec<ConflictRecord>,
    ) -> Vec<ConflictRecord> {
        let total = raw.len();
        let max = settings.max_reports_per_rule;

        let mut processed: Vec<ConflictRecord> = raw
            .into_iter()
            .take(max)
            .map(|mut conflict| {
                if conflict.rule.is_empty() {
                    conflict.rule = rule.id().to_string();
                }
                if conflict.rule_name.is_none() {
                    conflict.rule_name = Some(rule.name().to_string());
                }
                if let Some(level) = settings.level {
                    conflict.level = level;
                }
                if !settings.include_details {
                    conflict.details.clear();
                }
                conflict
            })
            .collect();

        if total > max {
            processed.push(truncation_note(
                ConflictRecord::new(
                    rule.id(),
                    ConflictLevel::Low,
                    format!("{} conflicts found, showing first {}", total, max),
                )
                .with_rule_name(rule.name()),
                total,
                max,
            ));
        }

        processed
    }
}

fn truncation_note(note: ConflictRecord, total: usize, reported: usize) -> ConflictRecord {
    note.with_detail("total_conflicts", total)
        .with_detail("reported_conflicts", reported)
}

fn failed(rule: &dyn ConflictRule, error: String) -> RuleStatistics {
    RuleStatistics {
        rule_id: rule.id().to_string(),
        rule_name: rule.name().to_string(),
        applied: false,
        conflicts_found: 0,
        total_raw: None,
        total_reported: None,
        error: Some(error),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
