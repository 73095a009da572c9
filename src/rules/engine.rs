//! Ordered rule chain with per-resource failure isolation.
//!
//! Rules run in registration order and evaluation stops at the first rule
//! that finds the resource eligible, so the earliest rule owns the mark.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::resource::calendar::Calendar;
use crate::resource::model::{Resource, TerminationMark};
use crate::rules::base::Rule;
use crate::rules::delete_on_termination::DeleteOnTerminationRule;
use crate::rules::old_detached::OldDetachedVolumeRule;

/// Verdict for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub resource_id: String,
    /// `true` when some rule found the resource eligible for cleanup.
    pub eligible: bool,
    /// The rule that decided eligibility.
    pub rule: Option<&'static str>,
    pub termination: Option<TerminationMark>,
}

/// A resource whose evaluation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationFailure {
    pub resource_id: String,
    pub error_code: &'static str,
    pub message: String,
    pub retryable: bool,
}

/// Outcome of evaluating a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub evaluations: Vec<Evaluation>,
    pub failures: Vec<EvaluationFailure>,
    #[serde(skip)]
    pub duration: Duration,
}

impl EvaluationReport {
    pub fn evaluated(&self) -> usize {
        self.evaluations.len()
    }

    pub fn marked(&self) -> usize {
        self.evaluations.iter().filter(|e| e.eligible).count()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Ordered collection of rules.
#[derive(Default)]
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
    logger: Option<ActivityLoggerHandle>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the rules enabled in `config`, all sharing one calendar and logger.
    ///
    /// Filter and owner-override outcomes are logged by the first rule only,
    /// so each resource gets one such record per pass.
    pub fn from_config(
        config: &Config,
        calendar: Arc<dyn Calendar>,
        logger: Option<ActivityLoggerHandle>,
    ) -> Result<Self> {
        let mut engine = Self::new();

        let dot = &config.rules.delete_on_termination;
        if dot.enabled {
            let mut rule = DeleteOnTerminationRule::new(Arc::clone(&calendar), dot.retention_days)?
                .with_directives(config.directive.clone())
                .with_override_events(engine.rules.is_empty());
            if let Some(logger) = &logger {
                rule = rule.with_logger(logger.clone());
            }
            engine.add_rule(Box::new(rule));
        }

        let old = &config.rules.old_detached;
        if old.enabled {
            let mut rule = OldDetachedVolumeRule::new(
                Arc::clone(&calendar),
                old.detach_days_threshold,
                old.retention_days,
            )?
            .with_directives(config.directive.clone())
            .with_override_events(engine.rules.is_empty());
            if let Some(logger) = &logger {
                rule = rule.with_logger(logger.clone());
            }
            engine.add_rule(Box::new(rule));
        }

        engine.logger = logger;
        Ok(engine)
    }

    #[must_use]
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.add_rule(Box::new(rule));
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run the rule chain over one resource. The first calendar (or other
    /// collaborator) failure aborts this resource only.
    pub fn evaluate(&self, resource: &mut Resource) -> Result<Evaluation> {
        for rule in &self.rules {
            if !rule.is_valid(resource)? {
                return Ok(Evaluation {
                    resource_id: resource.id().to_string(),
                    eligible: true,
                    rule: Some(rule.name()),
                    termination: resource.termination().cloned(),
                });
            }
        }
        Ok(Evaluation {
            resource_id: resource.id().to_string(),
            eligible: false,
            rule: None,
            termination: resource.termination().cloned(),
        })
    }

    /// Evaluate every resource; a failure on one never stops the others.
    pub fn evaluate_all(&self, resources: &mut [Resource]) -> EvaluationReport {
        let started = Instant::now();
        let mut report = EvaluationReport::default();

        for resource in resources.iter_mut() {
            match self.evaluate(resource) {
                Ok(evaluation) => report.evaluations.push(evaluation),
                Err(err) => {
                    self.emit(ActivityEvent::EvaluationFailed {
                        resource_id: resource.id().to_string(),
                        error_code: err.code().to_string(),
                        error_message: err.to_string(),
                    });
                    report.failures.push(EvaluationFailure {
                        resource_id: resource.id().to_string(),
                        error_code: err.code(),
                        message: err.to_string(),
                        retryable: err.is_retryable(),
                    });
                }
            }
        }

        report.duration = started.elapsed();
        self.emit(ActivityEvent::BatchCompleted {
            evaluated: report.evaluated(),
            marked: report.marked(),
            failed: report.failed(),
            duration_ms: u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
        });
        report
    }

    fn emit(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}
