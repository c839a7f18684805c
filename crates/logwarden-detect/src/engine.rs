use crate::history::AnomalyHistory;
use crate::rate::RateAggregator;
use crate::rules::ThresholdRules;
use logwarden_common::{
    AnomalyRecord, ParsedLogRecord, RawLogRecord, StreamVerdict, Verdict, VerdictCause,
};
use logwarden_model::{ModelService, TrainedModel};
use logwarden_parser::LogParser;
use serde_json::json;
use std::sync::Arc;

/// The per-batch pipeline: parse, evaluate rules, score, fan out.
///
/// Rule violations dominate the model: a violated threshold yields a
/// maximal verdict regardless of model state. The whole batch is scored
/// against one model snapshot, so two logs in the same request always
/// see the same feature schema. Anomalies are pushed into the history
/// and the rate aggregator as they are found; neither push blocks
/// response assembly.
pub struct DetectionEngine {
    parser: LogParser,
    rules: ThresholdRules,
    model: Arc<ModelService>,
    history: Arc<AnomalyHistory>,
    aggregator: Arc<RateAggregator>,
}

impl DetectionEngine {
    pub fn new(
        rules: ThresholdRules,
        model: Arc<ModelService>,
        history: Arc<AnomalyHistory>,
        aggregator: Arc<RateAggregator>,
    ) -> Self {
        Self {
            parser: LogParser::new(),
            rules,
            model,
            history,
            aggregator,
        }
    }

    /// Processes one batch, preserving input order: `result[i]` is the
    /// verdict for `logs[i]`.
    pub fn process_batch(&self, logs: &[RawLogRecord]) -> Vec<StreamVerdict> {
        let snapshot = self.model.snapshot();
        let mut verdicts = Vec::with_capacity(logs.len());

        for log in logs {
            let parsed = self.parser.parse(log);
            let (verdict, anomaly) = self.evaluate_log(&parsed, snapshot.as_deref());
            if let Some(record) = anomaly {
                self.history.append(record.clone());
                self.aggregator.record(&record);
            }
            verdicts.push(StreamVerdict {
                score: verdict.score,
                is_anomaly: u8::from(verdict.is_anomaly),
            });
        }
        verdicts
    }

    fn evaluate_log(
        &self,
        parsed: &ParsedLogRecord,
        model: Option<&TrainedModel>,
    ) -> (Verdict, Option<AnomalyRecord>) {
        if let Some(violation) = self.rules.evaluate(parsed) {
            let record = AnomalyRecord {
                timestamp: parsed.timestamp,
                service: parsed.service.clone(),
                source: parsed.source.clone(),
                log_level: level_or_unknown(parsed),
                message: format!(
                    "Rule violation: {} ({}) > {}",
                    violation.rule_name, violation.actual_value, violation.threshold
                ),
                anomaly_score: 1.0,
                rule_violation: true,
                features: Default::default(),
                raw_log: parsed.raw_log.clone(),
                metadata: json!({
                    "violated_rule": violation.rule_name,
                    "threshold": violation.threshold,
                    "actual_value": violation.actual_value,
                }),
                context: json!({}),
            };
            let verdict = Verdict {
                score: 1.0,
                is_anomaly: true,
                cause: VerdictCause::Rule,
                evidence: Some(violation),
            };
            return (verdict, Some(record));
        }

        let Some(model) = model else {
            let verdict = Verdict {
                score: self.model.neutral_score(),
                is_anomaly: false,
                cause: VerdictCause::None,
                evidence: None,
            };
            return (verdict, None);
        };

        let vector = model.schema.project(parsed);
        let score = self.model.score(model, &vector);
        if !self.model.is_anomalous_score(score) {
            let verdict = Verdict {
                score,
                is_anomaly: false,
                cause: VerdictCause::None,
                evidence: None,
            };
            return (verdict, None);
        }

        let features = model
            .schema
            .names()
            .iter()
            .cloned()
            .zip(vector.iter().copied())
            .collect();
        let record = AnomalyRecord {
            timestamp: parsed.timestamp,
            service: parsed.service.clone(),
            source: parsed.source.clone(),
            log_level: level_or_unknown(parsed),
            message: parsed.message.clone().unwrap_or_default(),
            anomaly_score: score,
            rule_violation: false,
            features,
            raw_log: parsed.raw_log.clone(),
            metadata: json!({}),
            context: json!({}),
        };
        let verdict = Verdict {
            score,
            is_anomaly: true,
            cause: VerdictCause::Model,
            evidence: None,
        };
        (verdict, Some(record))
    }
}

fn level_or_unknown(parsed: &ParsedLogRecord) -> String {
    parsed
        .log_level
        .clone()
        .unwrap_or_else(|| "unknown".to_string())
}
