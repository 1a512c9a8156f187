// Survey tracking and extraction statistics for mining runs
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{ExtractionYield, Survey};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtractionStats {
    pub extractions: u32,
    pub total_units: i64,
}

impl ExtractionStats {
    pub fn average_yield(&self) -> f64 {
        if self.extractions == 0 {
            0.0
        } else {
            self.total_units as f64 / self.extractions as f64
        }
    }
}

/// Active surveys keyed by signature, plus what extractions have produced
#[derive(Debug, Default)]
pub struct SurveyBook {
    surveys: HashMap<String, Survey>,
    by_good: HashMap<String, ExtractionStats>,
    overall: ExtractionStats,
}

fn expires_at(survey: &Survey) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&survey.expiration)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl SurveyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, surveys: Vec<Survey>) {
        for survey in surveys {
            debug!(
                "🔭 Survey {} at {} ({} deposits, {})",
                survey.signature,
                survey.symbol,
                survey.deposits.len(),
                survey.size
            );
            self.surveys.insert(survey.signature.clone(), survey);
        }
    }

    pub fn len(&self) -> usize {
        self.surveys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surveys.is_empty()
    }

    pub fn discard(&mut self, signature: &str) -> Option<Survey> {
        self.surveys.remove(signature)
    }

    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.surveys.len();
        self.surveys
            .retain(|_, survey| expires_at(survey).is_none_or(|at| at > now));
        before - self.surveys.len()
    }

    /// Best live survey at `waypoint`.
    ///
    /// With wanted goods, the survey with the most matching deposits wins and surveys
    /// without any match are skipped. Without, the largest survey wins.
    pub fn best_for(&self, waypoint: &str, wanted: &[String], now: DateTime<Utc>) -> Option<Survey> {
        let live = self
            .surveys
            .values()
            .filter(|s| s.symbol == waypoint)
            .filter(|s| expires_at(s).is_none_or(|at| at > now));

        if wanted.is_empty() {
            return live
                .max_by(|a, b| {
                    a.size_rank()
                        .cmp(&b.size_rank())
                        .then_with(|| a.deposits.len().cmp(&b.deposits.len()))
                        .then_with(|| b.signature.cmp(&a.signature))
                })
                .cloned();
        }

        live.map(|s| {
            let matches: usize = wanted.iter().map(|good| s.deposits_of(good)).sum();
            (matches, s)
        })
        .filter(|(matches, _)| *matches > 0)
        .max_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| a.1.size_rank().cmp(&b.1.size_rank()))
                .then_with(|| b.1.signature.cmp(&a.1.signature))
        })
        .map(|(_, s)| s.clone())
    }

    pub fn record_extraction(&mut self, extracted: &ExtractionYield) {
        let stats = self.by_good.entry(extracted.symbol.clone()).or_default();
        stats.extractions += 1;
        stats.total_units += extracted.units as i64;
        self.overall.extractions += 1;
        self.overall.total_units += extracted.units as i64;
    }

    pub fn stats(&self, good: Option<&str>) -> ExtractionStats {
        match good {
            Some(good) => self.by_good.get(good).copied().unwrap_or_default(),
            None => self.overall,
        }
    }

    /// Observed mean yield, falling back to `default` before any extraction
    pub fn expected_yield(&self, default: f64) -> f64 {
        if self.overall.extractions == 0 {
            default
        } else {
            self.overall.average_yield()
        }
    }
}
