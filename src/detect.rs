//! Regression detection over a benchmark group's history.
//!
//! The comparison is deliberately against the immediately preceding entry
//! (or an explicitly chosen baseline commit), matching the git-bisect mental
//! model of CI gating: did the last change make things worse. No trend
//! fitting.

use std::fmt;

use crate::bench::Entry;
use crate::config::{Config, Polarity};
use crate::errors::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Two entries were available and compared.
    Compared,
    /// Fewer than two entries exist; nothing to compare yet. Not an error.
    InsufficientHistory,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FindingKind {
    /// The measurement got worse by more than the regression threshold, and
    /// the error intervals of the two values do not overlap.
    Regression { previous: f64, current: f64, delta: f64 },
    /// Symmetric to `Regression`, against the improvement threshold.
    Improvement { previous: f64, current: f64, delta: f64 },
    /// Present in the current entry only.
    Added { current: f64 },
    /// Present in the previous entry only.
    Removed { previous: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Finding {
    pub name: String,
    pub unit: String,
    pub kind: FindingKind,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FindingKind::Regression { previous, current, delta } => write!(
                f,
                "regression: {}: {} -> {} {} ({:+.1}%)",
                self.name,
                previous,
                current,
                self.unit,
                delta * 100.0
            ),
            FindingKind::Improvement { previous, current, delta } => write!(
                f,
                "improvement: {}: {} -> {} {} ({:+.1}%)",
                self.name,
                previous,
                current,
                self.unit,
                delta * 100.0
            ),
            FindingKind::Added { current } => {
                write!(f, "added: {}: {} {}", self.name, current, self.unit)
            }
            FindingKind::Removed { previous } => {
                write!(f, "removed: {} (was {} {})", self.name, previous, self.unit)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub status: Status,
    pub findings: Vec<Finding>,
}

impl Report {
    fn insufficient() -> Self {
        Report {
            status: Status::InsufficientHistory,
            findings: Vec::new(),
        }
    }

    pub fn regressions(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| matches!(f.kind, FindingKind::Regression { .. }))
    }

    pub fn has_regressions(&self) -> bool {
        self.regressions().next().is_some()
    }
}

/// Compares the group's newest entry against the immediately preceding one,
/// or against the newest entry with commit id `baseline` when given.
///
/// A delta is only flagged when the error intervals of the two values do not
/// overlap, which keeps noisy micro-benchmarks from raising false alarms.
/// Measurements with a previous value of zero are skipped (the relative delta
/// is undefined), and names present on only one side become `Added` /
/// `Removed` findings.
pub fn evaluate(entries: &[Entry], baseline: Option<&str>, cfg: &Config) -> Result<Report> {
    if entries.len() < 2 {
        return Ok(Report::insufficient());
    }

    let current = &entries[entries.len() - 1];
    let previous = match baseline {
        None => &entries[entries.len() - 2],
        Some(id) => entries[..entries.len() - 1]
            .iter()
            .rev()
            .find(|e| e.commit.id == id)
            .ok_or_else(|| Error::UnknownBaseline(id.to_owned()))?,
    };

    let mut findings = Vec::new();
    for cur in &current.benches {
        let prev = match previous.measurement(&cur.name) {
            Some(p) => p,
            None => {
                findings.push(Finding {
                    name: cur.name.clone(),
                    unit: cur.unit.clone(),
                    kind: FindingKind::Added { current: cur.value },
                });
                continue;
            }
        };

        if prev.value == 0.0 {
            continue;
        }
        let delta = (cur.value - prev.value) / prev.value;

        // Overlapping confidence intervals: the difference is within noise.
        if (cur.value - prev.value).abs() <= cur.range + prev.range {
            continue;
        }

        let worsening = match cfg.polarity_for(&cur.unit) {
            Polarity::Lower => delta,
            Polarity::Higher => -delta,
        };

        if worsening > cfg.regression_threshold {
            findings.push(Finding {
                name: cur.name.clone(),
                unit: cur.unit.clone(),
                kind: FindingKind::Regression {
                    previous: prev.value,
                    current: cur.value,
                    delta,
                },
            });
        } else if -worsening > cfg.improvement_threshold {
            findings.push(Finding {
                name: cur.name.clone(),
                unit: cur.unit.clone(),
                kind: FindingKind::Improvement {
                    previous: prev.value,
                    current: cur.value,
                    delta,
                },
            });
        }
    }

    for prev in &previous.benches {
        if current.measurement(&prev.name).is_none() {
            findings.push(Finding {
                name: prev.name.clone(),
                unit: prev.unit.clone(),
                kind: FindingKind::Removed { previous: prev.value },
            });
        }
    }

    Ok(Report {
        status: Status::Compared,
        findings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::test_support::{bench, entry};

    fn two(prev: Vec<crate::bench::Measurement>, cur: Vec<crate::bench::Measurement>) -> Vec<Entry> {
        vec![
            entry("aaa", Some(true), 1000, prev),
            entry("bbb", Some(true), 2000, cur),
        ]
    }

    #[test]
    fn flags_a_clear_slowdown() {
        let entries = two(
            vec![bench("fib_recursive(12)", 292556.0, 500.0)],
            vec![bench("fib_recursive(12)", 392445.0, 26977.0)],
        );
        let report = evaluate(&entries, None, &Config::default()).unwrap();

        assert_eq!(report.status, Status::Compared);
        assert!(report.has_regressions());
        match &report.findings[0].kind {
            FindingKind::Regression { delta, .. } => {
                assert!((delta - 0.3415).abs() < 0.001, "delta was {}", delta)
            }
            other => panic!("expected regression, got {:?}", other),
        }
    }

    #[test]
    fn overlapping_intervals_suppress_the_flag() {
        // |294749 - 293408| = 1341 < 556 + 1338, so this is noise even with a
        // threshold the relative delta would clear.
        let entries = two(
            vec![bench("fib_recursive(12)", 293408.0, 556.0)],
            vec![bench("fib_recursive(12)", 294749.0, 1338.0)],
        );
        let cfg = Config {
            regression_threshold: 0.001,
            ..Config::default()
        };
        let report = evaluate(&entries, None, &cfg).unwrap();
        assert!(report.findings.is_empty());
    }

    #[test]
    fn single_entry_is_insufficient_history() {
        let entries = vec![entry("aaa", Some(true), 1000, vec![bench("fib", 1.0, 0.0)])];
        let report = evaluate(&entries, None, &Config::default()).unwrap();
        assert_eq!(report.status, Status::InsufficientHistory);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn added_and_removed_names_are_not_regressions() {
        let entries = two(
            vec![bench("old_bench", 100.0, 1.0)],
            vec![bench("new_bench", 100.0, 1.0)],
        );
        let report = evaluate(&entries, None, &Config::default()).unwrap();
        assert!(!report.has_regressions());
        assert_eq!(report.findings.len(), 2);
        assert!(matches!(report.findings[0].kind, FindingKind::Added { .. }));
        assert!(matches!(report.findings[1].kind, FindingKind::Removed { .. }));
    }

    #[test]
    fn empty_current_entry_means_no_comparison_not_all_zero() {
        let entries = two(vec![bench("fib", 100.0, 1.0)], vec![]);
        let report = evaluate(&entries, None, &Config::default()).unwrap();
        assert!(!report.has_regressions());
        assert!(matches!(report.findings[0].kind, FindingKind::Removed { .. }));
    }

    #[test]
    fn zero_previous_value_is_skipped() {
        let entries = two(vec![bench("fib", 0.0, 0.0)], vec![bench("fib", 50.0, 1.0)]);
        let report = evaluate(&entries, None, &Config::default()).unwrap();
        assert!(report.findings.is_empty());
    }

    #[test]
    fn throughput_polarity_is_inverted() {
        let mps = |v, r| crate::bench::Measurement::new("parse", v, r, "MB/s").unwrap();
        let entries = two(vec![mps(100.0, 1.0)], vec![mps(60.0, 1.0)]);

        // With no polarity table a falling value looks like an improvement.
        let report = evaluate(&entries, None, &Config::default()).unwrap();
        assert!(!report.has_regressions());

        let mut cfg = Config::default();
        cfg.units.insert("MB/s".to_owned(), Polarity::Higher);
        let report = evaluate(&entries, None, &cfg).unwrap();
        assert!(report.has_regressions());
    }

    #[test]
    fn improvements_are_reported_separately() {
        let entries = two(
            vec![bench("fib", 400000.0, 500.0)],
            vec![bench("fib", 300000.0, 500.0)],
        );
        let report = evaluate(&entries, None, &Config::default()).unwrap();
        assert!(!report.has_regressions());
        assert!(matches!(
            report.findings[0].kind,
            FindingKind::Improvement { .. }
        ));
    }

    #[test]
    fn explicit_baseline_overrides_the_previous_entry() {
        let entries = vec![
            entry("aaa", Some(true), 1000, vec![bench("fib", 100000.0, 100.0)]),
            entry("bbb", Some(true), 2000, vec![bench("fib", 150000.0, 100.0)]),
            entry("ccc", Some(true), 3000, vec![bench("fib", 155000.0, 100.0)]),
        ];
        let cfg = Config::default();

        // Against the direct predecessor this is within threshold.
        let report = evaluate(&entries, None, &cfg).unwrap();
        assert!(!report.has_regressions());

        // Against the older baseline it is a 55% slowdown.
        let report = evaluate(&entries, Some("aaa"), &cfg).unwrap();
        assert!(report.has_regressions());

        assert!(matches!(
            evaluate(&entries, Some("zzz"), &cfg),
            Err(Error::UnknownBaseline(_))
        ));
    }

    #[test]
    fn finding_lines_are_one_per_measurement() {
        let entries = two(
            vec![bench("fib_recursive(12)", 292556.0, 500.0)],
            vec![bench("fib_recursive(12)", 392445.0, 26977.0)],
        );
        let report = evaluate(&entries, None, &Config::default()).unwrap();
        let line = report.findings[0].to_string();
        assert_eq!(
            line,
            "regression: fib_recursive(12): 292556 -> 392445 ns/iter (+34.1%)"
        );
    }
}
