use crate::LogResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// Summed raw counts. Rates are derived from the sums, never averaged.
///
/// Sums are `u128` so that adding any number of `u64` counts cannot overflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rollup {
    pub success_trials: u128,
    pub total_trials: u128,
}

impl Rollup {
    pub fn add(&mut self, record: &LogResult) {
        self.success_trials += u128::from(record.success_trials);
        self.total_trials += u128::from(record.total_trials);
    }

    /// Percentage, or 0.0 when nothing ran.
    pub fn rate_percent(&self) -> f64 {
        if self.total_trials == 0 {
            0.0
        } else {
            self.success_trials as f64 / self.total_trials as f64 * 100.0
        }
    }
}

impl<'a> FromIterator<&'a LogResult> for Rollup {
    fn from_iter<I: IntoIterator<Item = &'a LogResult>>(iter: I) -> Self {
        let mut rollup = Rollup::default();
        for record in iter {
            rollup.add(record);
        }
        rollup
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSummary {
    pub instance: u32,
    /// Ascending by repeat.
    pub records: Vec<LogResult>,
    pub rollup: Rollup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Ascending by instance.
    pub instances: Vec<InstanceSummary>,
    pub overall: Rollup,
}

impl BatchSummary {
    pub fn record_count(&self) -> usize {
        self.instances.iter().map(|i| i.records.len()).sum()
    }
}

pub fn summarize(records: Vec<LogResult>) -> BatchSummary {
    let overall = records.iter().collect::<Rollup>();

    let mut by_instance: BTreeMap<u32, Vec<LogResult>> = BTreeMap::new();
    for record in records {
        by_instance.entry(record.instance).or_default().push(record);
    }

    let instances = by_instance
        .into_iter()
        .map(|(instance, mut records)| {
            records.sort_by_key(|r| r.repeat);
            let rollup = records.iter().collect::<Rollup>();
            InstanceSummary {
                instance,
                records,
                rollup,
            }
        })
        .collect();

    BatchSummary { instances, overall }
}
