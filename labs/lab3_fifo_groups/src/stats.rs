//! Per-consumer / per-group accounting of processed messages.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}

/// Orders `group-2` before `group-10`.
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    fn split(s: &str) -> (&str, Option<u64>) {
        let digits = s.len() - s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let (head, tail) = s.split_at(s.len() - digits);
        (head, tail.parse().ok())
    }
    split(a).cmp(&split(b)).then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    pub key: String,
    pub count: u64,
    pub percentage: f64,
}

/// Counts per key with their share of the total. Used for both the
/// consumer-side group totals and the producer's send report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Distribution {
    pub shares: Vec<Share>,
    pub total: u64,
}

impl Distribution {
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut shares: Vec<Share> = counts
            .into_iter()
            .map(|(key, count)| Share {
                key,
                count,
                percentage: 0.0,
            })
            .collect();
        shares.sort_by(|a, b| natural_cmp(&a.key, &b.key));

        let total = shares.iter().map(|s| s.count).sum();
        for share in &mut shares {
            share.percentage = percentage(share.count, total);
        }
        Self { shares, total }
    }

    pub fn count(&self, key: &str) -> u64 {
        self.shares
            .iter()
            .find(|s| s.key == key)
            .map_or(0, |s| s.count)
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.shares {
            writeln!(f, "  - {}: {} messages ({:.1}%)", s.key, s.count, s.percentage)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerBreakdown {
    pub consumer_id: usize,
    /// (group, count), naturally ordered by group
    pub groups: Vec<(String, u64)>,
    pub total: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsReport {
    pub consumers: Vec<ConsumerBreakdown>,
    pub groups: Distribution,
    pub total: u64,
}

impl StatsReport {
    pub fn count(&self, consumer_id: usize, group: &str) -> u64 {
        self.consumer(consumer_id)
            .and_then(|c| c.groups.iter().find(|(g, _)| g == group))
            .map_or(0, |(_, n)| *n)
    }

    pub fn consumer(&self, consumer_id: usize) -> Option<&ConsumerBreakdown> {
        self.consumers.iter().find(|c| c.consumer_id == consumer_id)
    }

    pub fn consumer_total(&self, consumer_id: usize) -> u64 {
        self.consumer(consumer_id).map_or(0, |c| c.total)
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nMessage Processing Statistics")?;
        writeln!(f, "By Consumer/Group:")?;
        for c in &self.consumers {
            writeln!(f, "Consumer {}:", c.consumer_id)?;
            for (group, count) in &c.groups {
                writeln!(f, "  - Group {group}: {count} messages")?;
            }
            writeln!(f, "  Total: {} messages", c.total)?;
        }

        writeln!(f, "\nBy Group:")?;
        write!(f, "{}", self.groups)?;

        writeln!(f, "\nProcessing Load Distribution:")?;
        writeln!(f, "----------------------------------")?;
        for c in &self.consumers {
            writeln!(
                f,
                "Consumer {}: {} messages ({:.1}%)",
                c.consumer_id, c.total, c.percentage
            )?;
        }
        writeln!(f, "\nTotal Messages Processed: {}", self.total)?;
        write!(f, "----------------------------------")
    }
}

/// Thread-safe tally of processed messages, keyed by consumer then group.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    counts: Mutex<HashMap<usize, HashMap<String, u64>>>,
}

impl ConsumerStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, HashMap<String, u64>>> {
        // a panicking incrementer cannot leave a count half-written
        self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn increment(&self, consumer_id: usize, group: &str) {
        let mut counts = self.lock();
        let per_group = counts.entry(consumer_id).or_default();
        match per_group.get_mut(group) {
            Some(n) => *n += 1,
            None => {
                per_group.insert(group.to_string(), 1);
            }
        }
    }

    /// Snapshot and aggregate under one lock acquisition.
    pub fn report(&self) -> StatsReport {
        let counts = self.lock();

        let mut group_totals: HashMap<&str, u64> = HashMap::new();
        let mut consumers: Vec<ConsumerBreakdown> = counts
            .iter()
            .map(|(&consumer_id, groups)| {
                let mut per_group: Vec<(String, u64)> =
                    groups.iter().map(|(g, &n)| (g.clone(), n)).collect();
                per_group.sort_by(|a, b| natural_cmp(&a.0, &b.0));
                for (g, &n) in groups {
                    *group_totals.entry(g.as_str()).or_default() += n;
                }
                ConsumerBreakdown {
                    consumer_id,
                    total: per_group.iter().map(|(_, n)| n).sum(),
                    groups: per_group,
                    percentage: 0.0,
                }
            })
            .collect();

        let groups =
            Distribution::from_counts(group_totals.into_iter().map(|(g, n)| (g.to_string(), n)));
        drop(counts);

        consumers.sort_by_key(|c| c.consumer_id);
        for c in &mut consumers {
            c.percentage = percentage(c.total, groups.total);
        }

        StatsReport {
            total: groups.total,
            consumers,
            groups,
        }
    }
}
