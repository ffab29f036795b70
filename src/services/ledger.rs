use crate::domain::models::{Bucket, CheckRecord, Summary, SummaryCounts};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

#[derive(Default)]
struct Buckets {
    positive_pass: Vec<CheckRecord>,
    positive_fail: Vec<CheckRecord>,
    negative_pass: Vec<CheckRecord>,
    negative_fail: Vec<CheckRecord>,
    skipped: Vec<String>,
}

impl Buckets {
    fn slot(&mut self, bucket: Bucket) -> &mut Vec<CheckRecord> {
        match bucket {
            Bucket::PositivePass => &mut self.positive_pass,
            Bucket::PositiveFail => &mut self.positive_fail,
            Bucket::NegativePass => &mut self.negative_pass,
            Bucket::NegativeFail => &mut self.negative_fail,
        }
    }
}

/// Per-run result accumulator. Append-only.
#[derive(Default)]
pub struct Ledger {
    buckets: Mutex<Buckets>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, rec: CheckRecord) -> Bucket {
        let bucket = rec.bucket;
        debug_assert_eq!(bucket.polarity(), rec.polarity);
        let verdict = if bucket.passed() { "passed" } else { "failed" };
        if bucket.passed() {
            info!(
                "{} | {} ({} test) {}",
                rec.action,
                verdict,
                rec.polarity.as_str(),
                rec.message
            );
        } else {
            warn!(
                "{} | {} ({} test) {}",
                rec.action,
                verdict,
                rec.polarity.as_str(),
                rec.message
            );
        }
        self.lock().slot(bucket).push(rec);
        bucket
    }

    /// A check that never ran. Listed in the summary, never counted as pass or fail.
    pub fn note_skip(&self, action: &str, reason: &str) {
        warn!("{} | skipped: {}", action, reason);
        self.lock().skipped.push(format!("{} - {}", action, reason));
    }

    /// Number of classified records.
    pub fn total(&self) -> usize {
        let b = self.lock();
        b.positive_pass.len() + b.positive_fail.len() + b.negative_pass.len() + b.negative_fail.len()
    }

    pub fn summary(&self) -> Summary {
        let b = self.lock();
        let lines = |records: &[CheckRecord]| records.iter().map(CheckRecord::line).collect::<Vec<_>>();
        Summary {
            positive_pass: lines(&b.positive_pass),
            positive_fail: lines(&b.positive_fail),
            negative_pass: lines(&b.negative_pass),
            negative_fail: lines(&b.negative_fail),
            skipped: b.skipped.clone(),
            counts: SummaryCounts {
                positive_pass: b.positive_pass.len(),
                positive_fail: b.positive_fail.len(),
                negative_pass: b.negative_pass.len(),
                negative_fail: b.negative_fail.len(),
                skipped: b.skipped.len(),
            },
        }
    }

    pub fn exit_code(&self) -> i32 {
        let b = self.lock();
        if b.positive_fail.is_empty() && b.negative_fail.is_empty() {
            0
        } else {
            1
        }
    }
}
