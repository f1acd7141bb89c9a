//! Deduplication and merge of candidates into the store.

use std::collections::HashSet;

use jobfeed_core::{Candidate, KindCounts, RecordKind, Store};
use serde::{Deserialize, Serialize};

/// Ids start above this when the job sequence carries none.
pub const JOB_ID_FLOOR: u64 = 0;

/// Maximum records kept per kind after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionCaps {
    pub jobs: usize,
    pub results: usize,
    pub exams: usize,
    pub admit_cards: usize,
}

impl Default for RetentionCaps {
    fn default() -> Self {
        Self {
            jobs: 100,
            results: 30,
            exams: 30,
            admit_cards: 30,
        }
    }
}

impl RetentionCaps {
    pub fn cap(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Job => self.jobs,
            RecordKind::Result => self.results,
            RecordKind::Exam => self.exams,
            RecordKind::AdmitCard => self.admit_cards,
        }
    }
}

/// Working set of fingerprints, global across kinds.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn seeded_from(store: &Store) -> Self {
        Self {
            seen: store.fingerprints(),
        }
    }

    pub fn is_known(&self, candidate: &Candidate) -> bool {
        self.seen.contains(&candidate.fingerprint())
    }

    /// Record the candidate's fingerprint; `false` if it was already known.
    pub fn admit(&mut self, candidate: &Candidate) -> bool {
        self.seen.insert(candidate.fingerprint())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub added: KindCounts,
    pub duplicates: usize,
    pub pruned: KindCounts,
    pub assigned_ids: Vec<u64>,
}

/// Merge `candidates` (in arrival order) into `store`.
///
/// Accepted candidates are prepended, so the last accepted one ends up first. Each
/// accepted job gets the next id above the current maximum. Every sequence is then cut
/// to its cap, dropping the oldest records.
pub fn reconcile<I>(mut store: Store, candidates: I, caps: &RetentionCaps) -> (Store, MergeReport)
where
    I: IntoIterator<Item = Candidate>,
{
    let mut report = MergeReport::default();
    let mut dedup = Deduplicator::seeded_from(&store);
    let mut next_id = store
        .max_job_id()
        .unwrap_or(JOB_ID_FLOOR)
        .max(JOB_ID_FLOOR)
        .saturating_add(1);
    let mut fresh = Store::default();

    for candidate in candidates {
        if !dedup.admit(&candidate) {
            report.duplicates += 1;
            continue;
        }

        let kind = candidate.kind();
        let candidate = match candidate {
            Candidate::Job(mut job) => {
                job.id = Some(next_id);
                report.assigned_ids.push(next_id);
                next_id = next_id.saturating_add(1);
                Candidate::Job(job)
            }
            other => other,
        };
        fresh.sequence_mut(kind).push(candidate.into_record());
        report.added.increment(kind);
    }

    for kind in RecordKind::ALL {
        let existing = std::mem::take(store.sequence_mut(kind));
        let mut merged = std::mem::take(fresh.sequence_mut(kind));
        merged.reverse();
        merged.extend(existing);

        let cap = caps.cap(kind);
        if merged.len() > cap {
            report.pruned.set(kind, merged.len() - cap);
            merged.truncate(cap);
        }
        *store.sequence_mut(kind) = merged;
    }

    (store, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobfeed_core::{JobPosting, JobType, Notice, Record};
    use serde_json::json;

    fn job(title: &str, link: &str) -> Candidate {
        Candidate::Job(JobPosting {
            id: None,
            title: title.to_string(),
            organization: "SSC".to_string(),
            job_type: JobType::Govt,
            location: "All India".to_string(),
            qualification: "Graduate".to_string(),
            experience: "Fresher".to_string(),
            salary: "Not Disclosed".to_string(),
            last_date: "Check Link".to_string(),
            vacancies: "100".to_string(),
            age_limit: "As per rules".to_string(),
            urgent: false,
            apply_link: link.to_string(),
            pdf_link: "#".to_string(),
            date: "17 Oct 2026".to_string(),
            icon: RecordKind::Job.icon().to_string(),
        })
    }

    fn notice(title: &str, link: &str) -> Notice {
        Notice {
            title: title.to_string(),
            date: "17 Oct 2026".to_string(),
            link: link.to_string(),
            icon: RecordKind::Result.icon().to_string(),
        }
    }

    fn stored(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => Record::from_map(map),
            other => panic!("not an object: {other}"),
        }
    }

    fn titles(records: &[Record]) -> Vec<&str> {
        records.iter().map(Record::title).collect()
    }

    #[test]
    fn duplicate_is_suppressed_and_new_result_is_added() {
        let mut store = Store::default();
        store.jobs.push(stored(json!({
            "id": 5,
            "title": "SSC CGL 2024",
            "applyLink": "https://ssc.gov.in/x"
        })));

        let candidates = vec![
            job("SSC CGL 2024", "https://ssc.gov.in/x"),
            Candidate::Result(notice("UPSC Result 2024", "https://upsc.gov.in/result")),
        ];
        let before_jobs = store.jobs.clone();
        let (store, report) = reconcile(store, candidates, &RetentionCaps::default());

        assert_eq!(store.jobs, before_jobs);
        assert_eq!(titles(&store.results), vec!["UPSC Result 2024"]);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.added.results, 1);
        assert_eq!(report.added.jobs, 0);
        assert!(report.assigned_ids.is_empty());
    }

    #[test]
    fn same_title_and_link_collapse_regardless_of_other_fields() {
        let mut second = job("IBPS PO 2026", "https://ibps.in/po");
        if let Candidate::Job(posting) = &mut second {
            posting.organization = "Other".to_string();
            posting.date = "01 Jan 2020".to_string();
        }
        let (store, report) = reconcile(
            Store::default(),
            vec![job("IBPS PO 2026", "https://ibps.in/po"), second],
            &RetentionCaps::default(),
        );
        assert_eq!(store.jobs.len(), 1);
        assert_eq!(store.jobs[0].get_str("organization"), Some("SSC"));
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn fingerprints_are_global_across_kinds() {
        let mut store = Store::default();
        store.admit_cards.push(stored(json!({
            "title": "RRB NTPC Notice",
            "link": "https://rrb.gov.in/n"
        })));
        let (store, report) = reconcile(
            store,
            vec![Candidate::Result(notice("RRB NTPC Notice", "https://rrb.gov.in/n"))],
            &RetentionCaps::default(),
        );
        assert!(store.results.is_empty());
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn ids_are_consecutive_above_prior_maximum() {
        let mut store = Store::default();
        store.jobs.push(stored(json!({"id": 3, "title": "a", "applyLink": "https://a"})));
        store.jobs.push(stored(json!({"id": 41, "title": "b", "applyLink": "https://b"})));

        let candidates = (0..4).map(|i| job(&format!("New {i}"), &format!("https://n/{i}")));
        let (store, report) = reconcile(store, candidates, &RetentionCaps::default());

        assert_eq!(report.assigned_ids, vec![42, 43, 44, 45]);
        let ids: Vec<Option<u64>> = store.jobs.iter().map(Record::id).collect();
        assert_eq!(
            ids,
            vec![Some(45), Some(44), Some(43), Some(42), Some(3), Some(41)]
        );
        assert_eq!(titles(&store.jobs)[0], "New 3");
    }

    #[test]
    fn empty_job_sequence_starts_above_floor() {
        let (store, report) = reconcile(
            Store::default(),
            vec![job("First", "https://first")],
            &RetentionCaps::default(),
        );
        assert_eq!(report.assigned_ids, vec![JOB_ID_FLOOR + 1]);
        assert_eq!(store.jobs[0].id(), Some(JOB_ID_FLOOR + 1));
    }

    #[test]
    fn retention_keeps_most_recent_records() {
        let mut store = Store::default();
        for i in 0..3 {
            store.results.push(stored(json!({"title": format!("old {i}"), "link": format!("https://old/{i}")})));
        }
        let caps = RetentionCaps {
            results: 4,
            ..RetentionCaps::default()
        };
        let candidates = (0..2).map(|i| Candidate::Result(notice(&format!("new {i}"), &format!("https://new/{i}"))));
        let (store, report) = reconcile(store, candidates, &caps);

        assert_eq!(titles(&store.results), vec!["new 1", "new 0", "old 0", "old 1"]);
        assert_eq!(report.pruned.results, 1);
    }

    #[test]
    fn no_candidates_only_applies_retention() {
        let mut store = Store::default();
        for i in 0..5 {
            store.exams.push(stored(json!({"title": format!("exam {i}"), "link": "#"})));
        }
        let caps = RetentionCaps {
            exams: 3,
            ..RetentionCaps::default()
        };
        let (once, _) = reconcile(store, Vec::new(), &caps);
        assert_eq!(titles(&once.exams), vec!["exam 0", "exam 1", "exam 2"]);

        let (twice, report) = reconcile(once.clone(), Vec::new(), &caps);
        assert_eq!(twice, once);
        assert_eq!(report, MergeReport::default());
    }

    #[test]
    fn deduplicator_tracks_batch_members() {
        let mut dedup = Deduplicator::default();
        let candidate = job("X", "https://x");
        assert!(!dedup.is_known(&candidate));
        assert!(dedup.admit(&candidate));
        assert!(dedup.is_known(&candidate));
        assert!(!dedup.admit(&candidate));
        assert_eq!(dedup.len(), 1);
    }
}
