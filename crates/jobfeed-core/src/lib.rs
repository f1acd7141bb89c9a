//! Core record model for the jobfeed catalog.
//!
//! Persisted records stay loosely typed ([`Record`]) so fields written by hand or by older
//! runs survive a reconciliation untouched. Freshly classified records are built from the
//! typed [`JobPosting`] and [`Notice`] shapes and converted with a fixed field order.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CRATE_NAME: &str = "jobfeed-core";

/// Joins the title and link halves of a fingerprint.
pub const FINGERPRINT_SEPARATOR: &str = "|";

/// One of the four disjoint record categories kept in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Job,
    Result,
    Exam,
    AdmitCard,
}

impl RecordKind {
    /// Document order of the four assignments.
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Job,
        RecordKind::Exam,
        RecordKind::Result,
        RecordKind::AdmitCard,
    ];

    pub fn variable_name(self) -> &'static str {
        match self {
            RecordKind::Job => "jobsData",
            RecordKind::Result => "resultsData",
            RecordKind::Exam => "examsData",
            RecordKind::AdmitCard => "admitCardsData",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            RecordKind::Job => "fas fa-briefcase",
            RecordKind::Result => "fas fa-trophy",
            RecordKind::Exam => "fas fa-calendar-alt",
            RecordKind::AdmitCard => "fas fa-id-card",
        }
    }

    /// Plural label used in run summaries.
    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Job => "Jobs",
            RecordKind::Result => "Results",
            RecordKind::Exam => "Exams",
            RecordKind::AdmitCard => "Admits",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Job => "job",
            RecordKind::Result => "result",
            RecordKind::Exam => "exam",
            RecordKind::AdmitCard => "admit_card",
        };
        f.write_str(name)
    }
}

/// Identity key shared by stored records and candidates: lowercased, trimmed title and link.
pub fn fingerprint(title: &str, link: &str) -> String {
    format!(
        "{}{}{}",
        title.trim().to_lowercase(),
        FINGERPRINT_SEPARATOR,
        link.trim().to_lowercase()
    )
}

/// A persisted record: an ordered mapping of field names to JSON-compatible values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn title(&self) -> &str {
        self.get_str("title").unwrap_or_default()
    }

    /// `applyLink` when present, else `link`.
    pub fn canonical_link(&self) -> &str {
        self.get_str("applyLink")
            .or_else(|| self.get_str("link"))
            .unwrap_or_default()
    }

    /// Numeric job id; hand-edited documents sometimes quote it or write `5.0`.
    pub fn id(&self) -> Option<u64> {
        match self.0.get("id")? {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral_id)),
            Value::String(s) => {
                let s = s.trim();
                s.parse().ok().or_else(|| s.parse().ok().and_then(integral_id))
            }
            _ => None,
        }
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self.title(), self.canonical_link())
    }
}

fn integral_id(value: f64) -> Option<u64> {
    let whole = value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64;
    whole.then_some(value as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Govt,
    Private,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Govt => "govt",
            JobType::Private => "private",
        }
    }
}

/// A classified job posting that has not been merged yet.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPosting {
    pub id: Option<u64>,
    pub title: String,
    pub organization: String,
    pub job_type: JobType,
    pub location: String,
    pub qualification: String,
    pub experience: String,
    pub salary: String,
    pub last_date: String,
    pub vacancies: String,
    pub age_limit: String,
    pub urgent: bool,
    pub apply_link: String,
    pub pdf_link: String,
    pub date: String,
    pub icon: String,
}

/// Result, exam and admit-card entries share this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub date: String,
    pub link: String,
    pub icon: String,
}

impl From<JobPosting> for Record {
    fn from(job: JobPosting) -> Self {
        let mut record = Record::new();
        if let Some(id) = job.id {
            record.insert("id", id);
        }
        record.insert("title", job.title);
        record.insert("organization", job.organization);
        record.insert("type", job.job_type.as_str());
        record.insert("location", job.location);
        record.insert("qualification", job.qualification);
        record.insert("experience", job.experience);
        record.insert("salary", job.salary);
        record.insert("lastDate", job.last_date);
        record.insert("vacancies", job.vacancies);
        record.insert("ageLimit", job.age_limit);
        record.insert("urgent", job.urgent);
        record.insert("applyLink", job.apply_link);
        record.insert("pdfLink", job.pdf_link);
        record.insert("date", job.date);
        record.insert("icon", job.icon);
        record
    }
}

impl From<Notice> for Record {
    fn from(notice: Notice) -> Self {
        let mut record = Record::new();
        record.insert("title", notice.title);
        record.insert("date", notice.date);
        record.insert("icon", notice.icon);
        record.insert("link", notice.link);
        record
    }
}

/// A classified, not-yet-merged record tagged with its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Job(JobPosting),
    Result(Notice),
    Exam(Notice),
    AdmitCard(Notice),
}

impl Candidate {
    pub fn kind(&self) -> RecordKind {
        match self {
            Candidate::Job(_) => RecordKind::Job,
            Candidate::Result(_) => RecordKind::Result,
            Candidate::Exam(_) => RecordKind::Exam,
            Candidate::AdmitCard(_) => RecordKind::AdmitCard,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Candidate::Job(job) => &job.title,
            Candidate::Result(n) | Candidate::Exam(n) | Candidate::AdmitCard(n) => &n.title,
        }
    }

    pub fn canonical_link(&self) -> &str {
        match self {
            Candidate::Job(job) => &job.apply_link,
            Candidate::Result(n) | Candidate::Exam(n) | Candidate::AdmitCard(n) => &n.link,
        }
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self.title(), self.canonical_link())
    }

    pub fn into_record(self) -> Record {
        match self {
            Candidate::Job(job) => job.into(),
            Candidate::Result(n) | Candidate::Exam(n) | Candidate::AdmitCard(n) => n.into(),
        }
    }
}

/// The four persisted sequences, each most-recent-first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Store {
    pub jobs: Vec<Record>,
    pub results: Vec<Record>,
    pub exams: Vec<Record>,
    pub admit_cards: Vec<Record>,
}

impl Store {
    pub fn sequence(&self, kind: RecordKind) -> &[Record] {
        match kind {
            RecordKind::Job => &self.jobs,
            RecordKind::Result => &self.results,
            RecordKind::Exam => &self.exams,
            RecordKind::AdmitCard => &self.admit_cards,
        }
    }

    pub fn sequence_mut(&mut self, kind: RecordKind) -> &mut Vec<Record> {
        match kind {
            RecordKind::Job => &mut self.jobs,
            RecordKind::Result => &mut self.results,
            RecordKind::Exam => &mut self.exams,
            RecordKind::AdmitCard => &mut self.admit_cards,
        }
    }

    pub fn is_empty(&self) -> bool {
        RecordKind::ALL
            .iter()
            .all(|kind| self.sequence(*kind).is_empty())
    }

    pub fn totals(&self) -> KindCounts {
        let mut counts = KindCounts::default();
        for kind in RecordKind::ALL {
            counts.set(kind, self.sequence(kind).len());
        }
        counts
    }

    pub fn max_job_id(&self) -> Option<u64> {
        self.jobs.iter().filter_map(Record::id).max()
    }

    /// Fingerprints across all four kinds.
    pub fn fingerprints(&self) -> HashSet<String> {
        RecordKind::ALL
            .iter()
            .flat_map(|kind| self.sequence(*kind))
            .map(Record::fingerprint)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindCounts {
    pub jobs: usize,
    pub results: usize,
    pub exams: usize,
    pub admit_cards: usize,
}

impl KindCounts {
    pub fn get(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Job => self.jobs,
            RecordKind::Result => self.results,
            RecordKind::Exam => self.exams,
            RecordKind::AdmitCard => self.admit_cards,
        }
    }

    pub fn set(&mut self, kind: RecordKind, value: usize) {
        match kind {
            RecordKind::Job => self.jobs = value,
            RecordKind::Result => self.results = value,
            RecordKind::Exam => self.exams = value,
            RecordKind::AdmitCard => self.admit_cards = value,
        }
    }

    pub fn increment(&mut self, kind: RecordKind) {
        self.set(kind, self.get(kind) + 1);
    }

    pub fn total(&self) -> usize {
        self.jobs + self.results + self.exams + self.admit_cards
    }
}
