//! Keyword classification of feed entries into candidate records.
//!
//! Category selection is an ordered rule list with an unconditional default: the first
//! rule whose keywords appear in the lowercased title wins, and anything unmatched is a
//! job posting. Job fields are heuristic and always fall back to placeholders.

use jobfeed_core::{Candidate, JobPosting, JobType, Notice, RecordKind};
use regex::Regex;

use crate::{DomainPolicy, FeedEntry, SourceDescriptor};

pub const UNSPECIFIED_ORGANIZATION: &str = "Not Specified";
pub const VACANCIES_PLACEHOLDER: &str = "Check Notification";
pub const SALARY_PLACEHOLDER: &str = "Not Disclosed";
pub const EXPERIENCE_PLACEHOLDER: &str = "Not Specified";
pub const QUALIFICATION_PLACEHOLDER: &str = "See Notification";
pub const LAST_DATE_PLACEHOLDER: &str = "Check Link";
pub const DEFAULT_LOCATION: &str = "All India";
pub const AGE_LIMIT_PLACEHOLDER: &str = "As per rules";

#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub kind: RecordKind,
    pub keywords: &'static [&'static str],
}

impl CategoryRule {
    fn matches(&self, lower_title: &str) -> bool {
        self.keywords.iter().any(|kw| lower_title.contains(kw))
    }
}

/// Evaluated in order; `RecordKind::Job` is the fallback.
pub const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        kind: RecordKind::AdmitCard,
        keywords: &["admit card", "call letter", "hall ticket"],
    },
    CategoryRule {
        kind: RecordKind::Result,
        keywords: &["result", "score", "merit list", "cut off"],
    },
    CategoryRule {
        kind: RecordKind::Exam,
        keywords: &["exam date", "schedule", "calendar", "time table"],
    },
];

pub const KNOWN_ORGANIZATIONS: &[&str] = &[
    "UPSC", "SSC", "IBPS", "SBI", "RBI", "LIC", "NABARD", "SEBI", "RRB", "DRDO", "ISRO",
    "BARC", "BHEL", "NTPC", "ONGC", "IOCL", "GAIL", "AIIMS", "ESIC", "EPFO", "KVS", "NVS",
    "CRPF", "BSF", "CISF", "ITBP", "Indian Army", "Indian Navy", "Indian Air Force",
    "Coast Guard", "India Post", "High Court", "Railway", "TCS", "Infosys", "Wipro",
    "Accenture", "Google", "Microsoft", "Amazon",
];

/// Title keywords and link domains that mark a government posting.
pub const GOVT_MARKERS: &[&str] = &[
    ".gov.in", ".nic.in", ".res.in", ".ac.in", ".edu.in", "ibps.in", "rbi.org.in",
    "sbi.co.in", "govt", "government", "sarkari", "upsc", "ssc", "rrb", "ibps", "psc",
    "railway", "police", "army", "navy", "air force", "ministry", "public sector",
];

pub const URGENT_KEYWORDS: &[&str] = &["urgent", "fast", "hurry", "closing soon", "last day"];

const CITIES: &[&str] = &[
    "Mumbai", "Delhi", "Bangalore", "Bengaluru", "Hyderabad", "Chennai", "Kolkata", "Pune",
    "Ahmedabad", "Jaipur", "Lucknow", "Patna", "Bhopal", "Indore", "Nagpur", "Noida",
    "Gurgaon", "Gurugram", "Chandigarh",
];

const STATES: &[&str] = &[
    "Andhra Pradesh", "Arunachal Pradesh", "Assam", "Bihar", "Chhattisgarh", "Goa", "Gujarat",
    "Haryana", "Himachal Pradesh", "Jharkhand", "Karnataka", "Kerala", "Madhya Pradesh",
    "Maharashtra", "Manipur", "Meghalaya", "Mizoram", "Nagaland", "Odisha", "Punjab",
    "Rajasthan", "Sikkim", "Tamil Nadu", "Telangana", "Tripura", "Uttar Pradesh",
    "Uttarakhand", "West Bengal", "Jammu and Kashmir",
];

const QUALIFICATIONS: &[(&[&str], &str)] = &[
    (&["10th"], "10th Pass"),
    (&["12th"], "12th Pass"),
    (&["iti"], "ITI"),
    (&["diploma"], "Diploma"),
    (&["graduate", "graduation"], "Graduate"),
    (&["post graduate", "postgraduate"], "Post Graduate"),
    (&["b.tech", "btech"], "B.Tech"),
    (&["b.e"], "B.E"),
    (&["mba"], "MBA"),
    (&["mca"], "MCA"),
    (&["ph.d", "phd"], "Ph.D"),
    (&["mbbs"], "MBBS"),
];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// First matching category rule, else `Job`.
pub fn categorize(title: &str) -> RecordKind {
    let lower = title.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|rule| rule.matches(&lower))
        .map_or(RecordKind::Job, |rule| rule.kind)
}

#[derive(Debug, Clone)]
struct FieldPatterns {
    vacancies: Regex,
    salary: Regex,
    last_date: Regex,
}

impl FieldPatterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            vacancies: Regex::new(r"(?i)(\d+(?:,\d+)*)\s*\+?\s*(?:vacancies|vacancy|posts?|jobs?)\b")?,
            salary: Regex::new(r"(?i)(?:₹|\brs\.?|\binr)\s*(\d+(?:,\d+)*(?:\.\d+)?)")?,
            last_date: Regex::new(
                r"(?i)last\s+date\s*[:\-]?\s*(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]{3})[a-z]*\.?,?\s+(\d{4})",
            )?,
        })
    }
}

/// Turns feed entries into candidates, dropping entries the domain policy rejects.
#[derive(Debug, Clone)]
pub struct Classifier {
    policy: DomainPolicy,
    patterns: FieldPatterns,
}

impl Classifier {
    pub fn new(policy: DomainPolicy) -> Result<Self, regex::Error> {
        Ok(Self {
            policy,
            patterns: FieldPatterns::compile()?,
        })
    }

    /// `None` only when the entry's link fails the trusted-domain policy.
    pub fn classify(&self, entry: &FeedEntry, source: &SourceDescriptor) -> Option<Candidate> {
        if !self.policy.allows(&entry.link) {
            return None;
        }
        Some(self.classify_entry(entry, source))
    }

    pub fn classify_entry(&self, entry: &FeedEntry, source: &SourceDescriptor) -> Candidate {
        let kind = categorize(&entry.title);
        let notice = || Notice {
            title: entry.title.clone(),
            date: entry.published.clone(),
            link: entry.link.clone(),
            icon: kind.icon().to_string(),
        };
        match kind {
            RecordKind::Job => Candidate::Job(self.derive_job(entry, source)),
            RecordKind::Result => Candidate::Result(notice()),
            RecordKind::Exam => Candidate::Exam(notice()),
            RecordKind::AdmitCard => Candidate::AdmitCard(notice()),
        }
    }

    fn derive_job(&self, entry: &FeedEntry, source: &SourceDescriptor) -> JobPosting {
        let title = entry.title.as_str();
        let lower = title.to_lowercase();

        let organization = source
            .organization
            .clone()
            .or_else(|| known_organization(&lower).map(str::to_string))
            .unwrap_or_else(|| UNSPECIFIED_ORGANIZATION.to_string());

        let job_type = source
            .type_override
            .unwrap_or_else(|| detect_job_type(&lower, &entry.link.to_lowercase()));

        JobPosting {
            id: None,
            title: entry.title.clone(),
            organization,
            job_type,
            location: detect_location(&lower),
            qualification: detect_qualification(&lower),
            experience: if lower.contains("fresher") {
                "Fresher".to_string()
            } else {
                EXPERIENCE_PLACEHOLDER.to_string()
            },
            salary: self.extract_salary(title),
            last_date: self.extract_last_date(title),
            vacancies: self.extract_vacancies(title),
            age_limit: AGE_LIMIT_PLACEHOLDER.to_string(),
            urgent: URGENT_KEYWORDS.iter().any(|kw| lower.contains(kw)),
            apply_link: entry.link.clone(),
            pdf_link: pdf_link(&entry.link),
            date: entry.published.clone(),
            icon: RecordKind::Job.icon().to_string(),
        }
    }

    fn extract_vacancies(&self, title: &str) -> String {
        self.patterns
            .vacancies
            .captures(title)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().replace(',', ""))
            .filter(|digits| !digits.is_empty())
            .unwrap_or_else(|| VACANCIES_PLACEHOLDER.to_string())
    }

    fn extract_salary(&self, title: &str) -> String {
        self.patterns
            .salary
            .captures(title)
            .and_then(|caps| caps.get(1))
            .map(|m| format!("₹{}", m.as_str()))
            .unwrap_or_else(|| SALARY_PLACEHOLDER.to_string())
    }

    fn extract_last_date(&self, title: &str) -> String {
        let Some(caps) = self.patterns.last_date.captures(title) else {
            return LAST_DATE_PLACEHOLDER.to_string();
        };
        let day: u32 = caps[1].parse().unwrap_or(0);
        let month = MONTHS
            .iter()
            .find(|m| m.eq_ignore_ascii_case(&caps[2]));
        match month {
            Some(month) if (1..=31).contains(&day) => format!("{day:02} {month} {}", &caps[3]),
            _ => LAST_DATE_PLACEHOLDER.to_string(),
        }
    }
}

fn known_organization(lower_title: &str) -> Option<&'static str> {
    KNOWN_ORGANIZATIONS
        .iter()
        .copied()
        .find(|org| contains_phrase(lower_title, &org.to_lowercase()))
}

fn detect_job_type(lower_title: &str, lower_link: &str) -> JobType {
    if GOVT_MARKERS
        .iter()
        .any(|marker| lower_title.contains(marker) || lower_link.contains(marker))
    {
        JobType::Govt
    } else {
        JobType::Private
    }
}

fn detect_location(lower_title: &str) -> String {
    let found = CITIES
        .iter()
        .chain(STATES)
        .find(|place| contains_phrase(lower_title, &place.to_lowercase()));
    match found.copied() {
        Some("Bengaluru") => "Bangalore".to_string(),
        Some("Gurugram") => "Gurgaon".to_string(),
        Some(place) => place.to_string(),
        None => DEFAULT_LOCATION.to_string(),
    }
}

fn detect_qualification(lower_title: &str) -> String {
    let found: Vec<&str> = QUALIFICATIONS
        .iter()
        .filter(|(aliases, _)| aliases.iter().any(|alias| contains_phrase(lower_title, alias)))
        .map(|(_, label)| *label)
        .collect();
    if found.is_empty() {
        QUALIFICATION_PLACEHOLDER.to_string()
    } else {
        found.join(", ")
    }
}

fn pdf_link(link: &str) -> String {
    let path = link.split(['?', '#']).next().unwrap_or_default();
    if path.to_ascii_lowercase().ends_with(".pdf") {
        link.to_string()
    } else {
        "#".to_string()
    }
}

/// Substring match that does not start or end inside a word.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(start, matched)| {
        let end = start + matched.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, link: &str) -> FeedEntry {
        FeedEntry {
            title: title.to_string(),
            link: link.to_string(),
            published: "17 Oct 2026".to_string(),
        }
    }

    fn source() -> SourceDescriptor {
        SourceDescriptor {
            url: "https://feeds.example.org/rss".to_string(),
            name: "example".to_string(),
            type_override: None,
            organization: None,
        }
    }

    fn classifier() -> Classifier {
        Classifier::new(DomainPolicy::default()).unwrap()
    }

    fn job(candidate: Candidate) -> JobPosting {
        match candidate {
            Candidate::Job(job) => job,
            other => panic!("expected job, got {:?}", other.kind()),
        }
    }

    #[test]
    fn admit_card_rule_wins_over_result_rule() {
        assert_eq!(categorize("Result of Admit Card Issue Notice"), RecordKind::AdmitCard);
    }

    #[test]
    fn rules_cover_each_category_and_default_to_job() {
        assert_eq!(categorize("RRB Hall Ticket 2024 Released"), RecordKind::AdmitCard);
        assert_eq!(categorize("CUET Merit List Published"), RecordKind::Result);
        assert_eq!(categorize("SSC Exam Date 2026 Announced"), RecordKind::Exam);
        assert_eq!(categorize("NDA Time Table Out"), RecordKind::Exam);
        assert_eq!(categorize("Something Completely Different"), RecordKind::Job);
    }

    #[test]
    fn hall_ticket_becomes_admit_card_with_id_card_icon() {
        let candidate = classifier()
            .classify(&entry("RRB Hall Ticket 2024 Released", "https://rrb.gov.in/ht"), &source())
            .unwrap();
        match candidate {
            Candidate::AdmitCard(notice) => {
                assert_eq!(notice.icon, "fas fa-id-card");
                assert_eq!(notice.link, "https://rrb.gov.in/ht");
                assert_eq!(notice.date, "17 Oct 2026");
            }
            other => panic!("expected admit card, got {:?}", other.kind()),
        }
    }

    #[test]
    fn job_fields_are_derived_from_title() {
        let posting = job(classifier().classify_entry(
            &entry(
                "Urgent: SBI Clerk Recruitment 2026 - 9,500 Vacancies, Salary Rs. 26,730, Freshers in Mumbai, Graduate, Last Date 5th Mar 2026",
                "https://sbi.co.in/careers/notice.pdf",
            ),
            &source(),
        ));
        assert_eq!(posting.organization, "SBI");
        assert_eq!(posting.job_type, JobType::Govt);
        assert_eq!(posting.vacancies, "9500");
        assert_eq!(posting.salary, "₹26,730");
        assert!(posting.urgent);
        assert_eq!(posting.experience, "Fresher");
        assert_eq!(posting.location, "Mumbai");
        assert_eq!(posting.qualification, "Graduate");
        assert_eq!(posting.last_date, "05 Mar 2026");
        assert_eq!(posting.pdf_link, "https://sbi.co.in/careers/notice.pdf");
        assert_eq!(posting.icon, "fas fa-briefcase");
        assert_eq!(posting.id, None);
    }

    #[test]
    fn unmatched_fields_fall_back_to_placeholders() {
        let posting = job(classifier().classify_entry(&entry("Hiring Now", "#"), &source()));
        assert_eq!(posting.organization, UNSPECIFIED_ORGANIZATION);
        assert_eq!(posting.job_type, JobType::Private);
        assert_eq!(posting.vacancies, VACANCIES_PLACEHOLDER);
        assert_eq!(posting.salary, SALARY_PLACEHOLDER);
        assert_eq!(posting.experience, EXPERIENCE_PLACEHOLDER);
        assert_eq!(posting.location, DEFAULT_LOCATION);
        assert_eq!(posting.qualification, QUALIFICATION_PLACEHOLDER);
        assert_eq!(posting.last_date, LAST_DATE_PLACEHOLDER);
        assert_eq!(posting.pdf_link, "#");
        assert!(!posting.urgent);
    }

    #[test]
    fn bare_rs_inside_words_is_not_a_salary() {
        let posting = job(classifier().classify_entry(&entry("Officers 500 Posts", "#"), &source()));
        assert_eq!(posting.salary, SALARY_PLACEHOLDER);
        assert_eq!(posting.vacancies, "500");
    }

    #[test]
    fn source_overrides_take_precedence() {
        let mut src = source();
        src.type_override = Some(JobType::Private);
        src.organization = Some("Acme Careers".to_string());
        let posting = job(classifier().classify_entry(
            &entry("UPSC Civil Services Notification", "https://upsc.gov.in/n"),
            &src,
        ));
        assert_eq!(posting.job_type, JobType::Private);
        assert_eq!(posting.organization, "Acme Careers");
    }

    #[test]
    fn organization_acronyms_match_whole_words_only() {
        assert_eq!(known_organization("bihar police constable recruitment 2026"), None);
        assert_eq!(known_organization("online application for public health officers"), None);
        assert_eq!(known_organization("lic aao recruitment 2026"), Some("LIC"));

        let posting = job(classifier().classify_entry(
            &entry("Bihar Police Constable Recruitment 2026", "#"),
            &source(),
        ));
        assert_eq!(posting.organization, UNSPECIFIED_ORGANIZATION);
    }

    #[test]
    fn location_aliases_and_word_boundaries() {
        assert_eq!(detect_location("infosys hiring in bengaluru"), "Bangalore");
        assert_eq!(detect_location("goals for 2026"), DEFAULT_LOCATION);
        assert_eq!(detect_location("kerala psc notification"), "Kerala");
    }

    #[test]
    fn untrusted_links_are_discarded_before_classification() {
        let classifier = Classifier::new(DomainPolicy::new([".gov.in", "ibps.in"])).unwrap();
        assert!(classifier
            .classify(&entry("SSC CGL 2026", "https://ssc.gov.in/x"), &source())
            .is_some());
        assert!(classifier
            .classify(&entry("SSC CGL 2026", "https://www.sarkariresult.com/x"), &source())
            .is_none());
        assert!(classifier.classify(&entry("SSC CGL 2026", "#"), &source()).is_none());
    }
}
