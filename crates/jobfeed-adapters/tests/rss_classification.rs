use chrono::{TimeZone, Utc};
use jobfeed_adapters::{parse_feed, Classifier, DomainPolicy, SourceDescriptor};
use jobfeed_core::{Candidate, JobType, RecordKind};

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Sarkari Updates</title>
    <link>https://updates.example.org</link>
    <description>latest</description>
    <item>
      <title>SSC CGL 2024 Recruitment for 7,500 Posts in Delhi, Graduate Apply Online</title>
      <link>https://ssc.gov.in/cgl-2024</link>
      <pubDate>Mon, 01 Jan 2024 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>UPSC Civil Services Result 2024 Declared</title>
      <link>https://upsc.gov.in/results/cse.pdf</link>
      <pubDate>Tue, 02 Jan 2024 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>RRB NTPC Exam Date 2024 Out</title>
      <link>https://rrb.gov.in/ntpc-schedule</link>
      <pubDate>Wed, 03 Jan 2024 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>IBPS Clerk Admit Card 2024</title>
      <link>https://ibps.in/clerk-call-letter</link>
      <pubDate>Thu, 04 Jan 2024 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Work From Home Result Checker</title>
      <link>https://spam.example.com/wfh</link>
    </item>
  </channel>
</rss>"#;

#[test]
fn feed_entries_become_typed_candidates() {
    let fetched_at = Utc.with_ymd_and_hms(2026, 10, 17, 6, 0, 0).single().unwrap();
    let entries = parse_feed("https://updates.example.org/rss", FEED.as_bytes(), fetched_at).unwrap();
    assert_eq!(entries.len(), 5);

    let classifier = Classifier::new(DomainPolicy::new(["gov.in", "ibps.in"])).unwrap();
    let source = SourceDescriptor::new("https://updates.example.org/rss", "Sarkari Updates");
    let candidates: Vec<Candidate> = entries
        .iter()
        .filter_map(|entry| classifier.classify(entry, &source))
        .collect();

    let kinds: Vec<RecordKind> = candidates.iter().map(Candidate::kind).collect();
    assert_eq!(
        kinds,
        vec![
            RecordKind::Job,
            RecordKind::Result,
            RecordKind::Exam,
            RecordKind::AdmitCard
        ]
    );

    let Candidate::Job(job) = &candidates[0] else {
        panic!("first entry should be a job");
    };
    assert_eq!(job.organization, "SSC");
    assert_eq!(job.job_type, JobType::Govt);
    assert_eq!(job.vacancies, "7500");
    assert_eq!(job.location, "Delhi");
    assert_eq!(job.qualification, "Graduate");
    assert_eq!(job.date, "01 Jan 2024");
    assert_eq!(job.id, None);

    let Candidate::Result(result) = &candidates[1] else {
        panic!("second entry should be a result");
    };
    assert_eq!(result.icon, RecordKind::Result.icon());
    assert_eq!(result.link, "https://upsc.gov.in/results/cse.pdf");

    let record = candidates[3].clone().into_record();
    let keys: Vec<&str> = record.as_map().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["title", "date", "icon", "link"]);
}
