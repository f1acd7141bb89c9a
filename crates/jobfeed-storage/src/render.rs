//! Rendering of the store back into its script-fragment form.

use chrono::{DateTime, Utc};
use jobfeed_core::{Record, RecordKind, Store};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Name of the derived assignment that copies the job sequence.
pub const COMBINED_JOBS_NAME: &str = "allJobsData";

/// Render the whole document. Only the first line depends on `updated_at`.
pub fn render_document(store: &Store, updated_at: DateTime<Utc>) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    out.push_str(&header_line(updated_at));
    out.push('\n');
    out.push_str("// Generated by jobfeed. Record fields are preserved across runs; comments are not.\n\n");

    for kind in RecordKind::ALL {
        out.push_str(&format!(
            "const {} = {};\n\n",
            kind.variable_name(),
            pretty_array(store.sequence(kind))?
        ));
    }

    out.push_str(&format!(
        "const {COMBINED_JOBS_NAME} = [...{}];\n",
        RecordKind::Job.variable_name()
    ));
    Ok(out)
}

pub fn header_line(updated_at: DateTime<Utc>) -> String {
    format!(
        "// Official Data Hub - Updated {}",
        updated_at.format("%Y-%m-%d %H:%M UTC")
    )
}

fn pretty_array(records: &[Record]) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    records.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
