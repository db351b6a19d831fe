//! Renders coordinator events as the textual lines §6 of the external
//! interface describes.

use repcrec_engine::{AbortReason, Event};

/// Render one event as zero or more output lines.
///
/// `dump` produces one line per site; every other event produces exactly
/// one line, so a driver can just print whatever this returns in order.
pub fn render(event: &Event) -> Vec<String> {
    match event {
        Event::Began { tid, kind } => {
            let kind = match kind {
                repcrec_engine::TransactionKind::ReadWrite => "RW",
                repcrec_engine::TransactionKind::ReadOnly => "RO",
            };
            vec![format!("{tid} began ({kind})")]
        }
        Event::Read { tid, vid, value } => vec![format!("{tid} reads {vid} = {value}")],
        Event::Wrote { tid, vid, value } => vec![format!("{tid} writes {vid} = {value}")],
        Event::Committed { tid } => vec![format!("{tid} commits")],
        Event::Aborted { tid, reason } => {
            let cause = match reason {
                AbortReason::Deadlock => "deadlock",
                AbortReason::SiteFailure => "site failure",
            };
            vec![format!("{tid} aborts ({cause})")]
        }
        Event::SiteFailed { site } => vec![format!("site {site} fails")],
        Event::SiteRecovered { site } => vec![format!("site {site} recovers")],
        Event::Dumped(reports) => reports
            .iter()
            .map(|report| {
                let status = if report.up { "running" } else { "failed" };
                let vars: String = report
                    .variables
                    .iter()
                    .map(|(vid, value)| format!("{vid} : {value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("site {} - {status} {vars}", report.site)
            })
            .collect(),
        Event::Rejected(err) => vec![format!("(ignored) {err}")],
    }
}
