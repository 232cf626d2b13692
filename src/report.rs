use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::chart::TimelinePoint;
use crate::models::{TeamSummary, VoterContactRecord, VoterMetrics};

pub fn summarize_by_team(records: &[VoterContactRecord]) -> Vec<TeamSummary> {
    let mut map: HashMap<String, (i64, i64, i64)> = HashMap::new();

    for record in records {
        let entry = map.entry(record.team.clone()).or_insert((0, 0, 0));
        entry.0 += record.attempts;
        entry.1 += record.contacts;
        entry.2 += record.support;
    }

    let mut summaries: Vec<TeamSummary> = map
        .into_iter()
        .map(|(team, (attempts, contacts, support))| TeamSummary {
            team,
            attempts,
            contacts,
            support,
            contact_rate: if attempts == 0 {
                0.0
            } else {
                contacts as f64 / attempts as f64
            },
        })
        .collect();

    summaries.sort_by(|a, b| b.attempts.cmp(&a.attempts).then_with(|| a.team.cmp(&b.team)));
    summaries
}

fn share(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

pub fn build_report(
    scope: Option<&str>,
    generated_on: NaiveDate,
    metrics: &VoterMetrics,
    teams: &[TeamSummary],
    timeline: &[TimelinePoint],
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all users");

    let _ = writeln!(output, "# Voter Contact Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} ({} records)",
        scope_label, generated_on, metrics.record_count
    );
    let _ = writeln!(output);

    if !metrics.has_data() {
        let _ = writeln!(output, "No contact data recorded yet.");
        return output;
    }

    let attempts = metrics.total_attempts();
    let contacts = metrics.total_contacts();
    let issues = metrics.total_issues();

    let _ = writeln!(output, "## Attempts by Tactic");
    for (name, value) in [
        ("Phone", metrics.tactics.phone),
        ("SMS", metrics.tactics.sms),
        ("Canvas", metrics.tactics.canvas),
    ] {
        let _ = writeln!(output, "- {}: {} ({:.1}%)", name, value, share(value, attempts));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Contact Outcomes");
    for (name, value) in [
        ("Support", metrics.contacts.support),
        ("Oppose", metrics.contacts.oppose),
        ("Undecided", metrics.contacts.undecided),
    ] {
        let _ = writeln!(output, "- {}: {} ({:.1}%)", name, value, share(value, contacts));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Not Reached");
    for (name, value) in [
        ("Not Home", metrics.not_reached.not_home),
        ("Refusal", metrics.not_reached.refusal),
        ("Bad Data", metrics.not_reached.bad_data),
    ] {
        let _ = writeln!(output, "- {}: {} ({:.1}%)", name, value, share(value, issues));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Teams");
    if teams.is_empty() {
        let _ = writeln!(output, "No team data.");
    } else {
        for team in teams.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {} attempts, {} contacts ({:.0}% contact rate), {} support",
                team.team,
                team.attempts,
                team.contacts,
                team.contact_rate * 100.0,
                team.support
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Activity");
    if timeline.is_empty() {
        let _ = writeln!(output, "No dated activity.");
    } else {
        let _ = writeln!(output, "| Date | Attempts | Contacts | Not Reached | Total Attempts |");
        let _ = writeln!(output, "|------|----------|----------|-------------|----------------|");
        for point in &timeline[timeline.len().saturating_sub(14)..] {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} |",
                point.date, point.attempts, point.contacts, point.issues, point.cumulative_attempts
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::chart::timeline;
    use crate::seed::synthetic_records;

    #[test]
    fn teams_sort_by_attempts() {
        let records = vec![
            VoterContactRecord {
                team: "Candidate".into(),
                attempts: 4,
                contacts: 2,
                ..Default::default()
            },
            VoterContactRecord {
                team: "Team Tony".into(),
                attempts: 10,
                contacts: 5,
                support: 3,
                ..Default::default()
            },
            VoterContactRecord {
                team: "Candidate".into(),
                attempts: 4,
                ..Default::default()
            },
        ];

        let teams = summarize_by_team(&records);
        assert_eq!(teams[0].team, "Team Tony");
        assert_eq!(teams[1].attempts, 8);
        assert!((teams[1].contact_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn report_lists_sections() {
        let day = NaiveDate::from_ymd_opt(2024, 4, 30).unwrap();
        let records = synthetic_records(3, day);
        let metrics = aggregate(&records);
        let report = build_report(
            Some("u-1"),
            day,
            &metrics,
            &summarize_by_team(&records),
            &timeline(&metrics, day),
        );

        assert!(report.starts_with("# Voter Contact Report"));
        assert!(report.contains("## Contact Outcomes"));
        assert!(report.contains("| 2024-04-30 |"));
        assert!(report.contains("- Team Tony:"));
    }

    #[test]
    fn empty_report_says_so() {
        let day = NaiveDate::from_ymd_opt(2024, 4, 30).unwrap();
        let report = build_report(None, day, &VoterMetrics::default(), &[], &[]);
        assert!(report.contains("Generated for all users"));
        assert!(report.contains("No contact data recorded yet."));
    }
}
