use chrono::{Duration, NaiveDate};

use crate::models::VoterContactRecord;

const VOLUNTEERS: &[(&str, &str, &str)] = &[
    ("Avery", "Lee", "Team Tony"),
    ("Jules", "Moreno", "Local Party"),
    ("Kiara", "Patel", "Candidate"),
    ("Noah", "Brooks", "Team Tony"),
    ("Priya", "Shah", "Local Party"),
];

const TACTICS: &[&str] = &["Phone", "SMS", "Canvas"];

/// Deterministic contact history for `days` days ending on `end`, one row
/// per volunteer per day. Outcome columns always add up to the attempts.
pub fn synthetic_records(days: u32, end: NaiveDate) -> Vec<VoterContactRecord> {
    let mut records = Vec::new();

    for offset in 0..days {
        let date = end - Duration::days(i64::from(days - 1 - offset));
        for (index, (first, last, team)) in VOLUNTEERS.iter().enumerate() {
            let i = offset as i64;
            let v = index as i64;
            let attempts = 10 + (i * 7 + v * 3) % 25;
            let contacts = attempts * (30 + (i + v) % 20) / 100;
            let support = contacts / 2;
            let oppose = contacts / 4;
            let not_reached = attempts - contacts;
            let refusal = not_reached / 5;
            let bad_data = not_reached / 10;

            records.push(VoterContactRecord {
                first_name: first.to_string(),
                last_name: last.to_string(),
                team: team.to_string(),
                date: date.format("%Y-%m-%d").to_string(),
                tactic: TACTICS[(offset as usize + index) % TACTICS.len()].to_string(),
                attempts,
                contacts,
                not_home: not_reached - refusal - bad_data,
                refusal,
                bad_data,
                support,
                oppose,
                undecided: contacts - support - oppose,
                ..Default::default()
            });
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use std::collections::HashSet;

    #[test]
    fn outcomes_add_up() {
        let end = NaiveDate::from_ymd_opt(2024, 4, 30).unwrap();
        let records = synthetic_records(14, end);
        assert_eq!(records.len(), 14 * VOLUNTEERS.len());

        for record in &records {
            assert_eq!(record.support + record.oppose + record.undecided, record.contacts);
            assert_eq!(record.contacts + record.issues(), record.attempts);
        }

        let metrics = aggregate(&records);
        assert_eq!(metrics.by_date.len(), 14);
        assert_eq!(metrics.by_date.last().unwrap().date, "2024-04-30");
        assert_eq!(metrics.by_date[0].date, "2024-04-17");
    }

    #[test]
    fn rows_are_unique_per_identity() {
        let records = synthetic_records(30, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        let keys: HashSet<_> = records.iter().map(|r| r.identity_key()).collect();
        assert_eq!(keys.len(), records.len());
    }
}
