use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DateTotals, VoterMetrics};
use crate::palette::{assign_colors, color_for_name, CategoryType, Theme};
use crate::transformer::parse_date;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartDataPoint {
    pub name: String,
    pub value: i64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieCharts {
    pub tactics: Vec<ChartDataPoint>,
    pub contacts: Vec<ChartDataPoint>,
    pub not_reached: Vec<ChartDataPoint>,
}

/// One day on the line chart, carrying both daily and running totals so the
/// view can switch modes without recomputing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub date: String,
    pub attempts: i64,
    pub contacts: i64,
    pub issues: i64,
    pub cumulative_attempts: i64,
    pub cumulative_contacts: i64,
    pub cumulative_issues: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineMode {
    Daily,
    Cumulative,
}

impl TimelinePoint {
    /// (attempts, contacts, issues) for the chosen mode.
    pub fn values(&self, mode: TimelineMode) -> (i64, i64, i64) {
        match mode {
            TimelineMode::Daily => (self.attempts, self.contacts, self.issues),
            TimelineMode::Cumulative => (
                self.cumulative_attempts,
                self.cumulative_contacts,
                self.cumulative_issues,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesStyle {
    pub key: &'static str,
    pub label: &'static str,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBundle {
    pub pies: PieCharts,
    pub timeline: Vec<TimelinePoint>,
    pub series: Vec<SeriesStyle>,
    pub has_data: bool,
}

fn pie(entries: &[(&str, i64)], category: CategoryType, theme: Theme) -> Vec<ChartDataPoint> {
    let names: Vec<&str> = entries.iter().map(|(name, _)| *name).collect();
    let colors = assign_colors(&names, category, theme);

    entries
        .iter()
        .zip(colors)
        .map(|((name, value), color)| ChartDataPoint {
            name: name.to_string(),
            value: (*value).max(0),
            color,
        })
        .collect()
}

pub fn pie_charts(metrics: &VoterMetrics, theme: Theme) -> PieCharts {
    PieCharts {
        tactics: pie(
            &[
                ("SMS", metrics.tactics.sms),
                ("Phone", metrics.tactics.phone),
                ("Canvas", metrics.tactics.canvas),
            ],
            CategoryType::Tactic,
            theme,
        ),
        contacts: pie(
            &[
                ("Support", metrics.contacts.support),
                ("Oppose", metrics.contacts.oppose),
                ("Undecided", metrics.contacts.undecided),
            ],
            CategoryType::Contact,
            theme,
        ),
        not_reached: pie(
            &[
                ("Not Home", metrics.not_reached.not_home),
                ("Refusal", metrics.not_reached.refusal),
                ("Bad Data", metrics.not_reached.bad_data),
            ],
            CategoryType::NotReached,
            theme,
        ),
    }
}

/// Chronological per-day totals. Entries whose date does not parse are
/// dropped and entries that land on the same day are merged.
///
/// When nothing is date-resolvable but the metrics are non-zero, a single
/// point dated `today` carries the sum of every entry, so its columns mean
/// the same as those of a dated point.
pub fn daily_series(metrics: &VoterMetrics, today: NaiveDate) -> Vec<DateTotals> {
    let mut days: BTreeMap<NaiveDate, DateTotals> = BTreeMap::new();

    for entry in &metrics.by_date {
        let Some(day) = parse_date(&entry.date) else {
            tracing::debug!(date = %entry.date, "skipping unparsable timeline date");
            continue;
        };
        let point = days.entry(day).or_insert_with(|| DateTotals {
            date: day.format("%Y-%m-%d").to_string(),
            attempts: 0,
            contacts: 0,
            issues: 0,
        });
        point.attempts += entry.attempts.max(0);
        point.contacts += entry.contacts.max(0);
        point.issues += entry.issues.max(0);
    }

    if days.is_empty() && metrics.has_data() {
        let mut total = DateTotals {
            date: today.format("%Y-%m-%d").to_string(),
            attempts: 0,
            contacts: 0,
            issues: 0,
        };
        for entry in &metrics.by_date {
            total.attempts += entry.attempts.max(0);
            total.contacts += entry.contacts.max(0);
            total.issues += entry.issues.max(0);
        }
        return vec![total];
    }

    days.into_values().collect()
}

pub fn timeline(metrics: &VoterMetrics, today: NaiveDate) -> Vec<TimelinePoint> {
    let (mut attempts, mut contacts, mut issues) = (0, 0, 0);

    daily_series(metrics, today)
        .into_iter()
        .map(|day| {
            attempts += day.attempts;
            contacts += day.contacts;
            issues += day.issues;
            TimelinePoint {
                date: day.date,
                attempts: day.attempts,
                contacts: day.contacts,
                issues: day.issues,
                cumulative_attempts: attempts,
                cumulative_contacts: contacts,
                cumulative_issues: issues,
            }
        })
        .collect()
}

pub fn series_styles(theme: Theme) -> Vec<SeriesStyle> {
    [
        ("attempts", "Attempts"),
        ("contacts", "Contacts"),
        ("issues", "Not Reached"),
    ]
    .into_iter()
    .map(|(key, label)| SeriesStyle {
        key,
        label,
        color: color_for_name(key, CategoryType::Tactic, theme),
    })
    .collect()
}

pub fn chart_bundle(metrics: &VoterMetrics, theme: Theme, today: NaiveDate) -> ChartBundle {
    ChartBundle {
        pies: pie_charts(metrics, theme),
        timeline: timeline(metrics, today),
        series: series_styles(theme),
        has_data: metrics.has_data(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactTotals, NotReachedTotals, TacticTotals};
    use std::collections::HashSet;

    fn day(date: &str, attempts: i64) -> DateTotals {
        DateTotals {
            date: date.to_string(),
            attempts,
            contacts: attempts / 2,
            issues: 1,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn cumulative_series_accumulates_in_date_order() {
        let metrics = VoterMetrics {
            by_date: vec![day("2024-04-03", 2), day("2024-04-01", 3), day("2024-04-02", 5)],
            ..Default::default()
        };

        let points = timeline(&metrics, today());
        let dates: Vec<&str> = points.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-04-01", "2024-04-02", "2024-04-03"]);

        let daily: Vec<i64> = points.iter().map(|p| p.values(TimelineMode::Daily).0).collect();
        let running: Vec<i64> = points
            .iter()
            .map(|p| p.values(TimelineMode::Cumulative).0)
            .collect();
        assert_eq!(daily, vec![3, 5, 2]);
        assert_eq!(running, vec![3, 8, 10]);
        assert_eq!(points[2].cumulative_issues, 3);
    }

    #[test]
    fn unparsable_dates_are_dropped_and_equal_days_merge() {
        let metrics = VoterMetrics {
            by_date: vec![day("someday", 9), day("2024-04-01", 3), day("4/1/2024", 4)],
            tactics: TacticTotals {
                phone: 16,
                ..Default::default()
            },
            ..Default::default()
        };

        let series = daily_series(&metrics, today());
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].date, "2024-04-01");
        assert_eq!(series[0].attempts, 7);
    }

    #[test]
    fn undated_totals_fall_back_to_a_single_point() {
        let metrics = VoterMetrics {
            tactics: TacticTotals {
                sms: 4,
                phone: 6,
                canvas: 0,
            },
            contacts: ContactTotals {
                support: 2,
                oppose: 1,
                undecided: 0,
            },
            not_reached: NotReachedTotals {
                not_home: 3,
                ..Default::default()
            },
            by_date: vec![day("n/a", 10), day("", 4)],
            record_count: 2,
        };

        // contacts come from the contacts column (5 + 2), not the outcome split
        let series = daily_series(&metrics, today());
        assert_eq!(
            series,
            vec![DateTotals {
                date: "2024-05-01".to_string(),
                attempts: 14,
                contacts: 7,
                issues: 2,
            }]
        );
    }

    #[test]
    fn empty_metrics_give_an_empty_timeline() {
        assert!(timeline(&VoterMetrics::default(), today()).is_empty());
    }

    #[test]
    fn pies_have_distinct_colors_per_chart() {
        let metrics = VoterMetrics {
            contacts: ContactTotals {
                support: 5,
                oppose: 2,
                undecided: 1,
            },
            ..Default::default()
        };
        let pies = pie_charts(&metrics, Theme::Light);

        assert_eq!(pies.contacts[0].name, "Support");
        assert_eq!(pies.contacts[0].value, 5);
        for chart in [&pies.tactics, &pies.contacts, &pies.not_reached] {
            let colors: HashSet<&String> = chart.iter().map(|p| &p.color).collect();
            assert_eq!(colors.len(), 3);
        }
        assert_eq!(pies, pie_charts(&metrics, Theme::Light));
    }
}
