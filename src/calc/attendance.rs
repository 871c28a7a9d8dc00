use crate::model::{AttendanceRecord, AttendanceStatus};
use chrono::{Datelike, Month, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Selects records by student, class and inclusive date range. Unset fields
/// match everything.
#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub student_id: Option<String>,
    pub class_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl AttendanceFilter {
    pub fn for_student(student_id: impl Into<String>) -> Self {
        Self {
            student_id: Some(student_id.into()),
            ..Self::default()
        }
    }

    pub fn for_class(class_id: impl Into<String>) -> Self {
        Self {
            class_id: Some(class_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, r: &AttendanceRecord) -> bool {
        self.student_id.as_deref().map_or(true, |s| r.student_id == s)
            && self.class_id.as_deref().map_or(true, |c| r.class_id == c)
            && self.from.map_or(true, |d| r.date >= d)
            && self.to.map_or(true, |d| r.date <= d)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceCounts {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub excused: u32,
    pub total: u32,
}

impl AttendanceCounts {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
        self.total += 1;
    }

    pub fn rates(&self) -> AttendanceRates {
        AttendanceRates {
            present: rate(self.present, self.total),
            absent: rate(self.absent, self.total),
            late: rate(self.late, self.total),
            excused: rate(self.excused, self.total),
            total: self.total,
        }
    }
}

/// Whole-number percentages per status. A zero `total` marks "no data".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceRates {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub excused: u32,
    pub total: u32,
}

fn rate(count: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * f64::from(count) / f64::from(total)).round() as u32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub counts: AttendanceCounts,
    pub rates: AttendanceRates,
}

impl AttendanceSummary {
    fn from_counts(counts: AttendanceCounts) -> Self {
        Self {
            counts,
            rates: counts.rates(),
        }
    }
}

pub fn count_records<'a, I>(records: I, filter: &AttendanceFilter) -> AttendanceCounts
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut counts = AttendanceCounts::default();
    for r in records.into_iter().filter(|r| filter.matches(r)) {
        counts.add(r.status);
    }
    counts
}

/// Rates over the pooled raw counts of every matching record.
pub fn summarize(records: &[AttendanceRecord], filter: &AttendanceFilter) -> AttendanceSummary {
    AttendanceSummary::from_counts(count_records(records, filter))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAttendance {
    pub class_id: String,
    #[serde(flatten)]
    pub summary: AttendanceSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceBreakdown {
    pub overall: AttendanceSummary,
    pub per_class: Vec<ClassAttendance>,
}

/// Overall and per-class summaries from one pass. `class_ids` forces an
/// entry (possibly empty) for each listed class; other classes appear only
/// when they have records.
pub fn summarize_by_class(
    records: &[AttendanceRecord],
    filter: &AttendanceFilter,
    class_ids: &[String],
) -> AttendanceBreakdown {
    let mut overall = AttendanceCounts::default();
    let mut per_class: BTreeMap<&str, AttendanceCounts> = class_ids
        .iter()
        .map(|c| (c.as_str(), AttendanceCounts::default()))
        .collect();

    for r in records.iter().filter(|r| filter.matches(r)) {
        overall.add(r.status);
        per_class.entry(r.class_id.as_str()).or_default().add(r.status);
    }

    AttendanceBreakdown {
        overall: AttendanceSummary::from_counts(overall),
        per_class: per_class
            .into_iter()
            .map(|(class_id, counts)| ClassAttendance {
                class_id: class_id.to_string(),
                summary: AttendanceSummary::from_counts(counts),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAttendance {
    pub year: i32,
    pub month: u32,
    pub label: String,
    #[serde(flatten)]
    pub counts: AttendanceCounts,
}

/// Calendar-month buckets in chronological order. Months without records
/// are not emitted.
pub fn monthly_trend(
    records: &[AttendanceRecord],
    filter: &AttendanceFilter,
) -> Vec<MonthlyAttendance> {
    let mut buckets: BTreeMap<(i32, u32), AttendanceCounts> = BTreeMap::new();
    for r in records.iter().filter(|r| filter.matches(r)) {
        buckets
            .entry((r.date.year(), r.date.month()))
            .or_default()
            .add(r.status);
    }
    buckets
        .into_iter()
        .map(|((year, month), counts)| MonthlyAttendance {
            year,
            month,
            label: month_label(month),
            counts,
        })
        .collect()
}

fn month_label(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_default()
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// Matching records inside one calendar month, newest first.
pub fn records_in_month<'a>(
    records: &'a [AttendanceRecord],
    filter: &AttendanceFilter,
    year: i32,
    month: u32,
) -> Vec<&'a AttendanceRecord> {
    let Some((first, last)) = month_bounds(year, month) else {
        return Vec::new();
    };
    let mut out: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| filter.matches(r) && r.date >= first && r.date <= last)
        .collect();
    out.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.class_id.cmp(&b.class_id))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(class_id: &str, date: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            student_id: "s1".into(),
            class_id: class_id.into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("date"),
            status,
            notes: None,
        }
    }

    use AttendanceStatus::*;

    #[test]
    fn rates_round_to_whole_percentages() {
        let records = vec![
            rec("c1", "2025-08-04", Present),
            rec("c1", "2025-08-05", Present),
            rec("c1", "2025-08-06", Present),
            rec("c1", "2025-08-07", Absent),
        ];
        let s = summarize(&records, &AttendanceFilter::for_student("s1"));
        assert_eq!(s.counts.total, 4);
        assert_eq!(
            (s.rates.present, s.rates.absent, s.rates.late, s.rates.excused),
            (75, 25, 0, 0)
        );

        let thirds = vec![
            rec("c1", "2025-08-04", Present),
            rec("c1", "2025-08-05", Late),
            rec("c1", "2025-08-06", Excused),
        ];
        let s = summarize(&thirds, &AttendanceFilter::default());
        assert_eq!((s.rates.present, s.rates.late, s.rates.excused), (33, 33, 33));
    }

    #[test]
    fn empty_record_set_reports_zero_rates_with_zero_total() {
        let s = summarize(&[], &AttendanceFilter::for_student("s1"));
        assert_eq!(s.rates, AttendanceRates::default());
        assert_eq!(s.counts.total, 0);
    }

    #[test]
    fn overall_rate_pools_counts_across_classes() {
        let records = vec![
            rec("c1", "2025-08-04", Present),
            rec("c2", "2025-08-04", Absent),
            rec("c2", "2025-08-05", Absent),
            rec("c2", "2025-08-06", Present),
        ];
        let b = summarize_by_class(
            &records,
            &AttendanceFilter::for_student("s1"),
            &["c3".to_string()],
        );
        // pooled 2/4, not the mean of 100% and 33%
        assert_eq!(b.overall.rates.present, 50);
        let ids: Vec<&str> = b.per_class.iter().map(|c| c.class_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(b.per_class[1].summary.rates.present, 33);
        assert_eq!(b.per_class[2].summary.counts.total, 0);
    }

    #[test]
    fn filter_by_class_and_date_range() {
        let records = vec![
            rec("c1", "2025-08-04", Present),
            rec("c1", "2025-09-01", Late),
            rec("c2", "2025-09-02", Absent),
        ];
        let filter = AttendanceFilter {
            student_id: Some("s1".into()),
            class_id: Some("c1".into()),
            from: NaiveDate::from_ymd_opt(2025, 8, 5),
            to: NaiveDate::from_ymd_opt(2025, 9, 30),
        };
        let s = summarize(&records, &filter);
        assert_eq!(s.counts.late, 1);
        assert_eq!(s.counts.total, 1);
    }

    #[test]
    fn monthly_trend_omits_empty_months() {
        let records = vec![
            rec("c1", "2025-10-01", Present),
            rec("c1", "2025-08-04", Present),
            rec("c1", "2025-08-05", Absent),
        ];
        let trend = monthly_trend(&records, &AttendanceFilter::for_student("s1"));
        assert_eq!(trend.len(), 2);
        assert_eq!((trend[0].year, trend[0].month), (2025, 8));
        assert_eq!(trend[0].label, "August");
        assert_eq!(trend[0].counts.total, 2);
        assert_eq!(trend[1].label, "October");
    }

    #[test]
    fn month_listing_is_newest_first() {
        let records = vec![
            rec("c1", "2024-02-01", Present),
            rec("c1", "2024-02-29", Late),
            rec("c1", "2024-03-01", Absent),
        ];
        let listed = records_in_month(&records, &AttendanceFilter::for_student("s1"), 2024, 2);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].status, Late);
        assert!(records_in_month(&records, &AttendanceFilter::default(), 2024, 13).is_empty());
    }
}
