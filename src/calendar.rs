//! Month grouping and the calendar grid.
//!
//! Index and tag pages list documents in month sections; calendar pages show
//! one month as Monday-to-Sunday weeks with each day's first document and
//! period. Everything here is pure date arithmetic over an already sorted
//! store.

use crate::store::Store;
use crate::types::{Document, Period};
use chrono::{Datelike, Days, Months, NaiveDate};

/// Consecutive documents from the same month.
#[derive(Debug, Clone)]
pub struct MonthGroup<'a> {
    /// First day of the month.
    pub month: NaiveDate,
    pub documents: Vec<&'a Document>,
}

/// Group consecutive documents by month, keeping input order.
///
/// Input is expected to be date-sorted; an unsorted input produces one group
/// per run rather than one per month.
pub fn month_groups<'a>(documents: &[&'a Document]) -> Vec<MonthGroup<'a>> {
    let mut groups: Vec<MonthGroup<'a>> = Vec::new();
    for &doc in documents {
        let month = first_day_of_month(doc.date);
        match groups.last_mut() {
            Some(group) if group.month == month => group.documents.push(doc),
            _ => groups.push(MonthGroup {
                month,
                documents: vec![doc],
            }),
        }
    }
    groups
}

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let first = first_day_of_month(date);
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// Shift by whole months. `None` past the representable range.
pub fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    }
}

/// The Monday on or before `date`.
pub fn prior_monday(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// The Sunday on or after `date`.
pub fn next_sunday(date: NaiveDate) -> NaiveDate {
    date + Days::new(u64::from(6 - date.weekday().num_days_from_monday()))
}

/// Full weeks covering the month, Monday first. `None` for an invalid month.
pub fn calendar_weeks(year: i32, month: u32) -> Option<Vec<[NaiveDate; 7]>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let mut day = prior_monday(first);
    let end = next_sunday(last_day_of_month(first));

    let mut weeks = Vec::new();
    while day <= end {
        let week: [NaiveDate; 7] = std::array::from_fn(|i| day + Days::new(i as u64));
        day = week[6] + Days::new(1);
        weeks.push(week);
    }
    Some(weeks)
}

/// First days of every month from `oldest` to `newest`, oldest first.
pub fn months_between(oldest: NaiveDate, newest: NaiveDate) -> Vec<NaiveDate> {
    let end = first_day_of_month(newest);
    let mut month = first_day_of_month(oldest);
    let mut months = Vec::new();
    while month <= end {
        months.push(month);
        match add_months(month, 1) {
            Some(next) => month = next,
            None => break,
        }
    }
    months
}

#[derive(Debug, Clone)]
pub struct CalendarDay<'a> {
    pub date: NaiveDate,
    pub in_month: bool,
    pub document: Option<&'a Document>,
    pub period: Option<&'a Period>,
}

/// One calendar page. Navigation targets are `None` when they fall outside
/// the months that have documents.
#[derive(Debug, Clone)]
pub struct CalendarMonth<'a> {
    pub month: NaiveDate,
    pub weeks: Vec<[CalendarDay<'a>; 7]>,
    pub prev_month: Option<NaiveDate>,
    pub next_month: Option<NaiveDate>,
    pub prev_year: Option<NaiveDate>,
    pub next_year: Option<NaiveDate>,
}

/// Calendar page for `month`, limited to the `[oldest, newest]` month range.
pub fn calendar_month<'a>(
    store: &'a Store,
    month: NaiveDate,
    oldest: NaiveDate,
    newest: NaiveDate,
) -> CalendarMonth<'a> {
    let month = first_day_of_month(month);
    let (lo, hi) = (first_day_of_month(oldest), first_day_of_month(newest));
    let in_range = |offset: i32| add_months(month, offset).filter(|m| *m >= lo && *m <= hi);

    let weeks = calendar_weeks(month.year(), month.month())
        .unwrap_or_default()
        .into_iter()
        .map(|week| {
            week.map(|date| CalendarDay {
                date,
                in_month: date.month() == month.month(),
                document: store.documents_on_date(date).into_iter().next(),
                period: store.period_on(date),
            })
        })
        .collect();

    CalendarMonth {
        month,
        weeks,
        prev_month: in_range(-1),
        next_month: in_range(1),
        prev_year: in_range(-12),
        next_year: in_range(12),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{doc_titled, ymd};
    use chrono::Weekday;
    use std::path::Path;

    // =========================================================================
    // Date helpers
    // =========================================================================

    #[test]
    fn month_bounds() {
        assert_eq!(first_day_of_month(ymd(2024, 2, 17)), ymd(2024, 2, 1));
        assert_eq!(last_day_of_month(ymd(2024, 2, 17)), ymd(2024, 2, 29));
        assert_eq!(last_day_of_month(ymd(2023, 12, 1)), ymd(2023, 12, 31));
    }

    #[test]
    fn add_months_both_directions() {
        assert_eq!(add_months(ymd(2023, 1, 1), -1), Some(ymd(2022, 12, 1)));
        assert_eq!(add_months(ymd(2023, 11, 1), 14), Some(ymd(2025, 1, 1)));
        // Clamps to the end of shorter months
        assert_eq!(add_months(ymd(2023, 1, 31), 1), Some(ymd(2023, 2, 28)));
    }

    #[test]
    fn monday_and_sunday() {
        // 2023-05-03 is a Wednesday
        assert_eq!(prior_monday(ymd(2023, 5, 3)), ymd(2023, 5, 1));
        assert_eq!(prior_monday(ymd(2023, 5, 1)), ymd(2023, 5, 1));
        assert_eq!(prior_monday(ymd(2023, 5, 7)), ymd(2023, 5, 1));
        assert_eq!(next_sunday(ymd(2023, 5, 3)), ymd(2023, 5, 7));
        assert_eq!(next_sunday(ymd(2023, 5, 7)), ymd(2023, 5, 7));
    }

    #[test]
    fn calendar_weeks_cover_month() {
        // October 2023 starts on a Sunday and ends on a Tuesday
        let weeks = calendar_weeks(2023, 10).unwrap();
        assert_eq!(weeks.len(), 6);
        assert_eq!(weeks[0][0], ymd(2023, 9, 25));
        assert_eq!(weeks[0][6], ymd(2023, 10, 1));
        assert_eq!(weeks[5][6], ymd(2023, 11, 5));
        assert!(weeks.iter().all(|w| w[0].weekday() == Weekday::Mon));
        assert!(calendar_weeks(2023, 13).is_none());
    }

    #[test]
    fn months_between_inclusive() {
        let months = months_between(ymd(2022, 11, 20), ymd(2023, 2, 3));
        assert_eq!(
            months,
            vec![ymd(2022, 11, 1), ymd(2022, 12, 1), ymd(2023, 1, 1), ymd(2023, 2, 1)]
        );
    }

    // =========================================================================
    // Grouping and pages
    // =========================================================================

    #[test]
    fn month_groups_are_consecutive_runs() {
        let docs = [
            doc_titled("a.md", "A", ymd(2023, 5, 20)),
            doc_titled("b.md", "B", ymd(2023, 5, 2)),
            doc_titled("c.md", "C", ymd(2023, 3, 9)),
        ];
        let refs: Vec<&Document> = docs.iter().collect();
        let groups = month_groups(&refs);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].month, ymd(2023, 5, 1));
        assert_eq!(groups[0].documents.len(), 2);
        assert_eq!(groups[1].documents[0].title, "C");
        assert!(month_groups(&[]).is_empty());
    }

    #[test]
    fn calendar_month_places_documents_and_limits_navigation() {
        let docs = vec![
            doc_titled("a.md", "A", ymd(2023, 5, 3)),
            doc_titled("b.md", "B", ymd(2023, 3, 1)),
        ];
        let periods = vec![Period {
            name: "Trip".into(),
            from: ymd(2023, 5, 2),
            to: ymd(2023, 5, 4),
        }];
        let store = Store::from_documents(Path::new("/j"), docs, periods);

        let page = calendar_month(&store, ymd(2023, 5, 15), ymd(2023, 3, 1), ymd(2023, 5, 3));
        assert_eq!(page.month, ymd(2023, 5, 1));
        let wednesday = &page.weeks[0][2];
        assert_eq!(wednesday.date, ymd(2023, 5, 3));
        assert_eq!(wednesday.document.unwrap().title, "A");
        assert_eq!(wednesday.period.unwrap().name, "Trip");
        assert!(page.weeks[0][6].period.is_none());

        assert_eq!(page.prev_month, Some(ymd(2023, 4, 1)));
        assert_eq!(page.next_month, None);
        assert_eq!(page.prev_year, None);
        assert_eq!(page.next_year, None);

        let march = calendar_month(&store, ymd(2023, 3, 1), ymd(2023, 3, 1), ymd(2023, 5, 3));
        assert!(march.prev_month.is_none());
        assert_eq!(march.next_month, Some(ymd(2023, 4, 1)));
        assert!(!march.weeks[0][0].in_month);
    }
}
