//! Display ordering for each section.

use crate::models::{Section, Task};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

/// Future tasks planned within this many days of now are listed first.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

/// Most severe first; among equals, dated before undated, earlier date first.
pub fn sort_active(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.urgency
            .severity_rank()
            .cmp(&b.urgency.severity_rank())
            .then_with(|| dated_first(a.planned_date, b.planned_date))
    });
}

/// Upcoming tasks (planned no later than `now` plus the window) come first,
/// then the remaining dated tasks, both by date. Undated tasks go last,
/// ordered by urgency.
pub fn sort_future(tasks: &mut [Task], now: DateTime<Utc>) {
    let horizon = now + Duration::days(UPCOMING_WINDOW_DAYS);
    tasks.sort_by(|a, b| match (a.planned_date, b.planned_date) {
        (Some(x), Some(y)) => (x > horizon).cmp(&(y > horizon)).then(x.cmp(&y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.urgency.severity_rank().cmp(&b.urgency.severity_rank()),
    });
}

/// Most recently completed first; never-completed last.
pub fn sort_done(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| match (a.completed_at, b.completed_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

pub fn sort_section(section: Section, tasks: &mut [Task], now: DateTime<Utc>) {
    match section {
        Section::Active => sort_active(tasks),
        Section::Future => sort_future(tasks, now),
        Section::Done => sort_done(tasks),
    }
}

fn dated_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
