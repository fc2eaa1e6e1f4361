use crate::dates::{iso8601_option, iso8601_patch};
use crate::{SyncError, SyncResult};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use strum::{Display, EnumString};

static LOCAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
const LOCAL_ID_PREFIX: &str = "local-";

/// Opaque task identifier.
///
/// Server-assigned when a task is created online. Tasks created while offline
/// get a local id (`local-<unix-millis>-<seq>`) that is swapped for the
/// server id once the create has been replayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate_local() -> Self {
        let seq = LOCAL_ID_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!(
            "{}{}-{}",
            LOCAL_ID_PREFIX,
            Utc::now().timestamp_millis(),
            seq
        ))
    }

    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Urgency {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub const ALL: [Urgency; 4] = [
        Urgency::Low,
        Urgency::Medium,
        Urgency::High,
        Urgency::Critical,
    ];

    /// Sort key for prioritised lists: most severe first.
    pub fn severity_rank(self) -> u8 {
        match self {
            Urgency::Critical => 0,
            Urgency::High => 1,
            Urgency::Medium => 2,
            Urgency::Low => 3,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Section {
    #[default]
    Active,
    Future,
    Done,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Active, Section::Future, Section::Done];
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Weekday {
    #[serde(rename = "MO")]
    #[strum(serialize = "MO")]
    Monday,
    #[serde(rename = "TU")]
    #[strum(serialize = "TU")]
    Tuesday,
    #[serde(rename = "WE")]
    #[strum(serialize = "WE")]
    Wednesday,
    #[serde(rename = "TH")]
    #[strum(serialize = "TH")]
    Thursday,
    #[serde(rename = "FR")]
    #[strum(serialize = "FR")]
    Friday,
    #[serde(rename = "SA")]
    #[strum(serialize = "SA")]
    Saturday,
    #[serde(rename = "SU")]
    #[strum(serialize = "SU")]
    Sunday,
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

/// Recurrence rule for an active task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Regularity {
    Weekly {
        days: BTreeSet<Weekday>,
        #[serde(
            rename = "lastCompleted",
            default,
            with = "iso8601_option",
            skip_serializing_if = "Option::is_none"
        )]
        last_completed: Option<DateTime<Utc>>,
    },
    EveryNDays {
        n: NonZeroU32,
        #[serde(
            rename = "lastCompleted",
            default,
            with = "iso8601_option",
            skip_serializing_if = "Option::is_none"
        )]
        last_completed: Option<DateTime<Utc>>,
    },
}

impl Regularity {
    pub fn weekly(days: impl IntoIterator<Item = Weekday>) -> SyncResult<Self> {
        let regularity = Regularity::Weekly {
            days: days.into_iter().collect(),
            last_completed: None,
        };
        regularity.validate()?;
        Ok(regularity)
    }

    pub fn every_n_days(n: u32) -> SyncResult<Self> {
        let n = NonZeroU32::new(n).ok_or_else(|| {
            SyncError::InvalidRegularity("interval must be at least one day".to_string())
        })?;
        Ok(Regularity::EveryNDays {
            n,
            last_completed: None,
        })
    }

    pub fn validate(&self) -> SyncResult<()> {
        match self {
            Regularity::Weekly { days, .. } if days.is_empty() => Err(
                SyncError::InvalidRegularity("weekly regularity needs at least one day".to_string()),
            ),
            _ => Ok(()),
        }
    }

    pub fn last_completed(&self) -> Option<DateTime<Utc>> {
        match self {
            Regularity::Weekly { last_completed, .. }
            | Regularity::EveryNDays { last_completed, .. } => *last_completed,
        }
    }

    pub fn set_last_completed(&mut self, at: DateTime<Utc>) {
        match self {
            Regularity::Weekly { last_completed, .. }
            | Regularity::EveryNDays { last_completed, .. } => *last_completed = Some(at),
        }
    }

    /// Whether the task should be worked on `date`.
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        let last = self.last_completed().map(|dt| dt.date_naive());
        match self {
            Regularity::Weekly { days, .. } => {
                days.contains(&Weekday::from(date.weekday())) && last != Some(date)
            }
            Regularity::EveryNDays { n, .. } => match last {
                None => true,
                Some(last) => (date - last).num_days() >= i64::from(n.get()),
            },
        }
    }
}

/// The one schedule field business logic looks at for a task's section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule<'a> {
    Planned(Option<&'a DateTime<Utc>>),
    Recurring(Option<&'a Regularity>),
    Completed(Option<&'a DateTime<Utc>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub why: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub section: Section,
    #[serde(default, with = "iso8601_option", skip_serializing_if = "Option::is_none")]
    pub planned_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "regularity_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub regularity: Option<Regularity>,
    #[serde(default, with = "iso8601_option", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn schedule(&self) -> Schedule<'_> {
        match self.section {
            Section::Active => Schedule::Recurring(self.regularity.as_ref()),
            Section::Future => Schedule::Planned(self.planned_date.as_ref()),
            Section::Done => Schedule::Completed(self.completed_at.as_ref()),
        }
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.section = Section::Done;
        self.completed_at = Some(at);
    }

    pub fn mark_active(&mut self) {
        self.section = Section::Active;
    }
}

/// Payload for creating a task; the id is assigned by whoever stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub why: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub section: Section,
    #[serde(default, with = "iso8601_option", skip_serializing_if = "Option::is_none")]
    pub planned_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "regularity_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub regularity: Option<Regularity>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, why: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            why: why.into(),
            urgency: Urgency::default(),
            section: Section::default(),
            planned_date: None,
            regularity: None,
        }
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn in_section(mut self, section: Section) -> Self {
        self.section = section;
        self
    }

    pub fn planned_for(mut self, date: DateTime<Utc>) -> Self {
        self.planned_date = Some(date);
        self
    }

    pub fn with_regularity(mut self, regularity: Regularity) -> Self {
        self.regularity = Some(regularity);
        self
    }

    pub fn validate(&self) -> SyncResult<()> {
        require_text("title", &self.title)?;
        require_text("why", &self.why)?;
        if let Some(regularity) = &self.regularity {
            regularity.validate()?;
        }
        Ok(())
    }

    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            title: self.title,
            why: self.why,
            urgency: self.urgency,
            section: self.section,
            planned_date: self.planned_date,
            regularity: self.regularity,
            completed_at: None,
        }
    }
}

impl From<&Task> for TaskDraft {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            why: task.why.clone(),
            urgency: task.urgency,
            section: task.section,
            planned_date: task.planned_date,
            regularity: task.regularity.clone(),
        }
    }
}

/// Partial update. `None` leaves a field alone; for the nullable fields
/// `Some(None)` clears the value and serializes as an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<Section>,
    #[serde(default, with = "iso8601_patch", skip_serializing_if = "Option::is_none")]
    pub planned_date: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "regularity_patch",
        skip_serializing_if = "Option::is_none"
    )]
    pub regularity: Option<Option<Regularity>>,
    #[serde(default, with = "iso8601_patch", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_why(mut self, why: impl Into<String>) -> Self {
        self.why = Some(why.into());
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.section = Some(section);
        self
    }

    pub fn with_planned_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.planned_date = Some(date);
        self
    }

    pub fn with_regularity(mut self, regularity: Option<Regularity>) -> Self {
        self.regularity = Some(regularity);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    pub fn validate(&self) -> SyncResult<()> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(why) = &self.why {
            require_text("why", why)?;
        }
        if let Some(Some(regularity)) = &self.regularity {
            regularity.validate()?;
        }
        Ok(())
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(why) = &self.why {
            task.why = why.clone();
        }
        if let Some(urgency) = self.urgency {
            task.urgency = urgency;
        }
        if let Some(section) = self.section {
            task.section = section;
        }
        if let Some(planned_date) = self.planned_date {
            task.planned_date = planned_date;
        }
        if let Some(regularity) = &self.regularity {
            task.regularity = regularity.clone();
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = completed_at;
        }
    }

    /// True when every field this patch sets has that value in `task`.
    ///
    /// Dates are compared at millisecond precision, the precision they
    /// cross the wire with.
    pub fn is_reflected_in(&self, task: &Task) -> bool {
        self.title.as_ref().map_or(true, |t| *t == task.title)
            && self.why.as_ref().map_or(true, |w| *w == task.why)
            && self.urgency.map_or(true, |u| u == task.urgency)
            && self.section.map_or(true, |s| s == task.section)
            && self
                .planned_date
                .map_or(true, |d| same_instant(d, task.planned_date))
            && self
                .regularity
                .as_ref()
                .map_or(true, |r| *r == task.regularity)
            && self
                .completed_at
                .map_or(true, |d| same_instant(d, task.completed_at))
    }
}

impl From<&Task> for TaskPatch {
    fn from(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            why: Some(task.why.clone()),
            urgency: Some(task.urgency),
            section: Some(task.section),
            planned_date: Some(task.planned_date),
            regularity: Some(task.regularity.clone()),
            completed_at: Some(task.completed_at),
        }
    }
}

fn require_text(field: &str, value: &str) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::InvalidTask(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn same_instant(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
    a.map(|d| d.timestamp_millis()) == b.map(|d| d.timestamp_millis())
}

/// Wire shapes accepted for a regularity. Older clients send the weekly
/// variant as a bare list of weekday codes.
#[derive(Deserialize)]
#[serde(untagged)]
enum RegularityRepr {
    Days(BTreeSet<Weekday>),
    Tagged(Regularity),
}

/// An empty weekday list means no recurrence.
fn regularity_option<'de, D>(deserializer: D) -> Result<Option<Regularity>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RegularityRepr>::deserialize(deserializer)? {
        None => None,
        Some(RegularityRepr::Days(days)) if days.is_empty() => None,
        Some(RegularityRepr::Days(days)) => Some(Regularity::Weekly {
            days,
            last_completed: None,
        }),
        Some(RegularityRepr::Tagged(regularity)) => Some(regularity),
    })
}

fn regularity_patch<'de, D>(deserializer: D) -> Result<Option<Option<Regularity>>, D::Error>
where
    D: Deserializer<'de>,
{
    regularity_option(deserializer).map(Some)
}
