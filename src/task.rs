use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_due_date")]
    pub due_date: Option<DueDate>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl Task {
    /// Due date set, strictly before `now`, and not completed.
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due.0 < now)
    }

    /// Calendar-day match; time of day is ignored.
    pub fn due_on(&self, day: NaiveDate) -> bool {
        self.due_date.is_some_and(|due| due.date() == day)
    }
}

/// Body of `POST /api/tasks`.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub due_date: Option<DueDate>,
}

/// Body of `PUT /api/tasks/{id}`. Only the fields that are set go on the wire.
#[derive(Debug, Serialize, Default, Clone, PartialEq)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<DueDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.completed.is_none()
    }
}

/// A task deadline in local time. Date-only values sit at midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DueDate(NaiveDateTime);

impl DueDate {
    pub fn new(at: NaiveDateTime) -> Self {
        Self(at)
    }

    pub fn on(day: NaiveDate) -> Self {
        Self(day.and_time(NaiveTime::MIN))
    }

    pub fn at(&self) -> NaiveDateTime {
        self.0
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    /// "Oct 19, 2026"
    pub fn display(&self) -> String {
        self.0.format("%b %-d, %Y").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised due date: {0:?}")]
pub struct ParseDueDateError(pub String);

impl FromStr for DueDate {
    type Err = ParseDueDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::on(day));
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(at.with_timezone(&Local).naive_local()));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
            if let Ok(at) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Self(at));
            }
        }
        Err(ParseDueDateError(s.to_string()))
    }
}

impl fmt::Display for DueDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.time() == NaiveTime::MIN {
            write!(f, "{}", self.0.format("%Y-%m-%d"))
        } else {
            write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
        }
    }
}

impl Serialize for DueDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DueDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

// A date the server stored but we cannot read must not sink the whole task list.
fn lenient_due_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DueDate>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()).and_then(|s| match s.parse() {
        Ok(due) => Some(due),
        Err(err) => {
            tracing::warn!("ignoring due date on task: {}", err);
            None
        }
    }))
}

pub fn overdue_tasks(tasks: &[Task], now: NaiveDateTime) -> Vec<&Task> {
    tasks.iter().filter(|t| t.is_overdue(now)).collect()
}

/// Whole days the longest-overdue task is behind; 0 when nothing is overdue.
pub fn max_days_overdue(overdue: &[&Task], now: NaiveDateTime) -> i64 {
    overdue
        .iter()
        .filter_map(|t| t.due_date)
        .map(|due| (now - due.at()).num_days())
        .max()
        .unwrap_or(0)
        .max(0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub completion_rate: f64,
}

impl BoardStats {
    pub fn of(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.completed).count();
        let completion_rate = if total == 0 {
            0.0
        } else {
            (completed as f64 / total as f64 * 1000.0).round() / 10.0
        };
        Self {
            total,
            completed,
            pending: total - completed,
            completion_rate,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample(id: &str, title: &str, due: Option<NaiveDateTime>, completed: bool) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        due_date: due.map(DueDate::new),
        completed,
        created_at: None,
        completed_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn overdue_requires_past_date_and_open_task() {
        let now = at("2026-10-19 12:00");
        let past = Some(at("2026-10-18 09:00"));
        let future = Some(at("2026-10-20 09:00"));

        assert!(sample("1", "Swim", past, false).is_overdue(now));
        assert!(!sample("2", "Surf", past, true).is_overdue(now));
        assert!(!sample("3", "Dive", future, false).is_overdue(now));
        assert!(!sample("4", "Nap", None, false).is_overdue(now));
        // strictly before
        assert!(!sample("5", "Now", Some(now), false).is_overdue(now));
    }

    #[test]
    fn max_days_overdue_floors_and_takes_max() {
        let now = at("2026-10-19 12:00");
        let tasks = vec![
            sample("1", "a", Some(at("2026-10-18 13:00")), false),
            sample("2", "b", Some(at("2026-10-15 12:00")), false),
            sample("3", "c", Some(at("2026-10-01 12:00")), true),
        ];
        let overdue = overdue_tasks(&tasks, now);
        assert_eq!(overdue.len(), 2);
        assert_eq!(max_days_overdue(&overdue, now), 4);
        assert_eq!(max_days_overdue(&[], now), 0);
    }

    #[test]
    fn due_on_ignores_time_of_day() {
        let task = sample("1", "Swim", Some(at("2026-10-19 23:30")), false);
        assert!(task.due_on(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()));
        assert!(!task.due_on(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()));
    }

    #[test]
    fn parses_server_task_shapes() {
        let raw = json!([
            {"id": "a", "user_id": "ocean", "title": "Swim", "description": "",
             "due_date": "2026-10-19", "completed": false, "created_at": "2026-10-01T10:00:00",
             "completed_at": null},
            {"id": "b", "title": "Surf", "due_date": "2026-10-20T08:30", "completed": true},
            {"id": "c", "title": "Dive", "due_date": null},
            {"id": "d", "title": "Nap", "due_date": "someday"}
        ]);
        let tasks: Vec<Task> = serde_json::from_value(raw).unwrap();
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].description, None);
        assert_eq!(tasks[0].due_date.unwrap().to_string(), "2026-10-19");
        assert_eq!(tasks[1].due_date.unwrap().to_string(), "2026-10-20T08:30:00");
        assert!(tasks[2].due_date.is_none());
        assert!(tasks[3].due_date.is_none());
        assert!(!tasks[2].completed);
    }

    #[test]
    fn patch_serialises_only_set_fields() {
        let body = serde_json::to_value(TaskPatch::completed(true)).unwrap();
        assert_eq!(body, json!({"completed": true}));

        let clear_due = TaskPatch {
            due_date: Some(None),
            ..TaskPatch::default()
        };
        assert_eq!(serde_json::to_value(clear_due).unwrap(), json!({"due_date": null}));
    }

    #[test]
    fn stats_round_to_one_decimal() {
        let tasks = vec![
            sample("1", "a", None, true),
            sample("2", "b", None, false),
            sample("3", "c", None, false),
        ];
        let stats = BoardStats::of(&tasks);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.completion_rate, 33.3);
        assert_eq!(BoardStats::of(&[]).completion_rate, 0.0);
    }
}
