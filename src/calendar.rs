//! Month grid derived from the cached task list.
//!
//! Nothing here talks to the server: switching months only re-derives the grid.

use crate::task::Task;
use chrono::{Datelike, Months, NaiveDate};

pub const DAY_HEADERS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// The month currently shown by the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    first: NaiveDate,
}

impl MonthCursor {
    pub fn current(today: NaiveDate) -> Self {
        Self {
            first: today.with_day(1).unwrap_or(today),
        }
    }

    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    /// Moves by `offset` months, negative for the past. Out-of-range shifts stay put.
    pub fn shifted(self, offset: i32) -> Self {
        let months = Months::new(offset.unsigned_abs());
        let moved = if offset < 0 {
            self.first.checked_sub_months(months)
        } else {
            self.first.checked_add_months(months)
        };
        moved.map(|first| Self { first }).unwrap_or(self)
    }

    pub fn prev(self) -> Self {
        self.shifted(-1)
    }

    pub fn next(self) -> Self {
        self.shifted(1)
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn days_in_month(&self) -> u32 {
        let next = self.next().first;
        if next == self.first {
            // last representable month; chrono's range ends on Dec 31
            return 31;
        }
        (next - self.first).num_days() as u32
    }

    /// Weekday of day 1 with Sunday as 0.
    pub fn leading_blanks(&self) -> u32 {
        self.first.weekday().num_days_from_sunday()
    }

    /// "October 2026"
    pub fn title(&self) -> String {
        self.first.format("%B %Y").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub day: u32,
    pub date: NaiveDate,
    pub has_tasks: bool,
    pub is_today: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarGrid {
    pub month: MonthCursor,
    pub leading_blanks: u32,
    pub days: Vec<CalendarDay>,
}

impl CalendarGrid {
    pub fn build(month: MonthCursor, tasks: &[Task], today: NaiveDate) -> Self {
        let days = (1..=month.days_in_month())
            .filter_map(|day| month.first.with_day(day))
            .map(|date| CalendarDay {
                day: date.day(),
                date,
                has_tasks: tasks.iter().any(|t| t.due_on(date)),
                is_today: date == today,
            })
            .collect();

        Self {
            month,
            leading_blanks: month.leading_blanks(),
            days,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.leading_blanks as usize + self.days.len()
    }

    /// Rows of seven cells; `None` is a blank before day 1 or after the last day.
    pub fn weeks(&self) -> Vec<[Option<&CalendarDay>; 7]> {
        let mut cells: Vec<Option<&CalendarDay>> = Vec::with_capacity(42);
        cells.extend((0..self.leading_blanks).map(|_| None));
        cells.extend(self.days.iter().map(Some));
        while cells.len() % 7 != 0 {
            cells.push(None);
        }

        cells
            .chunks(7)
            .map(|row| {
                let mut week = [None; 7];
                week.copy_from_slice(row);
                week
            })
            .collect()
    }

    pub fn marked_days(&self) -> impl Iterator<Item = &CalendarDay> {
        self.days.iter().filter(|d| d.has_tasks)
    }
}

pub fn tasks_on(tasks: &[Task], date: NaiveDate) -> Vec<&Task> {
    tasks.iter().filter(|t| t.due_on(date)).collect()
}
