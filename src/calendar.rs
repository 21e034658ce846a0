//! iCalendar (RFC 5545) export of stored exams.
//!
//! One all-day VEVENT per exam. UIDs come from the record's uniqueness key,
//! so exporting the same selection twice yields the same event identities.

use std::collections::BTreeSet;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Days, Utc};
use icalendar::{Calendar, Component, Event, EventLike};

use crate::model::{ExamRecord, SessionKind};

pub fn render_calendar<'a, I>(records: I, generated_at: DateTime<Utc>) -> String
where
    I: IntoIterator<Item = &'a ExamRecord>,
{
    let mut calendar = Calendar::new();

    for record in records {
        let start = record.exam_date();
        let end = start.checked_add_days(Days::new(1)).unwrap_or(start);

        let event = Event::new()
            .uid(&record.event_uid())
            .timestamp(generated_at)
            .starts(start)
            .ends(end)
            .summary(&summary(record))
            .description(&format!(
                "Appello di {} ({}) - Fonte: {}",
                record.subject(),
                record.session_kind().label(),
                record.source_document()
            ))
            .add_property("TRANSP", "TRANSPARENT")
            .done();
        calendar.push(event);
    }

    calendar.to_string()
}

fn summary(record: &ExamRecord) -> String {
    match record.session_kind() {
        SessionKind::Ordinary => record.subject().to_string(),
        SessionKind::OutOfCourse => {
            format!("{} ({})", record.subject(), SessionKind::OutOfCourse.label())
        }
    }
}

/// UIDs of every VEVENT in an iCalendar text.
pub fn event_uids(ics: &str) -> Result<BTreeSet<String>> {
    let mut uids = BTreeSet::new();

    for calendar in ical::IcalParser::new(ics.as_bytes()) {
        let calendar = calendar.map_err(|error| anyhow!("invalid iCalendar data: {error}"))?;
        for event in &calendar.events {
            uids.extend(
                event
                    .properties
                    .iter()
                    .filter(|property| property.name.eq_ignore_ascii_case("UID"))
                    .filter_map(|property| property.value.as_deref())
                    .map(|uid| uid.trim().to_string()),
            );
        }
    }

    Ok(uids)
}
