use anyhow::Result;

use super::blocks::{CandidateBlock, DateLike};
use super::dates::{calendar_date, normalize, parse_day_list};
use crate::error::ParseError;
use crate::model::{ExamRecord, SessionKind};

pub struct RecordParser {
    date_like: DateLike,
}

impl RecordParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            date_like: DateLike::new()?,
        })
    }

    /// Turns one candidate block into one result per exam date it lists,
    /// without touching any store.
    ///
    /// A body line is a date entry when it carries a full day/month/year
    /// date, or when it is a day list (`12, 26`) under month headers; the
    /// n-th day list belongs to the n-th month header. A block without a
    /// subject or without any date entry yields a single error.
    pub fn parse(
        &self,
        block: &CandidateBlock,
        source_document: &str,
        session_kind: SessionKind,
    ) -> Vec<Result<ExamRecord, ParseError>> {
        let Some(subject) = block
            .heading
            .as_deref()
            .map(str::trim)
            .filter(|heading| !heading.is_empty())
        else {
            return vec![Err(ParseError::MissingSubject)];
        };

        let mut dates = Vec::new();
        let mut day_lists = 0usize;
        for line in &block.body {
            // Whole line: the normalizer skips weekdays and "9:00"-style times itself.
            if self.date_like.is_match(line) {
                dates.push(normalize(line));
                continue;
            }

            if block.month_columns.is_empty() {
                continue;
            }
            let Some(days) = parse_day_list(line) else {
                continue;
            };
            match block.month_columns.get(day_lists) {
                Some(column) => dates.extend(
                    days.into_iter()
                        .map(|day| calendar_date(day, column.month, column.year)),
                ),
                None => dates.push(Err(ParseError::InvalidDateFormat {
                    input: line.clone(),
                })),
            }
            day_lists += 1;
        }

        if dates.is_empty() {
            return vec![Err(ParseError::MissingDate)];
        }

        dates
            .into_iter()
            .map(|date| {
                date.and_then(|exam_date| {
                    ExamRecord::new(subject, exam_date, session_kind, source_document)
                })
            })
            .collect()
    }
}
