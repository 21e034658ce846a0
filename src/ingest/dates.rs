//! Italian day/month/year date fragments to `NaiveDate`.

use chrono::NaiveDate;

use crate::error::ParseError;

const MONTHS: [&str; 12] = [
    "gennaio",
    "febbraio",
    "marzo",
    "aprile",
    "maggio",
    "giugno",
    "luglio",
    "agosto",
    "settembre",
    "ottobre",
    "novembre",
    "dicembre",
];

pub(crate) const WEEKDAYS: [&str; 7] = [
    "lunedi",
    "martedi",
    "mercoledi",
    "giovedi",
    "venerdi",
    "sabato",
    "domenica",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Number,
    Word,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    // Gap before this token holds only date separators.
    separated: bool,
}

/// Parses the first day/month/year triple found in `raw`.
///
/// A leading weekday name is skipped. Months may be numeric or Italian
/// names and abbreviations of at least three letters. The year must carry
/// four digits.
pub fn normalize(raw: &str) -> Result<NaiveDate, ParseError> {
    let tokens = tokenize(raw);

    for window in tokens.windows(3) {
        let [day, month, year] = window else {
            continue;
        };
        if !month.separated || !year.separated {
            continue;
        }
        if day.kind != TokenKind::Number || day.text.len() > 2 {
            continue;
        }
        if year.kind != TokenKind::Number || year.text.len() != 4 {
            continue;
        }
        let Some(month_value) = classify_month(month) else {
            continue;
        };

        let day_value = parse_number(&day.text)?;
        let year_value = parse_number(&year.text)? as i32;

        return calendar_date(day_value, month_value, year_value);
    }

    Err(ParseError::InvalidDateFormat {
        input: raw.trim().to_string(),
    })
}

pub(crate) fn calendar_date(day: u32, month: u32, year: i32) -> Result<NaiveDate, ParseError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(ParseError::ImpossibleDate { day, month, year })
}

/// Month/year column header such as `Gennaio 2027` or `FEB. 2027`.
pub(crate) fn month_year_header(line: &str) -> Option<(u32, i32)> {
    let tokens = tokenize(line);
    let [month, year] = tokens.as_slice() else {
        return None;
    };
    if month.kind != TokenKind::Word || year.kind != TokenKind::Number || year.text.len() != 4 {
        return None;
    }
    let month = month_from_word(&month.text)?;
    let year = year.text.parse::<i32>().ok()?;
    Some((month, year))
}

/// Days of a day-list cell: `12, 26`, `9 e 23`, or a lone `15`.
pub(crate) fn parse_day_list(line: &str) -> Option<Vec<u32>> {
    let mut days = Vec::new();
    for part in line
        .split(|character: char| character.is_whitespace() || matches!(character, ',' | ';'))
        .filter(|part| !part.is_empty())
    {
        if part.eq_ignore_ascii_case("e") || part.eq_ignore_ascii_case("ed") {
            continue;
        }
        if part.len() > 2 || !part.chars().all(|character| character.is_ascii_digit()) {
            return None;
        }
        days.push(part.parse::<u32>().ok()?);
    }
    if days.is_empty() { None } else { Some(days) }
}

pub(crate) fn month_from_word(word: &str) -> Option<u32> {
    if word.chars().count() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|month| month.starts_with(word))
        .map(|index| index as u32 + 1)
}

pub(crate) fn is_weekday_word(word: &str) -> bool {
    let folded = fold_word(word);
    WEEKDAYS.iter().any(|weekday| *weekday == folded)
}

pub(crate) fn fold_word(word: &str) -> String {
    word.to_lowercase()
        .chars()
        .map(|character| match character {
            'à' | 'á' => 'a',
            'è' | 'é' => 'e',
            'ì' | 'í' => 'i',
            'ò' | 'ó' => 'o',
            'ù' | 'ú' => 'u',
            other => other,
        })
        .collect()
}

fn classify_month(token: &Token) -> Option<u32> {
    match token.kind {
        TokenKind::Number if token.text.len() <= 2 => token.text.parse::<u32>().ok(),
        TokenKind::Number => None,
        TokenKind::Word => month_from_word(&token.text),
    }
}

fn parse_number(text: &str) -> Result<u32, ParseError> {
    text.parse::<u32>()
        .map_err(|_| ParseError::InvalidDateFormat {
            input: text.to_string(),
        })
}

fn is_date_separator(character: char) -> bool {
    character.is_whitespace() || matches!(character, '-' | '/' | '.')
}

fn tokenize(raw: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_kind: Option<TokenKind> = None;
    let mut gap_ok = true;

    let mut flush = |current: &mut String, kind: &mut Option<TokenKind>, gap_ok: &mut bool| {
        if let Some(token_kind) = kind.take() {
            let text = match token_kind {
                TokenKind::Word => fold_word(current),
                TokenKind::Number => current.clone(),
            };
            tokens.push(Token {
                kind: token_kind,
                text,
                separated: *gap_ok,
            });
            *gap_ok = true;
        }
        current.clear();
    };

    for character in raw.chars() {
        let kind = if character.is_ascii_digit() {
            Some(TokenKind::Number)
        } else if character.is_alphabetic() {
            Some(TokenKind::Word)
        } else {
            None
        };

        match kind {
            Some(kind) => {
                if current_kind.as_ref().is_some_and(|active| *active != kind) {
                    flush(&mut current, &mut current_kind, &mut gap_ok);
                }
                current.push(character);
                current_kind = Some(kind);
            }
            None => {
                flush(&mut current, &mut current_kind, &mut gap_ok);
                if !is_date_separator(character) {
                    gap_ok = false;
                }
            }
        }
    }
    flush(&mut current, &mut current_kind, &mut gap_ok);

    tokens
}
