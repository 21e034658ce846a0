use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dates::{fold_word, is_weekday_word, month_from_word, month_year_header};
use crate::util::condense_whitespace;

const REPEATED_EDGE_MIN_PAGES: usize = 3;
const EDGE_LINE_MAX_LEN: usize = 120;

/// Fixed phrases that appear on every page of the ordinary and out-of-course
/// listings, plus the page-number shapes printed in their footers. Page-number
/// shapes only apply to the first and last line of a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfig {
    pub boilerplate_phrases: Vec<String>,
    pub page_number_patterns: Vec<String>,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            boilerplate_phrases: [
                "INSEGNAMENTO",
                "AULA",
                "PRIMO ANNO",
                "SECONDO ANNO",
                "TERZO ANNO",
                "CORSO DI LAUREA",
                "CALENDARIO ESAMI",
                "APPELLI FUORI CORSO",
                "DIPARTIMENTO DI MATEMATICA E INFORMATICA",
                "UNIVERSITÀ DEGLI STUDI DI CATANIA",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            page_number_patterns: vec![
                r"^\d{1,3}$".to_string(),
                r"^(?i)pag(?:\.|ina)?\s*\d{1,3}(?:\s*(?:di|/)\s*\d{1,3})?$".to_string(),
            ],
        }
    }
}

impl AnchorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// A `Gennaio 2027` column header of the ordinary-session table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthColumn {
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateBlock {
    pub index: usize,
    pub page: usize,
    pub heading: Option<String>,
    pub body: Vec<String>,
    /// Month headers in effect when the block started, in column order.
    pub month_columns: Vec<MonthColumn>,
}

pub struct BlockExtractor {
    boilerplate: Option<Regex>,
    page_numbers: Vec<Regex>,
    date_like: DateLike,
}

impl BlockExtractor {
    pub fn new(config: &AnchorConfig) -> Result<Self> {
        let phrases = config
            .boilerplate_phrases
            .iter()
            .map(|phrase| condense_whitespace(phrase))
            .filter(|phrase| !phrase.is_empty())
            .map(|phrase| regex::escape(&phrase))
            .collect::<Vec<String>>();
        let boilerplate = if phrases.is_empty() {
            None
        } else {
            Some(
                Regex::new(&format!(r"(?i)\b(?:{})\b", phrases.join("|")))
                    .context("failed to compile boilerplate anchor regex")?,
            )
        };

        let page_numbers = config
            .page_number_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("failed to compile page number regex: {pattern}"))
            })
            .collect::<Result<Vec<Regex>>>()?;

        Ok(Self {
            boilerplate,
            page_numbers,
            date_like: DateLike::new()?,
        })
    }

    /// Lazily groups page lines into candidate blocks, in document order.
    pub fn segment<'a>(&'a self, pages: &'a [String]) -> Blocks<'a> {
        let repeated_edges = detect_repeated_edge_lines(pages);
        if !repeated_edges.is_empty() {
            debug!(count = repeated_edges.len(), "dropping repeated page edge lines");
        }

        Blocks {
            extractor: self,
            pages: pages.iter().enumerate(),
            repeated_edges,
            page: None,
            current: None,
            columns: Vec::new(),
            header_run: false,
            next_index: 0,
        }
    }

    fn is_anchor(&self, line: &str) -> bool {
        self.boilerplate
            .as_ref()
            .is_some_and(|regex| regex.is_match(line))
    }

    fn is_page_number(&self, line: &str) -> bool {
        self.page_numbers.iter().any(|regex| regex.is_match(line))
    }

    fn is_heading(&self, line: &str) -> bool {
        if self.date_like.is_match(line) {
            return false;
        }

        let letters = line.chars().filter(|character| character.is_alphabetic()).count();
        if letters < 3 {
            return false;
        }

        let Some(first_word) = line.split_whitespace().next() else {
            return false;
        };
        let first_word = first_word.trim_matches(|character: char| !character.is_alphanumeric());
        if !first_word
            .chars()
            .next()
            .is_some_and(|character| character.is_uppercase())
        {
            return false;
        }
        let folded = fold_word(first_word);
        if is_weekday_word(&folded) || month_from_word(&folded).is_some() {
            return false;
        }

        is_upper_case_line(line) || is_title_case_line(line)
    }
}

/// Loose digit-bearing date shape: day, separator, month word or number,
/// separator, year. Matches glued to a clock time (`9.30 - 11.30`) do not count.
pub(crate) struct DateLike {
    regex: Regex,
}

impl DateLike {
    pub(crate) fn new() -> Result<Self> {
        let regex = Regex::new(
            r"\b\d{1,2}\s*[-/.\s]\s*(?:\d{1,2}|[[:alpha:]]{3,}\.?)\s*[-/.\s]\s*\d{2,4}\b",
        )
        .context("failed to compile date-like regex")?;
        Ok(Self { regex })
    }

    pub(crate) fn is_match(&self, line: &str) -> bool {
        let mut start = 0;
        while let Some(found) = self.regex.find_at(line, start) {
            if !touches_clock_time(line, found.start(), found.end()) {
                return true;
            }
            start = found.start()
                + line[found.start()..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
        }
        false
    }
}

fn touches_clock_time(line: &str, start: usize, end: usize) -> bool {
    let before = line[..start].chars().rev().take(2).collect::<Vec<char>>();
    let clock_before = matches!(
        before.as_slice(),
        [separator, digit] if matches!(*separator, '.' | ':') && digit.is_ascii_digit()
    );

    let mut after = line[end..].chars();
    let clock_after = matches!(
        (after.next(), after.next()),
        (Some('.' | ':'), Some(digit)) if digit.is_ascii_digit()
    );

    clock_before || clock_after
}

fn is_upper_case_line(line: &str) -> bool {
    line.chars()
        .filter(|character| character.is_alphabetic())
        .all(|character| !character.is_lowercase())
}

fn is_title_case_line(line: &str) -> bool {
    line.split_whitespace()
        .map(|word| word.trim_matches(|character: char| !character.is_alphabetic()))
        .filter(|word| word.chars().count() >= 4)
        .all(|word| word.chars().next().is_some_and(char::is_uppercase))
}

pub(crate) fn normalize_line(raw: &str) -> String {
    condense_whitespace(&raw.replace('\u{0000}', ""))
}

fn normalize_edge_line(input: &str) -> String {
    normalize_line(input).to_lowercase()
}

fn detect_repeated_edge_lines(pages: &[String]) -> HashSet<String> {
    let mut counts = HashMap::<String, usize>::new();
    for page in pages {
        let lines = page
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<&str>>();
        let mut edges = HashSet::new();
        if let Some(first) = lines.first() {
            edges.insert(normalize_edge_line(first));
        }
        if let Some(last) = lines.last() {
            edges.insert(normalize_edge_line(last));
        }

        for edge in edges {
            if edge.is_empty() || edge.len() > EDGE_LINE_MAX_LEN {
                continue;
            }
            *counts.entry(edge).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .filter_map(|(candidate, count)| {
            if count >= REPEATED_EDGE_MIN_PAGES {
                Some(candidate)
            } else {
                None
            }
        })
        .collect()
}

#[derive(Debug)]
struct BlockDraft {
    page: usize,
    heading: Option<String>,
    body: Vec<String>,
    month_columns: Vec<MonthColumn>,
}

impl BlockDraft {
    fn is_bare_heading(&self) -> bool {
        self.heading.is_some() && self.body.is_empty()
    }
}

struct PageCursor<'a> {
    number: usize,
    lines: Vec<&'a str>,
    position: usize,
    first_content: Option<usize>,
    last_content: Option<usize>,
}

impl<'a> PageCursor<'a> {
    fn new(index: usize, text: &'a str) -> Self {
        let lines = text.lines().collect::<Vec<&str>>();
        let first_content = lines.iter().position(|line| !line.trim().is_empty());
        let last_content = lines.iter().rposition(|line| !line.trim().is_empty());
        Self {
            number: index + 1,
            lines,
            position: 0,
            first_content,
            last_content,
        }
    }

    fn is_edge(&self, position: usize) -> bool {
        self.first_content == Some(position) || self.last_content == Some(position)
    }
}

/// Iterator returned by [`BlockExtractor::segment`].
pub struct Blocks<'a> {
    extractor: &'a BlockExtractor,
    pages: std::iter::Enumerate<std::slice::Iter<'a, String>>,
    repeated_edges: HashSet<String>,
    page: Option<PageCursor<'a>>,
    current: Option<BlockDraft>,
    // Month headers carry over pages until a new header run replaces them.
    columns: Vec<MonthColumn>,
    header_run: bool,
    next_index: usize,
}

impl Blocks<'_> {
    fn start_draft(&self, page: usize, heading: Option<String>, body: Vec<String>) -> BlockDraft {
        BlockDraft {
            page,
            heading,
            body,
            month_columns: self.columns.clone(),
        }
    }

    fn finish(&mut self, draft: BlockDraft) -> CandidateBlock {
        let block = CandidateBlock {
            index: self.next_index,
            page: draft.page,
            heading: draft.heading,
            body: draft.body,
            month_columns: draft.month_columns,
        };
        self.next_index += 1;
        block
    }
}

impl Iterator for Blocks<'_> {
    type Item = CandidateBlock;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(page) = self.page.as_mut() else {
                let (index, text) = self.pages.next()?;
                self.page = Some(PageCursor::new(index, text));
                continue;
            };

            let Some(raw_line) = page.lines.get(page.position).copied() else {
                // Blocks never span a page boundary.
                self.page = None;
                self.header_run = false;
                if let Some(draft) = self.current.take() {
                    return Some(self.finish(draft));
                }
                continue;
            };
            let position = page.position;
            page.position += 1;
            let page_number = page.number;
            let is_edge = page.is_edge(position);

            let line = normalize_line(raw_line);
            if line.is_empty() || self.extractor.is_anchor(&line) {
                continue;
            }

            if let Some((month, year)) = month_year_header(&line) {
                if !self.header_run {
                    self.columns.clear();
                    self.header_run = true;
                }
                self.columns.push(MonthColumn { month, year });
                if let Some(draft) = self.current.take() {
                    return Some(self.finish(draft));
                }
                continue;
            }

            if is_edge
                && (self.extractor.is_page_number(&line)
                    || self.repeated_edges.contains(&line.to_lowercase()))
            {
                continue;
            }
            self.header_run = false;

            if self.extractor.is_heading(&line) {
                // A subject wrapped over two lines continues the bare heading.
                if let Some(draft) = self.current.as_mut().filter(|draft| draft.is_bare_heading()) {
                    if let Some(heading) = draft.heading.as_mut() {
                        heading.push(' ');
                        heading.push_str(&line);
                    }
                    continue;
                }

                let draft = self.start_draft(page_number, Some(line), Vec::new());
                if let Some(previous) = self.current.replace(draft) {
                    return Some(self.finish(previous));
                }
                continue;
            }

            match self.current.as_mut() {
                Some(draft) => draft.body.push(line),
                None => {
                    self.current = Some(self.start_draft(page_number, None, vec![line]));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> BlockExtractor {
        BlockExtractor::new(&AnchorConfig::default()).expect("default anchors compile")
    }

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|text| text.to_string()).collect()
    }

    #[test]
    fn segment_groups_heading_with_following_lines() {
        let extractor = extractor();
        let pages = pages(&["ANALISI MATEMATICA I\nLunedì 15 Gennaio 2027\nore 9:00\nFisica Generale\n20/01/2027"]);

        let blocks = extractor.segment(&pages).collect::<Vec<_>>();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].index, 0);
        assert_eq!(blocks[0].heading.as_deref(), Some("ANALISI MATEMATICA I"));
        assert_eq!(blocks[0].body, vec!["Lunedì 15 Gennaio 2027", "ore 9:00"]);
        assert_eq!(blocks[1].index, 1);
        assert_eq!(blocks[1].heading.as_deref(), Some("Fisica Generale"));
        assert_eq!(blocks[1].body, vec!["20/01/2027"]);
    }

    #[test]
    fn segment_drops_anchor_phrases_and_page_numbers() {
        let extractor = extractor();
        let pages = pages(&[
            "CALENDARIO ESAMI A.A. 2026/27\nINSEGNAMENTO   DATA\nPRIMO ANNO\nALGORITMI\n12/02/2027\nAula 3\nPag. 1 di 4\n",
        ]);

        let blocks = extractor.segment(&pages).collect::<Vec<_>>();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].heading.as_deref(), Some("ALGORITMI"));
        assert_eq!(blocks[0].body, vec!["12/02/2027"]);
    }

    #[test]
    fn segment_closes_blocks_at_page_boundaries() {
        let extractor = extractor();
        let pages = pages(&["BASI DI DATI\n", "10/02/2027\nRETI\n11/02/2027"]);

        let blocks = extractor.segment(&pages).collect::<Vec<_>>();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].heading.as_deref(), Some("BASI DI DATI"));
        assert!(blocks[0].body.is_empty());
        assert_eq!(blocks[1].page, 2);
        assert_eq!(blocks[1].heading, None);
        assert_eq!(blocks[1].body, vec!["10/02/2027"]);
        assert_eq!(blocks[2].heading.as_deref(), Some("RETI"));
    }

    #[test]
    fn segment_drops_lines_repeated_on_page_edges() {
        let extractor = extractor();
        let page = "Anno Accademico Corrente\nLOGICA\n01/03/2027\nversione finale";
        let pages = pages(&[page, page, page]);

        let blocks = extractor.segment(&pages).collect::<Vec<_>>();

        assert_eq!(blocks.len(), 3);
        for block in &blocks {
            assert_eq!(block.heading.as_deref(), Some("LOGICA"));
            assert_eq!(block.body, vec!["01/03/2027"]);
        }
    }

    #[test]
    fn segment_is_restartable_and_deterministic() {
        let extractor = extractor();
        let pages = pages(&["GEOMETRIA\n3 feb 2027\nALGEBRA\n4 feb 2027", "STATISTICA\n5 feb 2027"]);

        let first = extractor.segment(&pages).collect::<Vec<_>>();
        let second = extractor.segment(&pages).collect::<Vec<_>>();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn segment_tolerates_garbage_input() {
        let extractor = extractor();
        let pages = pages(&["\u{0000}\u{0000}", "", "   \n\t\n", "%%% ### 12/99"]);

        let blocks = extractor.segment(&pages).collect::<Vec<_>>();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].heading, None);
    }

    #[test]
    fn heading_detection_skips_date_and_weekday_lines() {
        let extractor = extractor();
        assert!(extractor.is_heading("ANALISI MATEMATICA I"));
        assert!(extractor.is_heading("Programmazione e Laboratorio"));
        assert!(!extractor.is_heading("Lunedì 15 Gennaio 2027"));
        assert!(!extractor.is_heading("GENNAIO"));
        assert!(!extractor.is_heading("ore 9:00"));
        assert!(!extractor.is_heading("I"));
    }

    #[test]
    fn anchor_config_deserializes_from_json() {
        let config: AnchorConfig = serde_json::from_str(
            r#"{"boilerplate_phrases": ["SESSIONE STRAORDINARIA"], "page_number_patterns": []}"#,
        )
        .expect("config should parse");
        let extractor = BlockExtractor::new(&config).expect("config compiles");
        assert!(extractor.is_anchor("Sessione straordinaria 2027"));
        assert!(!extractor.is_page_number("12"));
    }

    #[test]
    fn segment_joins_a_subject_wrapped_over_two_lines() {
        let extractor = extractor();
        let pages = pages(&["ELEMENTI DI ANALISI\nMATEMATICA\n15/01/2027\nRETI\nda definire\nLOGICA\n01/03/2027"]);

        let blocks = extractor.segment(&pages).collect::<Vec<_>>();

        let headings = blocks
            .iter()
            .map(|block| block.heading.as_deref())
            .collect::<Vec<_>>();
        assert_eq!(
            headings,
            vec![Some("ELEMENTI DI ANALISI MATEMATICA"), Some("RETI"), Some("LOGICA")]
        );
        assert_eq!(blocks[0].body, vec!["15/01/2027"]);
    }

    #[test]
    fn segment_attaches_month_headers_and_keeps_day_cells() {
        let extractor = extractor();
        let pages = pages(&[
            "INSEGNAMENTO\nGennaio 2027\nFebbraio 2027\nALGEBRA LINEARE\n15\n9 e 23\nLOGICA\n12, 26\n3",
        ]);

        let blocks = extractor.segment(&pages).collect::<Vec<_>>();

        assert_eq!(blocks.len(), 2);
        let columns = vec![
            MonthColumn { month: 1, year: 2027 },
            MonthColumn { month: 2, year: 2027 },
        ];
        assert_eq!(blocks[0].heading.as_deref(), Some("ALGEBRA LINEARE"));
        assert_eq!(blocks[0].body, vec!["15", "9 e 23"]);
        assert_eq!(blocks[0].month_columns, columns);
        assert_eq!(blocks[1].body, vec!["12, 26"]);
        assert_eq!(blocks[1].month_columns, columns);
    }

    #[test]
    fn a_new_header_run_replaces_the_month_columns() {
        let extractor = extractor();
        let pages = pages(&[
            "Gennaio 2027\nRETI\n12\nMarzo 2027\nAprile 2027\nLOGICA\n4, 18\nfine",
        ]);

        let blocks = extractor.segment(&pages).collect::<Vec<_>>();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].month_columns, vec![MonthColumn { month: 1, year: 2027 }]);
        assert_eq!(
            blocks[1].month_columns,
            vec![
                MonthColumn { month: 3, year: 2027 },
                MonthColumn { month: 4, year: 2027 },
            ]
        );
    }

    #[test]
    fn date_like_ignores_clock_times() {
        let date_like = DateLike::new().expect("regex");
        assert!(date_like.is_match("15/01/2027"));
        assert!(date_like.is_match("15.01.2027"));
        assert!(date_like.is_match("Lunedì 15 Gennaio 2027"));
        assert!(date_like.is_match("ore 9:00 - 03/02/2027"));
        assert!(date_like.is_match("15/02/27"));
        assert!(!date_like.is_match("ore 9.30 - 11.30"));
        assert!(!date_like.is_match("9:30-11:30"));
        assert!(!date_like.is_match("Gennaio 2027"));
    }
}
