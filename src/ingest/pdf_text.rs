use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

const PAGE_BREAK: char = '\u{000C}';

/// Per-page text for a `.pdf` (through `pdftotext`) or an already extracted
/// text file whose pages are separated by form feeds.
pub fn load_pages(path: &Path, max_pages: Option<usize>) -> Result<Vec<String>> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    let raw = if is_pdf {
        run_pdftotext(path, max_pages)?
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    };

    let mut pages = split_pages(&raw);
    if let Some(max_pages) = max_pages {
        pages.truncate(max_pages);
    }
    Ok(pages)
}

fn run_pdftotext(pdf_path: &Path, max_pages: Option<usize>) -> Result<String> {
    let mut command = Command::new("pdftotext");
    command.arg("-enc").arg("UTF-8").arg("-f").arg("1");
    if let Some(max_pages) = max_pages {
        command.arg("-l").arg(max_pages.to_string());
    }
    command.arg(pdf_path).arg("-");

    let output = command
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub(crate) fn split_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split(PAGE_BREAK)
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    pages
}
