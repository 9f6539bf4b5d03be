//! Reading source documents: TREC `<DOC>` files and JSON/JSONL records.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

lazy_static! {
    static ref DOC_RE: Regex = Regex::new(r"(?is)<DOC>(.*?)</DOC>").expect("valid regex");
    static ref DOCNO_RE: Regex = Regex::new(r"(?is)<DOCNO>\s*(.*?)\s*</DOCNO>").expect("valid regex");
    static ref HEADLINE_RE: Regex = Regex::new(r"(?is)<HEADLINE>\s*(.*?)\s*</HEADLINE>").expect("valid regex");
    static ref TEXT_RE: Regex = Regex::new(r"(?is)<TEXT>\s*(.*?)\s*</TEXT>").expect("valid regex");
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceDoc {
    pub id: String,
    pub title: Option<String>,
    pub body: String,
}

impl SourceDoc {
    /// Headline and body joined, the text that gets indexed.
    pub fn full_text(&self) -> String {
        match &self.title {
            Some(title) => format!("{} {}", title, self.body).trim().to_string(),
            None => self.body.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(default)]
    title: Option<String>,
    body: String,
}

impl From<InputDoc> for SourceDoc {
    fn from(doc: InputDoc) -> Self {
        SourceDoc { id: doc.id, title: doc.title, body: doc.body }
    }
}

fn tag_content(re: &Regex, block: &str) -> String {
    re.captures(block).and_then(|c| c.get(1)).map(|m| m.as_str().trim().to_string()).unwrap_or_default()
}

/// Every `<DOC>` block carrying both a DOCNO and some text.
pub fn parse_trec(text: &str) -> Vec<SourceDoc> {
    let mut docs = Vec::new();
    for block in DOC_RE.captures_iter(text).filter_map(|c| c.get(1)) {
        let block = block.as_str();
        let id = tag_content(&DOCNO_RE, block);
        let headline = tag_content(&HEADLINE_RE, block);
        let body = tag_content(&TEXT_RE, block);
        if id.is_empty() || (headline.is_empty() && body.is_empty()) {
            tracing::warn!(docno = %id, "skipping TREC document without id or text");
            continue;
        }
        let title = if headline.is_empty() { None } else { Some(headline) };
        docs.push(SourceDoc { id, title, body });
    }
    docs
}

pub fn parse_jsonl(reader: impl BufRead) -> Result<Vec<SourceDoc>> {
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)?;
        docs.push(doc.into());
    }
    Ok(docs)
}

/// A single JSON object or an array of them.
pub fn parse_json(reader: impl std::io::Read) -> Result<Vec<SourceDoc>> {
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(|v| serde_json::from_value::<InputDoc>(v).map(SourceDoc::from))
            .collect::<Result<Vec<_>, _>>()?,
        serde_json::Value::Object(_) => vec![serde_json::from_value::<InputDoc>(json)?.into()],
        _ => Vec::new(),
    };
    Ok(docs)
}

/// Files under `input` (or `input` itself), sorted so builds are repeatable.
pub fn collect_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && !is_hidden(p) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files.sort();
    files
}

fn is_hidden(p: &Path) -> bool {
    p.file_name().and_then(|s| s.to_str()).map_or(false, |s| s.starts_with('.'))
}

/// Parses one file, choosing the format from its extension: `.json`,
/// `.jsonl`, anything else is read as TREC markup.
pub fn read_documents(file: &Path) -> Result<Vec<SourceDoc>> {
    match file.extension().and_then(|s| s.to_str()) {
        Some("jsonl") => {
            let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
            parse_jsonl(BufReader::new(f)).with_context(|| format!("parsing {}", file.display()))
        }
        Some("json") => {
            let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
            parse_json(BufReader::new(f)).with_context(|| format!("parsing {}", file.display()))
        }
        _ => {
            // TREC collections are not reliably UTF-8
            let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
            Ok(parse_trec(&String::from_utf8_lossy(&bytes)))
        }
    }
}
