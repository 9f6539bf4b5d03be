use crate::search::{IndexConfig, SearchIndex};
use crate::tokenizer::TextNormalizer;
use crate::{DocId, DocMeta, InvertedIndex};
use anyhow::{bail, Context, Result};
use bincode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
    pub config: IndexConfig,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn inverted(&self) -> PathBuf { self.root.join("inverted.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    /// Directory holding one plain-text copy per document, for snippets.
    pub fn texts_dir(&self) -> PathBuf { self.root.join("texts") }
}

pub fn save_inverted(paths: &IndexPaths, index: &InvertedIndex<DocId>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.inverted())?;
    let bytes = bincode::serialize(index)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_inverted(paths: &IndexPaths) -> Result<InvertedIndex<DocId>> {
    let mut f = File::open(paths.inverted()).with_context(|| format!("opening {}", paths.inverted().display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let index = bincode::deserialize(&buf)?;
    Ok(index)
}

pub fn save_docs(paths: &IndexPaths, docs: &HashMap<DocId, DocMeta>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.docs())?;
    let bytes = bincode::serialize(docs)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_docs(paths: &IndexPaths) -> Result<HashMap<DocId, DocMeta>> {
    let mut f = File::open(paths.docs())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let docs = bincode::deserialize(&buf)?;
    Ok(docs)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    if meta.version > FORMAT_VERSION {
        bail!("index format version {} is newer than supported version {}", meta.version, FORMAT_VERSION);
    }
    Ok(meta)
}

/// Writes the inverted index, document metadata and `meta.json`. The trees
/// are not stored; they are rebuilt from the vocabulary on load.
pub fn save_index(paths: &IndexPaths, index: &SearchIndex<DocId>, docs: &HashMap<DocId, DocMeta>) -> Result<()> {
    save_inverted(paths, index.inverted())?;
    save_docs(paths, docs)?;
    let meta = MetaFile {
        num_docs: index.inverted().num_documents() as u32,
        num_terms: index.inverted().num_terms() as u32,
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: FORMAT_VERSION,
        config: index.config(),
    };
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "index saved");
    Ok(())
}

/// Loads a saved index and seals it with a normalizer configured exactly as
/// at build time.
pub fn load_index(paths: &IndexPaths) -> Result<(SearchIndex<DocId>, HashMap<DocId, DocMeta>, MetaFile)> {
    let meta = load_meta(paths)?;
    let inverted = load_inverted(paths)?;
    let docs = load_docs(paths)?;
    let index = SearchIndex::from_inverted(inverted, meta.config, TextNormalizer::new(meta.config.normalizer));
    Ok((index, docs, meta))
}
