mod corpus;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ircore::persist::{load_index, save_index, IndexPaths};
use ircore::tokenizer::{Normalizer, NormalizerConfig};
use ircore::{DocId, DocMeta, IndexBuilder, IndexConfig, SearchIndex};
use tracing_subscriber::{fmt, EnvFilter};

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a term index and run boolean, wildcard and ranked queries against it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from TREC or JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Keep stopwords instead of removing them
        #[arg(long, default_value_t = false)]
        no_stopwords: bool,
        /// Index words unstemmed
        #[arg(long, default_value_t = false)]
        no_stemming: bool,
        /// Skip the permuterm index (wildcard queries will be rejected)
        #[arg(long, default_value_t = false)]
        no_wildcards: bool,
    },
    /// Ranked lnc.ltc retrieval, printed as TREC run lines
    Search {
        #[command(flatten)]
        run: RunArgs,
        /// Maximum number of results
        #[arg(long, default_value_t = 1000)]
        k: usize,
    },
    /// Boolean retrieval (AND, OR, XOR, NOT, AND NOT, OR NOT, parentheses)
    Boolean {
        #[command(flatten)]
        run: RunArgs,
    },
    /// List vocabulary terms matching a pattern with one '*'
    Wildcard {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        pattern: String,
        /// Also report how many permuterm tree nodes were visited
        #[arg(long, default_value_t = false)]
        stats: bool,
    },
    /// Show document frequency and postings for one term
    Lookup {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        term: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: String,
    /// Query string
    #[arg(long)]
    query: String,
    #[arg(long, default_value = "1")]
    query_id: String,
    #[arg(long, default_value = "lnc.ltc")]
    run_tag: String,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, no_stopwords, no_stemming, no_wildcards } => {
            let config = IndexConfig {
                wildcards: !no_wildcards,
                normalizer: NormalizerConfig { stopwords: !no_stopwords, stemming: !no_stemming },
            };
            build_index(&input, &output, config)
        }
        Commands::Search { run, k } => {
            let (index, _, _) = load_index(&IndexPaths::new(&run.index))?;
            let ranked = index.rank(&run.query)?;
            for line in trec_lines(&run.query_id, &run.run_tag, ranked.into_iter().take(k)) {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Boolean { run } => {
            let (index, _, _) = load_index(&IndexPaths::new(&run.index))?;
            let hits = index.boolean(&run.query)?;
            if hits.is_empty() {
                tracing::info!(query = %run.query, "no matching documents");
            }
            for line in trec_lines(&run.query_id, &run.run_tag, hits.into_iter().map(|d| (d, 1.0))) {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Wildcard { index, pattern, stats } => {
            let (index, _, _) = load_index(&IndexPaths::new(&index))?;
            let expansion = index.expand_wildcard(&pattern)?;
            if expansion.terms.is_empty() {
                println!("No matching terms.");
            }
            for term in &expansion.terms {
                println!("{term}\t{}", index.inverted().document_frequency(term));
            }
            if stats {
                println!("nodes visited: {}", expansion.nodes_visited);
            }
            Ok(())
        }
        Commands::Lookup { index, term } => {
            let (index, _, _) = load_index(&IndexPaths::new(&index))?;
            lookup(&index, &term);
            Ok(())
        }
    }
}

/// `queryId Q0 docId rank score runTag`, ranks starting at 1.
fn trec_lines<'a>(
    query_id: &'a str,
    run_tag: &'a str,
    results: impl IntoIterator<Item = (DocId, f64)> + 'a,
) -> impl Iterator<Item = String> + 'a {
    results
        .into_iter()
        .enumerate()
        .map(move |(i, (doc, score))| format!("{query_id} Q0 {doc} {} {score:.6} {run_tag}", i + 1))
}

fn lookup(index: &SearchIndex<DocId>, raw: &str) {
    for term in index.normalizer().normalize(raw) {
        match index.inverted().entry(&term) {
            Some(entry) => {
                println!("Term '{term}' appears in {} documents.", entry.document_frequency);
                for (doc, posting) in &entry.postings {
                    println!("  {doc}\ttf={}\tw={:.6}", posting.raw_term_frequency, posting.weight());
                }
            }
            None => println!("Term '{term}' not found in index."),
        }
    }
}

fn build_index(input: &str, output: &str, config: IndexConfig) -> Result<()> {
    let out_paths = IndexPaths::new(output);
    fs::create_dir_all(out_paths.texts_dir())?;

    let mut builder = IndexBuilder::<DocId>::new(config);
    let mut docs: HashMap<DocId, DocMeta> = HashMap::new();
    let mut next_text_id: usize = 0;

    let files = corpus::collect_files(Path::new(input));
    tracing::info!(files = files.len(), input, "reading corpus");
    for file in files {
        let parsed = corpus::read_documents(&file)?;
        tracing::debug!(file = %file.display(), docs = parsed.len(), "parsed file");
        for doc in parsed {
            let text = doc.full_text();
            builder.add_document(doc.id.clone(), &text);

            if let Some(meta) = docs.get_mut(&doc.id) {
                tracing::warn!(doc_id = %doc.id, "duplicate document id, merging text");
                if meta.title.is_none() {
                    meta.title = doc.title;
                }
                if let Some(rel) = &meta.text_path {
                    let mut f = OpenOptions::new().append(true).open(out_paths.root.join(rel))?;
                    write!(f, "\n{text}")?;
                }
                continue;
            }

            // Write text for snippet extraction
            let text_rel = format!("texts/{next_text_id}.txt");
            next_text_id += 1;
            fs::write(out_paths.root.join(&text_rel), &text)?;
            docs.insert(doc.id, DocMeta { title: doc.title, text_path: Some(text_rel) });
        }
    }

    tracing::info!(num_docs = docs.len(), "ingested documents");
    let index = builder.build();
    save_index(&out_paths, &index, &docs)?;
    tracing::info!(output, "index build complete");
    Ok(())
}
