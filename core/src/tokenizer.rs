use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Turns raw text into index terms. Indexing and querying must use the same
/// normalizer or lookups will miss.
pub trait Normalizer {
    fn normalize(&self, text: &str) -> Vec<String>;
}

/// Which optional steps [`TextNormalizer`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub stopwords: bool,
    pub stemming: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { stopwords: true, stemming: true }
    }
}

/// NFKC normalization, lowercasing, word extraction, then optional stopword
/// removal and English stemming. Words start with a letter, so numbers and
/// the `$`/`*` markers never become terms.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer {
    config: NormalizerConfig,
}

impl TextNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Lowercase word extraction only.
    pub fn plain() -> Self {
        Self::new(NormalizerConfig { stopwords: false, stemming: false })
    }

    pub fn config(&self) -> NormalizerConfig {
        self.config
    }
}

impl Normalizer for TextNormalizer {
    fn normalize(&self, text: &str) -> Vec<String> {
        tokenize_with(text, self.config).into_iter().map(|(term, _)| term).collect()
    }
}

/// Tokenize text into (term, position) using NFKC normalization, lowercase, stopword removal, and stemming.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    tokenize_with(text, NormalizerConfig::default())
}

fn tokenize_with(text: &str, config: NormalizerConfig) -> Vec<(String, usize)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for (pos, mat) in RE.find_iter(&normalized).enumerate() {
        let token = mat.as_str();
        if config.stopwords && is_stopword(token) { continue; }
        let term = if config.stemming { STEMMER.stem(token).to_string() } else { token.to_string() };
        tokens.push((term, pos));
    }
    tokens
}
