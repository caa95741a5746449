//! Word segmentation via morphological analysis
//!
//! OCR output for Japanese arrives as unsegmented lines; the analyzer splits
//! each line into morphemes and is authoritative for every linguistic field.
//! One bad line yields an empty token list for that line only, so the rest of
//! a document still goes through.

pub mod mecab;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{ScanError, ScanResult};

/// One morpheme as reported by the analyzer
///
/// Field layout follows the standard analyzer output:
/// surface, then POS, three POS sub-categories, inflection type, inflection
/// form, dictionary form, reading, pronunciation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Morpheme {
    /// The word as it appears in the text
    pub surface: String,
    /// Part-of-speech tag (名詞, 動詞, 助詞, ...)
    pub part_of_speech: String,
    pub pos_detail1: String,
    pub pos_detail2: String,
    pub pos_detail3: String,
    /// Inflection type (五段・ラ行, 一段, ...), "*" when not applicable
    pub inflection_type: String,
    /// Inflection form (基本形, 未然形, ...), "*" when not applicable
    pub inflection_form: String,
    /// Dictionary (lemma) form
    pub dictionary_form: String,
    /// Reading, usually in katakana
    pub reading: String,
    /// Pronunciation; may differ from the reading for particles
    pub pronunciation: String,
}

/// The morphological analyzer contract
#[async_trait]
pub trait MorphAnalyzer: Send + Sync {
    /// Resolves once the analyzer is loaded; must complete before `query`
    async fn wait_ready(&self) -> ScanResult<()>;

    /// Whether readiness has been signalled
    fn is_ready(&self) -> bool;

    /// Analyze one line of text into ordered morphemes
    fn query(&self, text: &str) -> ScanResult<Vec<Morpheme>>;
}

/// Splits recognized lines into word tokens
pub struct Segmenter {
    analyzer: Arc<dyn MorphAnalyzer>,
}

impl Segmenter {
    pub fn new(analyzer: Arc<dyn MorphAnalyzer>) -> Self {
        Self { analyzer }
    }

    /// Wait for the underlying analyzer to come up
    pub async fn wait_ready(&self) -> ScanResult<()> {
        self.analyzer.wait_ready().await
    }

    /// Segment one line into morphemes
    ///
    /// Querying before the analyzer signalled readiness is a programming
    /// error and fails hard; an analysis failure for the line itself is
    /// absorbed into an empty token list.
    pub fn segment_line(&self, line: &str) -> ScanResult<Vec<Morpheme>> {
        if !self.analyzer.is_ready() {
            return Err(ScanError::AnalyzerNotReady);
        }

        match self.analyzer.query(line) {
            Ok(morphemes) => Ok(morphemes),
            Err(e) => {
                warn!("Analysis failed for line {:?}: {}", line, e);
                Ok(Vec::new())
            }
        }
    }

    /// Segment many lines; a failed line becomes an empty list, the rest
    /// still get processed.
    pub fn segment_lines(&self, lines: &[String]) -> ScanResult<Vec<Vec<Morpheme>>> {
        lines.iter().map(|line| self.segment_line(line)).collect()
    }
}

/// Extract the ordered word boundaries (surface forms) from tokens
pub fn surface_forms(morphemes: &[Morpheme]) -> Vec<String> {
    morphemes.iter().map(|m| m.surface.clone()).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Analyzer double that splits at fixed, pre-seeded boundaries
    pub(crate) struct FakeAnalyzer {
        ready: AtomicBool,
        /// (input line, morpheme surfaces) pairs
        entries: Vec<(String, Vec<String>)>,
        /// Lines whose analysis should fail
        pub failing: Vec<String>,
    }

    impl FakeAnalyzer {
        pub fn new(entries: &[(&str, &[&str])]) -> Self {
            Self {
                ready: AtomicBool::new(false),
                entries: entries
                    .iter()
                    .map(|(line, words)| {
                        (
                            (*line).to_string(),
                            words.iter().map(|w| (*w).to_string()).collect(),
                        )
                    })
                    .collect(),
                failing: Vec::new(),
            }
        }

        pub fn morpheme(surface: &str) -> Morpheme {
            Morpheme {
                surface: surface.to_string(),
                part_of_speech: "名詞".to_string(),
                pos_detail1: "一般".to_string(),
                pos_detail2: "*".to_string(),
                pos_detail3: "*".to_string(),
                inflection_type: "*".to_string(),
                inflection_form: "*".to_string(),
                dictionary_form: surface.to_string(),
                reading: "*".to_string(),
                pronunciation: "*".to_string(),
            }
        }
    }

    #[async_trait]
    impl MorphAnalyzer for FakeAnalyzer {
        async fn wait_ready(&self) -> ScanResult<()> {
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        fn query(&self, text: &str) -> ScanResult<Vec<Morpheme>> {
            if self.failing.iter().any(|l| l == text) {
                return Err(ScanError::Capture("scripted analysis failure".into()));
            }
            let surfaces = self
                .entries
                .iter()
                .find(|(line, _)| line == text)
                .map(|(_, words)| words.clone())
                .unwrap_or_else(|| vec![text.to_string()]);
            Ok(surfaces.iter().map(|s| Self::morpheme(s)).collect())
        }
    }
}
