//! Recognition adapter
//!
//! Owns one OCR engine instance per text orientation. Instances are expensive
//! to build and configured differently per orientation, so they are created
//! lazily, cached for the process lifetime, and never recreated per call.
//! Concurrent first callers share the in-flight initialization, and calls on
//! the same instance are serialized: the engines are not reentrant.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use super::Orientation;
use crate::capture::frame::Frame;
use crate::error::ScanResult;

/// One recognized word span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedWord {
    pub text: String,
}

/// A line of recognized words
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizedLine {
    pub words: Vec<RecognizedWord>,
}

/// A paragraph of recognized lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizedParagraph {
    pub lines: Vec<RecognizedLine>,
}

/// A page block of recognized paragraphs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizedBlock {
    pub paragraphs: Vec<RecognizedParagraph>,
}

/// Full hierarchical engine output
///
/// An empty block list means the engine found no text; that is a normal
/// outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognitionOutput {
    pub blocks: Vec<RecognizedBlock>,
}

/// A configured OCR engine instance for one orientation profile
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, frame: &Frame) -> ScanResult<RecognitionOutput>;
}

/// Builds engine instances on first use for an orientation
#[async_trait]
pub trait RecognizerFactory: Send + Sync {
    async fn create(&self, orientation: Orientation) -> ScanResult<Arc<dyn TextRecognizer>>;
}

struct EngineSlot {
    cell: OnceCell<Arc<dyn TextRecognizer>>,
    /// Serializes recognize calls against this instance
    in_use: Mutex<()>,
}

impl EngineSlot {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            in_use: Mutex::new(()),
        }
    }
}

/// Process-wide engine cache keyed by orientation
pub struct RecognizerRegistry {
    factory: Arc<dyn RecognizerFactory>,
    horizontal: EngineSlot,
    vertical: EngineSlot,
}

impl RecognizerRegistry {
    pub fn new(factory: Arc<dyn RecognizerFactory>) -> Self {
        Self {
            factory,
            horizontal: EngineSlot::new(),
            vertical: EngineSlot::new(),
        }
    }

    fn slot(&self, orientation: Orientation) -> &EngineSlot {
        match orientation {
            Orientation::Horizontal => &self.horizontal,
            Orientation::Vertical => &self.vertical,
        }
    }

    /// Get the cached engine for an orientation, initializing it on first use
    ///
    /// Concurrent first callers await the same initialization; the factory
    /// runs at most once per orientation.
    pub async fn engine(&self, orientation: Orientation) -> ScanResult<Arc<dyn TextRecognizer>> {
        let slot = self.slot(orientation);
        let engine = slot
            .cell
            .get_or_try_init(|| async {
                info!("Initializing {:?} recognition engine", orientation);
                self.factory.create(orientation).await
            })
            .await?;
        Ok(engine.clone())
    }

    /// Recognize text and flatten the result tree into line strings
    pub async fn recognize_lines(
        &self,
        frame: &Frame,
        orientation: Orientation,
    ) -> ScanResult<Vec<String>> {
        let engine = self.engine(orientation).await?;

        let _serialized = self.slot(orientation).in_use.lock().await;
        let output = engine.recognize(frame).await?;

        let lines = flatten_lines(&output);
        debug!(
            "{:?} recognition produced {} line(s)",
            orientation,
            lines.len()
        );
        Ok(lines)
    }
}

/// Flatten block -> paragraph -> line -> word into ordered line strings
///
/// Word spans are concatenated with no separator: engine word boundaries are
/// unreliable for Japanese, and true segmentation happens downstream.
pub fn flatten_lines(output: &RecognitionOutput) -> Vec<String> {
    output
        .blocks
        .iter()
        .flat_map(|block| &block.paragraphs)
        .flat_map(|paragraph| &paragraph.lines)
        .map(|line| {
            line.words
                .iter()
                .map(|word| word.text.as_str())
                .collect::<String>()
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::testing::{output_from_lines, CountingFactory};
    use super::*;
    use crate::capture::frame::testing::uniform_frame;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_flatten_concatenates_words_without_separator() {
        let output = output_from_lines(&[&["すもも", "もももも", "もものうち"], &["次", "の行"]]);
        let lines = flatten_lines(&output);

        assert_eq!(
            lines,
            vec!["すもももももももものうち".to_string(), "次の行".to_string()]
        );
    }

    #[test]
    fn test_flatten_empty_output_yields_no_lines() {
        let lines = flatten_lines(&RecognitionOutput::default());
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_sequential_calls_share_one_instance() {
        let factory = Arc::new(CountingFactory::new(output_from_lines(&[&["語"]])));
        let registry = RecognizerRegistry::new(factory.clone());
        let frame = uniform_frame(4, 4, 255);

        registry
            .recognize_lines(&frame, Orientation::Horizontal)
            .await
            .unwrap();
        registry
            .recognize_lines(&frame, Orientation::Horizontal)
            .await
            .unwrap();

        assert_eq!(factory.initializations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_orientations_get_separate_instances() {
        let factory = Arc::new(CountingFactory::new(output_from_lines(&[&["語"]])));
        let registry = RecognizerRegistry::new(factory.clone());
        let frame = uniform_frame(4, 4, 255);

        registry
            .recognize_lines(&frame, Orientation::Horizontal)
            .await
            .unwrap();
        registry
            .recognize_lines(&frame, Orientation::Vertical)
            .await
            .unwrap();

        assert_eq!(factory.initializations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_initializes_once() {
        let factory = Arc::new(CountingFactory::new(output_from_lines(&[&["語"]])));
        let registry = Arc::new(RecognizerRegistry::new(factory.clone()));
        let frame = uniform_frame(4, 4, 255);

        let (a, b) = tokio::join!(
            registry.recognize_lines(&frame, Orientation::Horizontal),
            registry.recognize_lines(&frame, Orientation::Horizontal),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(factory.initializations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_blocks_is_an_empty_sequence_not_an_error() {
        let factory = Arc::new(CountingFactory::new(RecognitionOutput::default()));
        let registry = RecognizerRegistry::new(factory);
        let frame = uniform_frame(4, 4, 255);

        let lines = registry
            .recognize_lines(&frame, Orientation::Horizontal)
            .await
            .unwrap();
        assert!(lines.is_empty());
    }
}
