//! Tesseract OCR backend
//!
//! Each orientation gets its own engine instance: `jpn` for horizontal text,
//! `jpn_vert` for vertical. The engine handle is not `Send`, so every
//! instance lives on a dedicated worker thread that owns it for the process
//! lifetime; recognition requests are shipped over a channel and answered
//! through a oneshot. That also serializes calls per instance for free.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use crossbeam_channel::{Receiver, Sender};
use tesseract::Tesseract;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::ocr::{
    RecognitionOutput, RecognizedBlock, RecognizedLine, RecognizedParagraph, RecognizedWord,
    RecognizerFactory, TextRecognizer,
};
use super::Orientation;
use crate::capture::frame::Frame;
use crate::config::OcrSettings;
use crate::error::{ScanError, ScanResult};

/// Engine parameters tuned for sparse, irregular print
///
/// Character chopping stays on for dense kanji strokes, and the n-gram
/// language model stays off so out-of-dictionary proper nouns are not
/// penalized.
const ENGINE_PARAMS: &[(&str, &str)] = &[
    // Automatic page segmentation
    ("tessedit_pageseg_mode", "3"),
    ("chop_enable", "1"),
    ("use_new_state_cost", "0"),
    ("segment_segcost_rating", "0"),
    ("enable_new_segsearch", "0"),
    ("language_model_ngram_on", "0"),
    ("textord_force_make_prop_words", "1"),
    ("edges_max_children_per_outline", "40"),
];

struct Job {
    frame: Frame,
    reply: oneshot::Sender<ScanResult<RecognitionOutput>>,
}

/// A cached Tesseract instance living on its own worker thread
pub struct TesseractRecognizer {
    jobs: Sender<Job>,
}

impl TesseractRecognizer {
    /// Spawn the worker and initialize the engine for a language profile
    ///
    /// Returns once the traineddata has loaded and the parameter set is
    /// applied, or with the initialization error.
    pub async fn spawn(datapath: Option<PathBuf>, lang: String) -> ScanResult<Self> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let (ready_tx, ready_rx) = oneshot::channel::<ScanResult<()>>();

        let thread_lang = lang.clone();
        std::thread::Builder::new()
            .name(format!("tesseract-{lang}"))
            .spawn(move || {
                match init_engine(datapath, &thread_lang) {
                    Ok(engine) => {
                        let _ = ready_tx.send(Ok(()));
                        run_worker(engine, job_rx);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                };
            })
            .map_err(|e| ScanError::Recognition(format!("worker thread spawn failed: {e}")))?;

        ready_rx
            .await
            .map_err(|_| ScanError::Recognition("worker exited during initialization".into()))??;

        info!("Tesseract engine ready for language '{}'", lang);
        Ok(Self { jobs: job_tx })
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, frame: &Frame) -> ScanResult<RecognitionOutput> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Job {
                frame: frame.clone(),
                reply,
            })
            .map_err(|_| ScanError::Recognition("engine thread has exited".into()))?;

        response
            .await
            .map_err(|_| ScanError::Recognition("engine thread dropped the request".into()))?
    }
}

/// Factory handing out one worker-backed instance per orientation
pub struct TesseractFactory {
    settings: OcrSettings,
}

impl TesseractFactory {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl RecognizerFactory for TesseractFactory {
    async fn create(&self, orientation: Orientation) -> ScanResult<Arc<dyn TextRecognizer>> {
        let lang = match orientation {
            Orientation::Horizontal => self.settings.horizontal_lang.clone(),
            Orientation::Vertical => self.settings.vertical_lang.clone(),
        };
        let recognizer = TesseractRecognizer::spawn(self.settings.datapath.clone(), lang).await?;
        Ok(Arc::new(recognizer))
    }
}

fn init_engine(datapath: Option<PathBuf>, lang: &str) -> ScanResult<Tesseract> {
    let datapath = datapath.as_ref().and_then(|p| p.to_str().map(String::from));
    let mut engine = Tesseract::new(datapath.as_deref(), Some(lang))
        .map_err(|e| ScanError::Recognition(format!("init for '{lang}' failed: {e}")))?;

    for (name, value) in ENGINE_PARAMS {
        engine = engine
            .set_variable(name, value)
            .map_err(|e| ScanError::Recognition(format!("setting {name}={value} failed: {e}")))?;
    }
    Ok(engine)
}

fn run_worker(engine: Tesseract, jobs: Receiver<Job>) {
    // The recognize chain consumes the handle, so it moves out of and back
    // into this slot around every call; a failed FFI call forfeits it.
    let mut slot = Some(engine);
    for job in jobs {
        let result = match slot.take() {
            Some(engine) => match recognize_frame(engine, &job.frame) {
                Ok((engine, output)) => {
                    slot = Some(engine);
                    Ok(output)
                }
                Err(e) => Err(e),
            },
            None => Err(ScanError::Recognition(
                "engine lost to a previous failure".into(),
            )),
        };
        let _ = job.reply.send(result);
    }
    debug!("Tesseract worker shutting down");
}

fn recognize_frame(engine: Tesseract, frame: &Frame) -> ScanResult<(Tesseract, RecognitionOutput)> {
    let (width, height) = frame.dimensions();
    let engine = engine
        .set_frame(
            frame.data(),
            width as i32,
            height as i32,
            4,
            (width * 4) as i32,
        )
        .map_err(|e| ScanError::Recognition(format!("set_frame failed: {e}")))?;
    let mut engine = engine
        .recognize()
        .map_err(|e| ScanError::Recognition(format!("recognize failed: {e}")))?;
    let tsv = engine
        .get_tsv_text(0)
        .map_err(|e| ScanError::Recognition(format!("reading TSV output failed: {e}")))?;

    Ok((engine, parse_tsv(&tsv)))
}

/// Rebuild the block/paragraph/line/word hierarchy from Tesseract TSV rows
///
/// Columns: level, page, block, paragraph, line, word, left, top, width,
/// height, confidence, text. Word rows carry level 5; the grouping columns
/// say which block, paragraph, and line each word belongs to.
pub(crate) fn parse_tsv(tsv: &str) -> RecognitionOutput {
    let mut output = RecognitionOutput::default();
    let mut current: Option<(u32, u32, u32)> = None;

    for row in tsv.lines() {
        let columns: Vec<&str> = row.splitn(12, '\t').collect();
        if columns.len() < 12 || columns[0] != "5" {
            continue;
        }
        let (Ok(block), Ok(paragraph), Ok(line)) = (
            columns[2].parse::<u32>(),
            columns[3].parse::<u32>(),
            columns[4].parse::<u32>(),
        ) else {
            continue;
        };
        let text = columns[11].trim_end();
        if text.is_empty() {
            continue;
        }

        match current {
            Some((b, p, l)) if (b, p, l) == (block, paragraph, line) => {}
            Some((b, p, _)) if (b, p) == (block, paragraph) => {
                last_paragraph(&mut output).lines.push(RecognizedLine::default());
            }
            Some((b, _, _)) if b == block => {
                last_block(&mut output)
                    .paragraphs
                    .push(RecognizedParagraph {
                        lines: vec![RecognizedLine::default()],
                    });
            }
            _ => {
                output.blocks.push(RecognizedBlock {
                    paragraphs: vec![RecognizedParagraph {
                        lines: vec![RecognizedLine::default()],
                    }],
                });
            }
        }
        current = Some((block, paragraph, line));

        last_line(&mut output).words.push(RecognizedWord {
            text: text.to_string(),
        });
    }

    output
}

fn last_block(output: &mut RecognitionOutput) -> &mut RecognizedBlock {
    output.blocks.last_mut().expect("a block was just pushed")
}

fn last_paragraph(output: &mut RecognitionOutput) -> &mut RecognizedParagraph {
    last_block(output)
        .paragraphs
        .last_mut()
        .expect("a paragraph was just pushed")
}

fn last_line(output: &mut RecognitionOutput) -> &mut RecognizedLine {
    last_paragraph(output)
        .lines
        .last_mut()
        .expect("a line was just pushed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::ocr::flatten_lines;

    const SAMPLE_TSV: &str = "\
1\t1\t0\t0\t0\t0\t0\t0\t100\t40\t-1\t\n\
2\t1\t1\t0\t0\t0\t4\t4\t90\t30\t-1\t\n\
3\t1\t1\t1\t0\t0\t4\t4\t90\t30\t-1\t\n\
4\t1\t1\t1\t1\t0\t4\t4\t90\t12\t-1\t\n\
5\t1\t1\t1\t1\t1\t4\t4\t30\t12\t91.2\tすもも\n\
5\t1\t1\t1\t1\t2\t36\t4\t28\t12\t88.0\tももも\n\
4\t1\t1\t1\t2\t0\t4\t20\t90\t12\t-1\t\n\
5\t1\t1\t1\t2\t1\t4\t20\t44\t12\t90.1\tもものうち\n\
2\t1\t2\t0\t0\t0\t4\t60\t90\t30\t-1\t\n\
5\t1\t2\t1\t1\t1\t4\t60\t20\t12\t77.7\t別段\n";

    #[test]
    fn test_parse_tsv_rebuilds_hierarchy() {
        let output = parse_tsv(SAMPLE_TSV);

        assert_eq!(output.blocks.len(), 2);
        assert_eq!(output.blocks[0].paragraphs.len(), 1);
        assert_eq!(output.blocks[0].paragraphs[0].lines.len(), 2);
        assert_eq!(output.blocks[0].paragraphs[0].lines[0].words.len(), 2);
        assert_eq!(output.blocks[1].paragraphs[0].lines[0].words.len(), 1);
    }

    #[test]
    fn test_parsed_lines_flatten_without_separators() {
        let output = parse_tsv(SAMPLE_TSV);
        let lines = flatten_lines(&output);

        assert_eq!(
            lines,
            vec![
                "すもももももも".to_string(),
                "もものうち".to_string(),
                "別段".to_string()
            ]
        );
    }

    #[test]
    fn test_non_word_and_empty_rows_are_skipped() {
        let output = parse_tsv("1\t1\t0\t0\t0\t0\t0\t0\t10\t10\t-1\t\n5\t1\t1\t1\t1\t1\t0\t0\t5\t5\t80.0\t\n");
        assert!(output.blocks.is_empty());
    }

    #[test]
    fn test_parse_tsv_of_empty_page() {
        let output = parse_tsv("");
        assert!(output.blocks.is_empty());
    }
}
