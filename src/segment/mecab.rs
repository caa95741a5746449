//! MeCab analyzer backend
//!
//! Drives the `mecab` binary and parses its default output format: one
//! morpheme per line as `surface TAB pos,detail1,detail2,detail3,
//! inflection_type,inflection_form,dictionary_form,reading,pronunciation`,
//! terminated by `EOS`. Unknown words report fewer feature fields; missing
//! ones are filled with "*".

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{MorphAnalyzer, Morpheme};
use crate::config::SegmenterSettings;
use crate::error::{ScanError, ScanResult};

/// Morphological analyzer backed by a local MeCab installation
pub struct MecabAnalyzer {
    settings: SegmenterSettings,
    ready: AtomicBool,
    probe: OnceCell<()>,
}

impl MecabAnalyzer {
    pub fn new(settings: SegmenterSettings) -> Self {
        Self {
            settings,
            ready: AtomicBool::new(false),
            probe: OnceCell::new(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.settings.mecab_binary);
        if let Some(dicdir) = &self.settings.dicdir {
            command.arg("-d").arg(dicdir);
        }
        command
    }

    /// Run the binary once to confirm it is installed and usable
    async fn probe_binary(&self) -> ScanResult<()> {
        let mut command = self.command();
        command
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let binary = self.settings.mecab_binary.clone();
        let output = tokio::task::spawn_blocking(move || command.output())
            .await
            .map_err(|e| ScanError::Capture(format!("analyzer probe task failed: {e}")))?
            .map_err(|e| {
                ScanError::Capture(format!("analyzer binary {:?} not usable: {e}", binary))
            })?;

        if !output.status.success() {
            return Err(ScanError::Capture(format!(
                "analyzer probe exited with {}",
                output.status
            )));
        }

        info!(
            "Morphological analyzer ready: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}

#[async_trait]
impl MorphAnalyzer for MecabAnalyzer {
    /// At-most-once readiness probe; concurrent callers share the in-flight
    /// attempt.
    async fn wait_ready(&self) -> ScanResult<()> {
        self.probe
            .get_or_try_init(|| async {
                self.probe_binary().await?;
                self.ready.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await
            .map(|_| ())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn query(&self, text: &str) -> ScanResult<Vec<Morpheme>> {
        if !self.is_ready() {
            return Err(ScanError::AnalyzerNotReady);
        }

        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ScanError::Capture(format!("spawning analyzer failed: {e}")))?;

        child
            .stdin
            .take()
            .expect("stdin was requested piped")
            .write_all(text.as_bytes())
            .map_err(|e| ScanError::Capture(format!("writing to analyzer failed: {e}")))?;

        let output = child
            .wait_with_output()
            .map_err(|e| ScanError::Capture(format!("reading analyzer output failed: {e}")))?;
        if !output.status.success() {
            return Err(ScanError::Capture(format!(
                "analyzer exited with {}",
                output.status
            )));
        }

        let parsed = parse_output(&String::from_utf8_lossy(&output.stdout));
        debug!("Analyzer produced {} morpheme(s)", parsed.len());
        Ok(parsed)
    }
}

/// Parse default-format analyzer output into morphemes
pub(crate) fn parse_output(output: &str) -> Vec<Morpheme> {
    output
        .lines()
        .take_while(|line| *line != "EOS")
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<Morpheme> {
    let (surface, features) = line.split_once('\t')?;
    let mut fields = features.split(',');
    let mut next = || fields.next().unwrap_or("*").to_string();

    Some(Morpheme {
        surface: surface.to_string(),
        part_of_speech: next(),
        pos_detail1: next(),
        pos_detail2: next(),
        pos_detail3: next(),
        inflection_type: next(),
        inflection_form: next(),
        dictionary_form: next(),
        reading: next(),
        pronunciation: next(),
    })
}
