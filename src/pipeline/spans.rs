use std::collections::HashMap;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::error::ExtractionError;
use crate::model::{PageText, TextSpan};
use crate::semantic::normalize_whitespace;

const PDFTOHTML: &str = "pdftohtml";
const PDFTOTEXT: &str = "pdftotext";
const PDFINFO: &str = "pdfinfo";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Source of positioned text for one PDF.
pub trait PdfBackend {
    /// Spans in reading order, optionally limited to the first `max_pages` pages.
    fn extract_spans(
        &self,
        path: &Path,
        max_pages: Option<u32>,
    ) -> Result<Vec<TextSpan>, ExtractionError>;

    /// Raw page text with line breaks, used by the paragraph fallback grouper.
    fn extract_page_texts(
        &self,
        path: &Path,
        max_pages: Option<u32>,
    ) -> Result<Vec<PageText>, ExtractionError>;

    fn metadata_title(&self, _path: &Path) -> Option<String> {
        None
    }
}

/// Poppler command-line tools (`pdftohtml`, `pdftotext`, `pdfinfo`) run under a
/// per-document wall-clock budget.
pub struct PopplerBackend {
    timeout_ms: u64,
    scanner: XmlSpanScanner,
}

impl PopplerBackend {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        Ok(Self {
            timeout_ms,
            scanner: XmlSpanScanner::new()?,
        })
    }
}

impl PdfBackend for PopplerBackend {
    fn extract_spans(
        &self,
        path: &Path,
        max_pages: Option<u32>,
    ) -> Result<Vec<TextSpan>, ExtractionError> {
        let mut command = Command::new(PDFTOHTML);
        command
            .arg("-xml")
            .arg("-i")
            .arg("-q")
            .arg("-fontfullname")
            .arg("-stdout")
            .arg("-f")
            .arg("1");
        if let Some(max_pages) = max_pages {
            command.arg("-l").arg(max_pages.to_string());
        }
        command.arg(path);

        let output = run_tool(command, PDFTOHTML, self.timeout_ms)?;
        let xml = String::from_utf8_lossy(&output);
        let spans = self.scanner.scan(&xml);
        debug!(path = %path.display(), spans = spans.len(), "pdftohtml spans parsed");
        Ok(spans)
    }

    fn extract_page_texts(
        &self,
        path: &Path,
        max_pages: Option<u32>,
    ) -> Result<Vec<PageText>, ExtractionError> {
        let mut command = Command::new(PDFTOTEXT);
        command.arg("-enc").arg("UTF-8").arg("-f").arg("1");
        if let Some(max_pages) = max_pages {
            command.arg("-l").arg(max_pages.to_string());
        }
        command.arg(path).arg("-");

        let output = run_tool(command, PDFTOTEXT, self.timeout_ms)?;
        Ok(split_pdftotext_pages(&String::from_utf8_lossy(&output)))
    }

    fn metadata_title(&self, path: &Path) -> Option<String> {
        let mut command = Command::new(PDFINFO);
        command.arg("-enc").arg("UTF-8").arg(path);

        match run_tool(command, PDFINFO, self.timeout_ms) {
            Ok(output) => parse_pdfinfo_title(&String::from_utf8_lossy(&output)),
            Err(error) => {
                debug!(path = %path.display(), error = %error, "pdfinfo title lookup failed");
                None
            }
        }
    }
}

/// Scans `pdftohtml -xml` output into spans. Font specs are declared once and
/// referenced by id from each `<text>` element.
struct XmlSpanScanner {
    element_regex: Regex,
    attribute_regex: Regex,
    markup_regex: Regex,
}

impl XmlSpanScanner {
    fn new() -> Result<Self> {
        Ok(Self {
            element_regex: Regex::new(
                r"(?s)<page\s+(?P<page>[^>]*)>|<fontspec\s+(?P<font>[^>]*?)/?>|<text\s+(?P<attrs>[^>]*)>(?P<body>.*?)</text>",
            )
            .context("failed to compile pdftohtml element regex")?,
            attribute_regex: Regex::new(r#"([A-Za-z_]+)="([^"]*)""#)
                .context("failed to compile pdftohtml attribute regex")?,
            markup_regex: Regex::new(r"<[^>]+>").context("failed to compile markup regex")?,
        })
    }

    fn scan(&self, xml: &str) -> Vec<TextSpan> {
        let mut fonts = HashMap::<String, (f32, String)>::new();
        let mut spans = Vec::<TextSpan>::new();
        let mut page = 1_u32;

        for captures in self.element_regex.captures_iter(xml) {
            if let Some(attrs) = captures.name("page") {
                let attrs = self.attributes(attrs.as_str());
                if let Some(number) = attrs.get("number").and_then(|value| value.parse().ok()) {
                    page = number;
                }
                continue;
            }

            if let Some(attrs) = captures.name("font") {
                let attrs = self.attributes(attrs.as_str());
                let Some(id) = attrs.get("id") else {
                    continue;
                };
                let size = attrs
                    .get("size")
                    .and_then(|value| value.parse::<f32>().ok())
                    .unwrap_or(0.0);
                let family = attrs.get("family").cloned().unwrap_or_default();
                fonts.insert(id.clone(), (size, family));
                continue;
            }

            let (Some(attrs), Some(body)) = (captures.name("attrs"), captures.name("body")) else {
                continue;
            };
            let attrs = self.attributes(attrs.as_str());
            let raw_body = body.as_str();
            let text = normalize_whitespace(&decode_entities(
                &self.markup_regex.replace_all(raw_body, " "),
            ));
            if text.is_empty() {
                continue;
            }

            let (font_size, family) = attrs
                .get("font")
                .and_then(|id| fonts.get(id))
                .cloned()
                .unwrap_or((0.0, String::new()));
            let marked_bold = raw_body.contains("<b>");
            let font_name = if marked_bold && !family.to_ascii_lowercase().contains("bold") {
                format!("{family},Bold")
            } else {
                family
            };

            spans.push(TextSpan::new(text, font_size, font_name, page));
        }

        spans
    }

    fn attributes(&self, raw: &str) -> HashMap<String, String> {
        self.attribute_regex
            .captures_iter(raw)
            .filter_map(|captures| {
                Some((
                    captures.get(1)?.as_str().to_string(),
                    decode_entities(captures.get(2)?.as_str()),
                ))
            })
            .collect()
    }
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#160;", " ")
        .replace("&nbsp;", " ")
        .replace('\u{00a0}', " ")
        .replace("&amp;", "&")
}

fn split_pdftotext_pages(raw: &str) -> Vec<PageText> {
    let mut pages = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect::<Vec<String>>();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    pages
        .into_iter()
        .enumerate()
        .map(|(index, text)| PageText {
            page: (index + 1) as u32,
            text,
        })
        .collect()
}

fn parse_pdfinfo_title(raw: &str) -> Option<String> {
    raw.lines()
        .find_map(|line| line.strip_prefix("Title:"))
        .map(normalize_whitespace)
        .filter(|title| !title.is_empty())
}

/// Runs an external tool and collects its stdout, killing it once `timeout_ms`
/// elapses. A zero budget waits indefinitely.
fn run_tool(
    mut command: Command,
    tool: &'static str,
    timeout_ms: u64,
) -> Result<Vec<u8>, ExtractionError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ExtractionError::ToolUnavailable { tool, source }
        } else {
            ExtractionError::Io(source)
        }
    })?;

    let stdout_reader = spawn_pipe_reader(child.stdout.take());
    let stderr_reader = spawn_pipe_reader(child.stderr.take());
    let started = Instant::now();

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }

        if timeout_ms > 0 && started.elapsed() >= Duration::from_millis(timeout_ms) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExtractionError::Timeout { tool, timeout_ms });
        }

        thread::sleep(POLL_INTERVAL);
    };

    let stdout = join_pipe_reader(stdout_reader)?;
    let stderr = join_pipe_reader(stderr_reader)?;

    if !status.success() {
        return Err(ExtractionError::ToolFailed {
            tool,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    Ok(stdout)
}

fn spawn_pipe_reader<R>(pipe: Option<R>) -> thread::JoinHandle<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_pipe_reader(
    handle: thread::JoinHandle<io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, ExtractionError> {
    handle
        .join()
        .map_err(|_| io::Error::other("pipe reader thread panicked"))?
        .map_err(ExtractionError::from)
}
