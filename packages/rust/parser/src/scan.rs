//! Body scan: a single left-to-right pass over the lines after the title.
//!
//! The scan is a finite-state machine with three states:
//!
//! ```text
//!            label                fence
//!   Prose ─────────────▶ Example ───────▶ CodeBlock(owner = example)
//!     ▲  ◀───────────────   │  ◀──────────────┘ fence
//!     │     reference       │ label (flush + open new)
//!     │                     ▼
//!     └──── fence ───▶ CodeBlock(owner = none) ── fence ──▶ Prose
//! ```
//!
//! Inside a code block every line is taken verbatim until the closing fence.
//! Outside, each line is classified by [`LineKind::of`] in priority order:
//! impact, fence, example label, reference, plain text.

use std::sync::LazyLock;

use regex::Regex;

use rulebook_shared::{CodeExample, DEFAULT_LANGUAGE, Impact};

use crate::ParseDiagnostic;

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// `**Impact: HIGH (qualifier)**` or `**Impact:** HIGH (qualifier)`.
static IMPACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\*\*Impact:(?:\*\*)?\s*([A-Za-z]+(?:-[A-Za-z]+)*)\s*(?:\(([^)]+)\))?")
        .expect("impact regex")
});

/// `### Label`.
static LABEL_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^###\s+(.+)$").expect("label heading regex"));

/// `**Label:**` or `**Label (Description):**` on a line of its own.
static LABEL_BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*([^:]+?):\*?\*?$").expect("bold label regex"));

/// Splits `Label (Description)`.
static LABEL_DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+(?:\s+[A-Za-z]+)*)\s*\(([^()]+)\)$").expect("label description regex")
});

/// Markdown link `[text](url)`.
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link regex"));

const IMPACT_MARKER: &str = "**Impact:";
const FENCE: &str = "```";
const REFERENCE_PREFIXES: [&str; 3] = ["Reference:", "References:", "See "];

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// Classification of one line outside a code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineKind {
    Impact,
    Fence { language: String },
    Label {
        label: String,
        description: Option<String>,
    },
    Reference,
    Text,
    /// Blank lines and headings that are not example labels.
    Ignored,
}

impl LineKind {
    pub(crate) fn of(line: &str) -> Self {
        if line.contains(IMPACT_MARKER) {
            return LineKind::Impact;
        }

        if let Some(rest) = line.strip_prefix(FENCE) {
            let language = rest.trim();
            return LineKind::Fence {
                language: if language.is_empty() {
                    DEFAULT_LANGUAGE.to_string()
                } else {
                    language.to_string()
                },
            };
        }

        let label = LABEL_HEADING_RE
            .captures(line)
            .or_else(|| LABEL_BOLD_RE.captures(line));
        if let Some(caps) = label {
            let full = caps[1].trim();
            return match LABEL_DESCRIPTION_RE.captures(full) {
                Some(parts) => LineKind::Label {
                    label: parts[1].trim().to_string(),
                    description: Some(parts[2].trim().to_string()),
                },
                None => LineKind::Label {
                    label: full.to_string(),
                    description: None,
                },
            };
        }

        if REFERENCE_PREFIXES.iter().any(|p| line.starts_with(p)) {
            return LineKind::Reference;
        }

        if line.trim().is_empty() || line.starts_with('#') {
            return LineKind::Ignored;
        }

        LineKind::Text
    }
}

// ---------------------------------------------------------------------------
// Scanner state
// ---------------------------------------------------------------------------

/// An example being accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExampleDraft {
    label: String,
    description: Option<String>,
    code: String,
    language: String,
    trailing: Vec<String>,
}

impl ExampleDraft {
    fn new(label: String, description: Option<String>) -> Self {
        Self {
            label,
            description,
            code: String::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            trailing: Vec::new(),
        }
    }

    fn finish(self) -> CodeExample {
        CodeExample {
            label: self.label,
            description: self.description,
            code: self.code,
            language: self.language,
            additional_text: (!self.trailing.is_empty()).then(|| self.trailing.join("\n\n")),
        }
    }
}

/// An open fenced block and the example (if any) it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CodeBlock {
    owner: Option<ExampleDraft>,
    language: String,
    lines: Vec<String>,
    opened_at: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    Prose,
    Example(ExampleDraft),
    CodeBlock(CodeBlock),
}

impl ScanState {
    fn from_open(open: Option<ExampleDraft>) -> Self {
        match open {
            Some(draft) => ScanState::Example(draft),
            None => ScanState::Prose,
        }
    }
}

/// Fields recovered from the body scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ScannedBody {
    pub impact: Option<Impact>,
    pub impact_description: Option<String>,
    pub explanation: String,
    pub examples: Vec<CodeExample>,
    pub references: Vec<String>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// Line-driven scanner; feed lines in order, then call [`Scanner::finish`].
pub(crate) struct Scanner {
    state: ScanState,
    explanation: Vec<String>,
    body: ScannedBody,
}

impl Scanner {
    pub(crate) fn new() -> Self {
        Self {
            state: ScanState::Prose,
            explanation: Vec::new(),
            body: ScannedBody::default(),
        }
    }

    /// Consume one line. `line_no` is 1-based and only used for diagnostics.
    pub(crate) fn feed(&mut self, line_no: usize, line: &str) {
        let state = std::mem::replace(&mut self.state, ScanState::Prose);

        self.state = match state {
            ScanState::CodeBlock(mut block) => {
                if line.starts_with(FENCE) {
                    self.close_code_block(block, line_no)
                } else {
                    block.lines.push(line.to_string());
                    ScanState::CodeBlock(block)
                }
            }
            ScanState::Example(draft) => self.classify(Some(draft), line_no, line),
            ScanState::Prose => self.classify(None, line_no, line),
        };
    }

    fn classify(&mut self, open: Option<ExampleDraft>, line_no: usize, line: &str) -> ScanState {
        match LineKind::of(line) {
            LineKind::Impact => {
                self.apply_impact(line_no, line);
                ScanState::from_open(open)
            }
            LineKind::Fence { language } => ScanState::CodeBlock(CodeBlock {
                owner: open,
                language,
                lines: Vec::new(),
                opened_at: line_no,
            }),
            LineKind::Label { label, description } => {
                if let Some(draft) = open {
                    self.flush(draft);
                }
                ScanState::Example(ExampleDraft::new(label, description))
            }
            LineKind::Reference => {
                if let Some(draft) = open {
                    self.flush(draft);
                }
                self.collect_links(line_no, line);
                ScanState::Prose
            }
            LineKind::Text => match open {
                Some(mut draft) => {
                    draft.trailing.push(line.to_string());
                    ScanState::Example(draft)
                }
                None => {
                    self.explanation.push(line.to_string());
                    ScanState::Prose
                }
            },
            LineKind::Ignored => ScanState::from_open(open),
        }
    }

    fn close_code_block(&mut self, block: CodeBlock, line_no: usize) -> ScanState {
        match block.owner {
            Some(mut draft) => {
                draft.code = block.lines.join("\n");
                draft.language = block.language;
                ScanState::Example(draft)
            }
            None => {
                self.body
                    .diagnostics
                    .push(ParseDiagnostic::OrphanCodeBlock { line: block.opened_at });
                tracing::debug!(
                    opened_at = block.opened_at,
                    closed_at = line_no,
                    "code block outside any example dropped"
                );
                ScanState::Prose
            }
        }
    }

    fn apply_impact(&mut self, line_no: usize, line: &str) {
        let Some(caps) = IMPACT_RE.captures(line) else {
            return;
        };

        let word = &caps[1];
        match Impact::normalize(word) {
            Some(level) => self.body.impact = Some(level),
            None => self.body.diagnostics.push(ParseDiagnostic::UnknownImpact {
                line: line_no,
                value: word.to_string(),
            }),
        }
        self.body.impact_description = caps.get(2).map(|m| m.as_str().trim().to_string());
    }

    fn collect_links(&mut self, line_no: usize, line: &str) {
        let before = self.body.references.len();
        self.body.references.extend(
            LINK_RE
                .captures_iter(line)
                .map(|caps| caps[2].to_string()),
        );
        if self.body.references.len() == before {
            self.body
                .diagnostics
                .push(ParseDiagnostic::UnlinkedReference { line: line_no });
        }
    }

    fn flush(&mut self, draft: ExampleDraft) {
        self.body.examples.push(draft.finish());
    }

    /// End of input: flush any open example, keeping the partial code of an
    /// unterminated fence.
    pub(crate) fn finish(mut self) -> ScannedBody {
        let state = std::mem::replace(&mut self.state, ScanState::Prose);

        match state {
            ScanState::Prose => {}
            ScanState::Example(draft) => self.flush(draft),
            ScanState::CodeBlock(block) => {
                self.body
                    .diagnostics
                    .push(ParseDiagnostic::UnterminatedCodeFence { line: block.opened_at });
                match block.owner {
                    Some(mut draft) => {
                        draft.code = block.lines.join("\n");
                        draft.language = block.language;
                        self.flush(draft);
                    }
                    None => self
                        .body
                        .diagnostics
                        .push(ParseDiagnostic::OrphanCodeBlock { line: block.opened_at }),
                }
            }
        }

        self.body.explanation = self.explanation.join("\n\n").trim().to_string();
        self.body
    }
}
