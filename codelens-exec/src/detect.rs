//! Best-effort language detection for requests that do not name one.
//!
//! Each language has a handful of weighted-by-count regex markers; the
//! language with the most matches wins. Detection never overrides an
//! explicit identifier, and a snippet with no markers is left undetected
//! rather than handed to a default interpreter.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::types::Language;

/// Identifiers that ask for detection instead of naming a language
pub const AUTO: &str = "auto";

struct Markers {
    language: Language,
    patterns: Vec<Regex>,
}

fn markers(language: Language, patterns: &[&str]) -> Markers {
    Markers {
        language,
        patterns: patterns
            .iter()
            .map(|p| Regex::new(&format!("(?m){}", p)).expect("detection pattern is valid"))
            .collect(),
    }
}

// Order matters on ties: the first language listed wins.
static MARKERS: LazyLock<Vec<Markers>> = LazyLock::new(|| {
    vec![
        markers(
            Language::Python,
            &[
                r"^\s*def\s+\w+\s*\(.*\)\s*:",
                r"^\s*from\s+[\w.]+\s+import\s+",
                r"^\s*import\s+\w+\s*$",
                r#"if\s+__name__\s*==\s*["']__main__["']"#,
                r"\bprint\s*\(",
                r"^\s*(elif|except|with)\b.*:\s*$",
                r"\bself\.",
            ],
        ),
        markers(
            Language::JavaScript,
            &[
                r"\bfunction\s+\w+\s*\(",
                r"\b(let|const|var)\s+\w+\s*=",
                r"=>",
                r"\bconsole\.log\s*\(",
                r"\brequire\s*\(",
                r"\bmodule\.exports\b",
            ],
        ),
        markers(
            Language::Java,
            &[
                r"\bpublic\s+class\s+\w+",
                r"\bpublic\s+static\s+void\s+main\b",
                r"\bSystem\.out\.print",
                r"^\s*import\s+java\.",
            ],
        ),
        markers(
            Language::Cpp,
            &[
                r"#include\s*<(iostream|vector|string|map|algorithm|bits/stdc\+\+\.h)>",
                r"\bstd::",
                r"\bcout\s*<<",
                r"\bcin\s*>>",
                r"\busing\s+namespace\s+std\b",
            ],
        ),
        markers(
            Language::C,
            &[
                r"#include\s*<(stdio|stdlib|string|math)\.h>",
                r"\bprintf\s*\(",
                r"\bscanf\s*\(",
                r"\bmalloc\s*\(",
            ],
        ),
        markers(
            Language::Rust,
            &[
                r"\bfn\s+\w+\s*\(",
                r"\blet\s+mut\s+\w+",
                r"\bprintln!\s*\(",
                r"^\s*use\s+std::",
                r"^\s*impl\b",
            ],
        ),
    ]
});

/// Whether `language_id` asks for detection
pub fn wants_detection(language_id: &str) -> bool {
    let id = language_id.trim();
    id.is_empty() || id.eq_ignore_ascii_case(AUTO)
}

/// Guess the language of `code`, or `None` when nothing matches
pub fn detect_language(code: &str) -> Option<Language> {
    let mut best: Option<(Language, usize)> = None;

    for entry in MARKERS.iter() {
        let score: usize = entry
            .patterns
            .iter()
            .map(|pattern| pattern.find_iter(code).count())
            .sum();
        debug!("Detection score for {}: {}", entry.language, score);

        if score > 0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((entry.language, score));
        }
    }

    best.map(|(language, _)| language)
}

/// Resolve the identifier a request should run under: explicit identifiers
/// pass through untouched, `auto`/empty ones are detected.
pub fn resolve_language_id(language_id: &str, code: &str) -> Option<String> {
    if wants_detection(language_id) {
        detect_language(code).map(|language| language.as_str().to_string())
    } else {
        Some(language_id.to_string())
    }
}
