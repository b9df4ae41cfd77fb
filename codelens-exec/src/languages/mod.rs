//! Language profile registry
//!
//! A flat table keyed by [`Language`]. Each profile says where the snippet is
//! written, how it is compiled (if at all) and how it is run. The registry is
//! built once from the built-in table plus configuration overrides and is
//! read-only afterwards; callers share it behind an `Arc`.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use crate::{
    config::LanguageOverride,
    error::Error,
    types::Language,
    Result,
};

/// Name of the build artifact compiled languages produce inside the workspace.
pub const ARTIFACT_NAME: &str = "main";

// Anchored to a line start so mentions in comments and strings are skipped.
static JAVA_PUBLIC_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*public\s+(?:final\s+|abstract\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)")
        .expect("java class pattern is valid")
});

/// How the source file inside the workspace is named
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceNaming {
    /// Always the same stem, e.g. `main.py`
    Fixed(&'static str),
    /// Stem taken from the snippet's `public class`, as javac requires
    PublicClass { fallback: &'static str },
}

/// Concrete file names for one snippet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    pub file_name: String,
    pub stem: String,
}

#[derive(Debug, Clone)]
pub struct LanguageProfile {
    pub language: Language,
    pub extension: &'static str,
    pub naming: SourceNaming,
    /// argv template; `None` for interpreted languages
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
    pub compile_timeout: Duration,
    pub run_timeout: Duration,
    /// Extra environment for both phases
    pub env: Vec<(String, String)>,
}

impl LanguageProfile {
    pub fn needs_compilation(&self) -> bool {
        self.compile.is_some()
    }

    pub fn layout(&self, code: &str) -> SourceLayout {
        let stem = match self.naming {
            SourceNaming::Fixed(stem) => stem.to_string(),
            SourceNaming::PublicClass { fallback } => JAVA_PUBLIC_CLASS
                .captures(code)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| fallback.to_string()),
        };

        SourceLayout {
            file_name: format!("{}.{}", stem, self.extension),
            stem,
        }
    }

    pub fn compile_command(&self, layout: &SourceLayout) -> Option<Vec<String>> {
        self.compile
            .as_ref()
            .map(|template| expand(template, layout))
    }

    pub fn run_command(&self, layout: &SourceLayout) -> Vec<String> {
        expand(&self.run, layout)
    }

    fn apply(&mut self, overrides: &LanguageOverride) -> Result<()> {
        if let Some(secs) = overrides.compile_timeout_secs {
            self.compile_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.run_timeout_secs {
            self.run_timeout = Duration::from_secs(secs);
        }
        if let Some(compile) = &overrides.compile {
            if compile.is_empty() {
                return Err(Error::Config(format!(
                    "empty compile command for {}",
                    self.language
                )));
            }
            self.compile = Some(compile.clone());
        }
        if let Some(run) = &overrides.run {
            if run.is_empty() {
                return Err(Error::Config(format!(
                    "empty run command for {}",
                    self.language
                )));
            }
            self.run = run.clone();
        }
        Ok(())
    }
}

fn expand(template: &[String], layout: &SourceLayout) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            arg.replace("{source}", &layout.file_name)
                .replace("{class}", &layout.stem)
                .replace("{binary}", ARTIFACT_NAME)
        })
        .collect()
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Built-in profile for a language
pub fn builtin_profile(language: Language) -> LanguageProfile {
    let run_timeout = Duration::from_secs(5);
    let compile_timeout = Duration::from_secs(30);

    match language {
        Language::Python => LanguageProfile {
            language,
            extension: "py",
            naming: SourceNaming::Fixed("main"),
            compile: None,
            run: argv(&["python3", "-u", "{source}"]),
            compile_timeout,
            run_timeout,
            env: vec![
                ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
                ("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()),
            ],
        },
        Language::JavaScript => LanguageProfile {
            language,
            extension: "js",
            naming: SourceNaming::Fixed("main"),
            compile: None,
            run: argv(&["node", "{source}"]),
            compile_timeout,
            run_timeout,
            env: Vec::new(),
        },
        Language::Java => LanguageProfile {
            language,
            extension: "java",
            naming: SourceNaming::PublicClass { fallback: "Main" },
            compile: Some(argv(&["javac", "-d", ".", "{source}"])),
            run: argv(&["java", "-cp", ".", "{class}"]),
            compile_timeout,
            run_timeout,
            env: Vec::new(),
        },
        Language::Cpp => LanguageProfile {
            language,
            extension: "cpp",
            naming: SourceNaming::Fixed("main"),
            compile: Some(argv(&["g++", "-std=c++17", "-O2", "-o", "{binary}", "{source}"])),
            run: argv(&["./{binary}"]),
            compile_timeout,
            run_timeout,
            env: Vec::new(),
        },
        Language::C => LanguageProfile {
            language,
            extension: "c",
            naming: SourceNaming::Fixed("main"),
            compile: Some(argv(&["gcc", "-std=c11", "-O2", "-o", "{binary}", "{source}", "-lm"])),
            run: argv(&["./{binary}"]),
            compile_timeout,
            run_timeout,
            env: Vec::new(),
        },
        Language::Rust => LanguageProfile {
            language,
            extension: "rs",
            naming: SourceNaming::Fixed("main"),
            compile: Some(argv(&["rustc", "-O", "-o", "{binary}", "{source}"])),
            run: argv(&["./{binary}"]),
            compile_timeout: Duration::from_secs(60),
            run_timeout,
            env: Vec::new(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<Language, LanguageProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfileRegistry {
    pub fn builtin() -> Self {
        let profiles = Language::ALL
            .iter()
            .map(|language| (*language, builtin_profile(*language)))
            .collect();
        Self { profiles }
    }

    /// Built-in table with per-language overrides applied on top
    pub fn with_overrides(overrides: &HashMap<Language, LanguageOverride>) -> Result<Self> {
        let mut registry = Self::builtin();
        for (language, language_override) in overrides {
            if let Some(profile) = registry.profiles.get_mut(language) {
                profile.apply(language_override)?;
                debug!("Applied profile override for {}", language);
            }
        }
        Ok(registry)
    }

    /// Resolve a caller-supplied identifier. Unknown identifiers fail fast;
    /// there is no fallback interpreter.
    pub fn profile_for(&self, language_id: &str) -> Result<&LanguageProfile> {
        let language: Language = language_id.parse()?;
        self.profiles
            .get(&language)
            .ok_or_else(|| Error::UnsupportedLanguage(language_id.to_string()))
    }

    pub fn get(&self, language: Language) -> Option<&LanguageProfile> {
        self.profiles.get(&language)
    }

    pub fn languages(&self) -> Vec<Language> {
        Language::ALL
            .into_iter()
            .filter(|language| self.profiles.contains_key(language))
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn skip_if_not_available(tools: &[&str]) -> bool {
    let missing: Vec<_> = tools
        .iter()
        .filter(|tool| which::which(**tool).is_err())
        .map(|s| (*s).to_string())
        .collect();

    if !missing.is_empty() {
        eprintln!("Skipping test: {} not available", missing.join(", "));
        return true;
    }
    false
}
