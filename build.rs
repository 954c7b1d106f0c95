use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding this crate's own sources. Everything else in the checkout
// (reference material, build output) is outside the policy.
const SOURCE_DIRS: [&str; 4] = ["mixture", "src", "tests", "benches"];

// Which policy a scan enforces, and how its matches are filtered.
#[derive(Clone, Copy)]
enum Rule {
    UnderscoreBinding,
    ForbiddenCommentWord,
    StarsInComment,
    AllowDeadCode,
}

impl Rule {
    fn pattern(self) -> &'static str {
        match self {
            Rule::UnderscoreBinding => r"\b(_[a-zA-Z0-9_]+)\b",
            Rule::ForbiddenCommentWord => {
                r"(//|/\*).*(?:FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)"
            }
            Rule::StarsInComment => r"(//|/\*).*\*\*",
            Rule::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Rule::UnderscoreBinding => {
                "Underscore-prefixed names are not allowed. Use the binding or remove it."
            }
            Rule::ForbiddenCommentWord => {
                "Comments narrating edits (FIXED, CHANGED, UPDATED, ...) are not allowed."
            }
            Rule::StarsInComment => "'**' is only allowed inside doc comments.",
            Rule::AllowDeadCode => "#[allow(dead_code)] is not allowed. Use the code or delete it.",
        }
    }

    // Decides whether a matched line is a real violation.
    fn applies_to(self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self {
            Rule::UnderscoreBinding => {
                if trimmed.starts_with("//") {
                    return false;
                }
                // Matches inside string literals are not bindings.
                let in_string = line
                    .split('"')
                    .enumerate()
                    .any(|(i, part)| i % 2 == 1 && part.contains('_'));
                !in_string
            }
            Rule::StarsInComment => !trimmed.starts_with("///") && !trimmed.starts_with("//!"),
            Rule::ForbiddenCommentWord | Rule::AllowDeadCode => true,
        }
    }
}

struct ViolationCollector {
    rule: Rule,
    violations: Vec<String>,
    file_path: PathBuf,
}

impl ViolationCollector {
    fn new(rule: Rule, file_path: &Path) -> Self {
        Self {
            rule,
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} policy violations in {}:\n",
            self.violations.len(),
            self.file_path.display()
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {}\n", self.rule.describe()));
        Some(error_msg)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if self.rule.applies_to(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn rust_sources() -> Vec<PathBuf> {
    SOURCE_DIRS
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.path().to_path_buf())
        .collect()
}

fn scan(rule: Rule, files: &[PathBuf]) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern())?;
    let mut searcher = Searcher::new();
    for path in files {
        let mut collector = ViolationCollector::new(rule, path);
        searcher.search_path(&matcher, path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let files = rust_sources();
    for rule in [
        Rule::UnderscoreBinding,
        Rule::ForbiddenCommentWord,
        Rule::StarsInComment,
        Rule::AllowDeadCode,
    ] {
        if let Err(e) = scan(rule, &files) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
