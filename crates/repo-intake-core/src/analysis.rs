//! Light per-file analysis run after content fetch.
//!
//! Computes a line count, the flagged inline comments (TODO, FIXME, BUG,
//! HACK, XXX) and a coarse complexity proxy: the number of control-flow
//! keywords and short-circuit operators in the file.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{FileAnalysis, FlaggedComment, ScoredFile};

/// Tags recognized as flagged comments.
pub const FLAG_TAGS: &[&str] = &["TODO", "FIXME", "BUG", "HACK", "XXX"];

const MAX_EXCERPT_CHARS: usize = 200;

fn flagged_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?://+|#+|/\*+|\*|<!--|--)\s*(TODO|FIXME|BUG|HACK|XXX)\b[:\s-]*(.*)")
            .expect("flagged comment pattern is valid")
    })
}

fn control_flow_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:if|for|foreach|while|loop|switch|case|catch|match|elif|except|rescue|when)\b|&&|\|\|")
            .expect("control flow pattern is valid")
    })
}

/// Find flagged comments, one per matching line.
pub fn find_flagged_comments(content: &str) -> Vec<FlaggedComment> {
    let re = flagged_comment_re();
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let caps = re.captures(line)?;
            let tag = caps.get(1)?.as_str().to_string();
            let text = caps
                .get(2)
                .map(|m| m.as_str().trim().trim_end_matches("*/").trim_end_matches("-->").trim())
                .unwrap_or_default();
            Some(FlaggedComment {
                tag,
                line: i + 1,
                text: text.chars().take(MAX_EXCERPT_CHARS).collect(),
            })
        })
        .collect()
}

/// Count control-flow constructs as a complexity estimate.
pub fn estimate_complexity(content: &str) -> usize {
    control_flow_re().find_iter(content).count()
}

/// Run the full per-file analysis.
pub fn analyze_content(content: &str) -> FileAnalysis {
    FileAnalysis {
        line_count: content.lines().count(),
        flagged_comments: find_flagged_comments(content),
        complexity: estimate_complexity(content),
    }
}

/// Back-fill the derived fields of a scored file from its analysis.
pub fn apply_analysis(file: &mut ScoredFile, analysis: &FileAnalysis) {
    file.lines_of_code = Some(analysis.line_count);
    file.has_flagged_comments = Some(!analysis.flagged_comments.is_empty());
    file.complexity = Some(analysis.complexity);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flagged_comments_across_syntaxes() {
        let content = "// TODO: wire up auth\nlet x = 1;\n# FIXME broken on windows\n/* HACK - temporary */\nconst todo = 'TODO';\n";
        let flagged = find_flagged_comments(content);
        assert_eq!(flagged.len(), 3);
        assert_eq!(flagged[0].tag, "TODO");
        assert_eq!(flagged[0].line, 1);
        assert_eq!(flagged[0].text, "wire up auth");
        assert_eq!(flagged[1].tag, "FIXME");
        assert_eq!(flagged[2].tag, "HACK");
        assert_eq!(flagged[2].text, "temporary");
    }

    #[test]
    fn test_lowercase_todo_is_not_flagged() {
        assert!(find_flagged_comments("// todo later").is_empty());
    }

    #[test]
    fn test_complexity_counts_control_flow() {
        let content = "if (a && b) {\n  for (const x of xs) {}\n} else if (c || d) {}\nwhile (true) {}";
        // if, &&, for, if, ||, while
        assert_eq!(estimate_complexity(content), 6);
        assert_eq!(estimate_complexity("const verify = 1;"), 0);
    }

    #[test]
    fn test_analyze_and_apply() {
        let analysis = analyze_content("fn main() {\n    // BUG: off by one\n    if x {}\n}\n");
        assert_eq!(analysis.line_count, 4);
        assert_eq!(analysis.flagged_comments.len(), 1);
        assert_eq!(analysis.complexity, 1);

        let node = crate::models::FileNode::file("src/main.rs", 40);
        let mut scored = ScoredFile::new(node, 10.0, crate::models::FileCategory::EntryPoint);
        apply_analysis(&mut scored, &analysis);
        assert_eq!(scored.lines_of_code, Some(4));
        assert_eq!(scored.has_flagged_comments, Some(true));
        assert_eq!(scored.complexity, Some(1));
    }
}
