//! Rewrite rules derived from a change-set, and the matching they perform on text.

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::schema::change::{Change, ChangeSet};

/// How a rule finds its term in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    /// Bare identifier, bounded by non-identifier characters on both sides
    Identifier,
    /// Whole string literal in single, double or backtick quotes
    QuotedLiteral,
}

/// One text substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteRule {
    pub from: String,
    pub to: String,
    pub kind: RuleKind,
}

impl RewriteRule {
    pub fn identifier(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            kind: RuleKind::Identifier,
        }
    }

    pub fn quoted(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            kind: RuleKind::QuotedLiteral,
        }
    }
}

/// Build the rewrite rules for a change-set
///
/// Column additions, drops and definition changes leave code untouched.
pub fn rules_for(changes: &ChangeSet, escaped_class_names: bool) -> Vec<RewriteRule> {
    let mut rules: Vec<RewriteRule> = Vec::new();

    let renamed_table = changes.iter().find_map(|change| match change {
        Change::TableRename { old, new } => Some((old.as_str(), new.as_str())),
        _ => None,
    });

    for change in changes {
        match change {
            Change::ClassRename { old, new } => {
                rules.push(RewriteRule::identifier(old, new));
                if escaped_class_names && old.contains('\\') {
                    rules.push(RewriteRule::identifier(
                        &old.replace('\\', "\\\\"),
                        &new.replace('\\', "\\\\"),
                    ));
                }
            }
            Change::TableRename { old, new } => rules.push(RewriteRule::quoted(old, new)),
            Change::ColumnRename { table, old, new } => {
                rules.push(RewriteRule::quoted(old, new));
                rules.push(RewriteRule::quoted(
                    &format!("{}.{}", table, old),
                    &format!("{}.{}", table, new),
                ));
                if let Some((old_table, new_table)) = renamed_table {
                    rules.push(RewriteRule::quoted(
                        &format!("{}.{}", old_table, old),
                        &format!("{}.{}", new_table, new),
                    ));
                }
            }
            Change::ColumnAdd { .. } | Change::ColumnDrop { .. } | Change::ColumnTypeChange { .. } => {}
        }
    }

    rules.retain(|rule| !rule.from.is_empty() && rule.from != rule.to);

    // Longest first, so a longer term claims its span before any term it contains
    rules.sort_by(|a, b| {
        b.from
            .len()
            .cmp(&a.from.len())
            .then_with(|| a.from.cmp(&b.from))
    });
    rules.dedup_by(|a, b| a.from == b.from && a.kind == b.kind);
    rules
}

/// A located replacement inside a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Rules compiled for repeated matching over many files
pub struct CompiledRules {
    rules: Vec<(RewriteRule, Option<Regex>)>,
}

impl CompiledRules {
    pub fn compile(rules: Vec<RewriteRule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let regex = match rule.kind {
                    RuleKind::Identifier => None,
                    RuleKind::QuotedLiteral => {
                        let term = regex::escape(&rule.from);
                        let pattern = format!("'{term}'|\"{term}\"|`{term}`");
                        Some(Regex::new(&pattern).map_err(|e| {
                            Error::ValidationError(format!(
                                "Cannot build rewrite rule for '{}': {}",
                                rule.from, e
                            ))
                        })?)
                    }
                };
                Ok((rule, regex))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &RewriteRule> {
        self.rules.iter().map(|(rule, _)| rule)
    }

    /// Non-overlapping replacements for `text`, sorted by position
    pub fn find_replacements(&self, text: &str) -> Vec<Replacement> {
        let mut replacements: Vec<Replacement> = Vec::new();

        for (rule, regex) in &self.rules {
            let found = match regex {
                Some(regex) => regex
                    .find_iter(text)
                    .map(|m| {
                        // Keep the quote style of the match
                        let quote = &text[m.start()..m.start() + 1];
                        Replacement {
                            start: m.start(),
                            end: m.end(),
                            text: format!("{quote}{}{quote}", rule.to),
                        }
                    })
                    .collect::<Vec<_>>(),
                None => find_identifier_matches(text, &rule.from, &rule.to)
                    .into_iter()
                    .map(|start| Replacement {
                        start,
                        end: start + rule.from.len(),
                        text: rule.to.clone(),
                    })
                    .collect(),
            };

            for candidate in found {
                let overlaps = replacements
                    .iter()
                    .any(|r| candidate.start < r.end && candidate.end > r.start);
                if !overlaps {
                    replacements.push(candidate);
                }
            }
        }

        replacements.sort_by_key(|r| r.start);
        replacements
    }
}

/// Apply replacements from the end of the text backwards
pub fn apply_replacements(text: &str, replacements: &[Replacement]) -> String {
    let mut result = text.to_string();
    for replacement in replacements.iter().rev() {
        result.replace_range(replacement.start..replacement.end, &replacement.text);
    }
    result
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Whether a name starting at `start` is not the tail of a longer qualified name
///
/// A leading `\` (or run of them, when escaped) or `::` belongs to the name
/// only when nothing identifier-like precedes it.
fn starts_qualified_name(bytes: &[u8], start: usize) -> bool {
    let mut i = start;
    while i > 0 && bytes[i - 1] == b'\\' {
        i -= 1;
    }
    if i == start && i >= 2 && &bytes[i - 2..i] == b"::" {
        i -= 2;
    }
    i == 0 || !is_identifier_byte(bytes[i - 1])
}

/// Byte ranges of every occurrence of `term`
fn occurrences(text: &str, term: &str) -> Vec<(usize, usize)> {
    text.match_indices(term)
        .map(|(start, m)| (start, start + m.len()))
        .collect()
}

/// Positions of `term` bounded by non-identifier characters
///
/// Matches lying inside an occurrence of `replacement` are skipped, so running
/// the same rule twice changes nothing the second time.
fn find_identifier_matches(text: &str, term: &str, replacement: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let protected = if replacement.contains(term) {
        occurrences(text, replacement)
    } else {
        Vec::new()
    };

    occurrences(text, term)
        .into_iter()
        .filter(|&(start, end)| {
            let left_ok = starts_qualified_name(bytes, start);
            let right_ok = end >= bytes.len() || !is_identifier_byte(bytes[end]);
            let inside_replacement = protected.iter().any(|&(s, e)| start >= s && end <= e);
            left_ok && right_ok && !inside_replacement
        })
        .map(|(start, _)| start)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn rewrite(rules: Vec<RewriteRule>, text: &str) -> String {
        let compiled = CompiledRules::compile(rules).unwrap();
        apply_replacements(text, &compiled.find_replacements(text))
    }

    fn class_rename() -> ChangeSet {
        ChangeSet::new(vec![Change::ClassRename {
            old: "App\\Models\\Student".to_string(),
            new: "App\\Modules\\Students\\Entities\\Student".to_string(),
        }])
    }

    #[test]
    fn test_class_rename_rules_include_escaped_form() {
        let rules = rules_for(&class_rename(), true);

        assert_eq!(
            rules,
            vec![
                RewriteRule::identifier(
                    "App\\\\Models\\\\Student",
                    "App\\\\Modules\\\\Students\\\\Entities\\\\Student"
                ),
                RewriteRule::identifier("App\\Models\\Student", "App\\Modules\\Students\\Entities\\Student"),
            ]
        );
        assert_eq!(rules_for(&class_rename(), false).len(), 1);
    }

    #[test]
    fn test_column_rename_rules() {
        let changes = ChangeSet::new(vec![
            Change::TableRename {
                old: "students".to_string(),
                new: "pupils".to_string(),
            },
            Change::ColumnRename {
                table: "pupils".to_string(),
                old: "full_name".to_string(),
                new: "name".to_string(),
            },
            Change::ColumnAdd {
                table: "pupils".to_string(),
                column: crate::snapshot::types::ColumnDef::new(
                    "age",
                    crate::snapshot::types::ColumnType::Integer,
                ),
            },
        ]);

        let rules = rules_for(&changes, true);
        let froms: Vec<_> = rules.iter().map(|r| r.from.as_str()).collect();

        assert_eq!(
            froms,
            vec!["students.full_name", "pupils.full_name", "full_name", "students"]
        );
        assert!(rules.iter().all(|r| r.kind == RuleKind::QuotedLiteral));
    }

    #[rstest]
    #[case("use App\\Models\\Student;", "use App\\Modules\\Students\\Entities\\Student;")]
    #[case("new \\App\\Models\\Student()", "new \\App\\Modules\\Students\\Entities\\Student()")]
    #[case("App\\Models\\StudentController", "App\\Models\\StudentController")]
    #[case("MyApp\\Models\\Student", "MyApp\\Models\\Student")]
    #[case("use Vendor\\App\\Models\\Student;", "use Vendor\\App\\Models\\Student;")]
    #[case("'Vendor\\\\App\\\\Models\\\\Student'", "'Vendor\\\\App\\\\Models\\\\Student'")]
    #[case("(\\App\\Models\\Student::class)", "(\\App\\Modules\\Students\\Entities\\Student::class)")]
    #[case(
        "'model' => 'App\\\\Models\\\\Student',",
        "'model' => 'App\\\\Modules\\\\Students\\\\Entities\\\\Student',"
    )]
    fn test_identifier_boundaries(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(rewrite(rules_for(&class_rename(), true), input), expected);
    }

    #[rstest]
    #[case("use app::models::Student;", "use app::entities::Student;")]
    #[case("use ::app::models::Student;", "use ::app::entities::Student;")]
    #[case("other::app::models::Student::new()", "other::app::models::Student::new()")]
    #[case("let s: app::models::Student;", "let s: app::entities::Student;")]
    fn test_path_separator_boundaries(#[case] input: &str, #[case] expected: &str) {
        let rules = vec![RewriteRule::identifier("app::models::Student", "app::entities::Student")];
        assert_eq!(rewrite(rules, input), expected);
    }

    #[test]
    fn test_identifier_rule_is_idempotent_when_new_name_contains_old() {
        let rules = vec![RewriteRule::identifier("Student", "Student\\V2")];
        let once = rewrite(rules.clone(), "Student::find(1); Student\\V2::all();");

        assert_eq!(once, "Student\\V2::find(1); Student\\V2::all();");
        assert_eq!(rewrite(rules, &once), once);
    }

    #[rstest]
    #[case("DB::table('students')", "DB::table('pupils')")]
    #[case("$table = \"students\";", "$table = \"pupils\";")]
    #[case("SELECT * FROM `students`", "SELECT * FROM `pupils`")]
    #[case("'students_archive'", "'students_archive'")]
    #[case("students are here", "students are here")]
    fn test_quoted_literals(#[case] input: &str, #[case] expected: &str) {
        let rules = vec![RewriteRule::quoted("students", "pupils")];
        assert_eq!(rewrite(rules, input), expected);
    }

    #[test]
    fn test_longest_rule_wins_overlap() {
        let rules = rules_for(
            &ChangeSet::new(vec![Change::ColumnRename {
                table: "students".to_string(),
                old: "full_name".to_string(),
                new: "name".to_string(),
            }]),
            true,
        );

        let output = rewrite(rules, "orderBy('students.full_name')->pluck('full_name')");
        assert_eq!(output, "orderBy('students.name')->pluck('name')");
    }
}
