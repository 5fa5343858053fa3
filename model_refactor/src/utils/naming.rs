//! Naming utilities for model_refactor
//!
//! This module provides utilities for naming conventions and transformations.

use chrono::{DateTime, Utc};
use inflector::Inflector;
use std::path::Path;

use crate::config::Driver;

/// Apply a naming convention to a string
pub fn apply_naming_convention(name: &str, convention: &str) -> String {
    match convention {
        "snake_case" => name.to_snake_case(),
        "camel_case" => name.to_camel_case(),
        "pascal_case" => name.to_pascal_case(),
        "kebab_case" => name.to_kebab_case(),
        "screaming_snake_case" => name.to_screaming_snake_case(),
        _ => name.to_string(), // Default: keep as is
    }
}

/// Get table name from a model name according to convention
pub fn get_table_name(model_name: &str, style: &str, pluralize_name: bool) -> String {
    let name = apply_naming_convention(model_name, style);

    if pluralize_name {
        pluralize(&name)
    } else {
        name
    }
}

/// Get column name from a field name according to convention
pub fn get_column_name(field_name: &str, style: &str) -> String {
    apply_naming_convention(field_name, style)
}

/// Convert a singular name to plural
pub fn pluralize(name: &str) -> String {
    // Handle special cases first
    match name.to_lowercase().as_str() {
        "person" => "people".to_string(),
        "child" => "children".to_string(),
        "man" => "men".to_string(),
        "woman" => "women".to_string(),
        "mouse" => "mice".to_string(),
        _ => name.to_plural(),
    }
}

/// Last segment of a fully-qualified class name (`App\Models\Student` -> `Student`)
pub fn short_class_name(class_name: &str) -> &str {
    class_name
        .rsplit(|c: char| c == '\\' || c == ':' || c == '/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(class_name)
}

/// Filesystem-safe key for a fully-qualified class name
///
/// Namespace separators become underscores: `App\Models\Student` -> `App_Models_Student`.
pub fn snapshot_key(class_name: &str) -> String {
    let key = class_name
        .trim()
        .replace("::", "_")
        .replace(['\\', '/', ':'], "_");

    key.trim_start_matches('_').to_string()
}

/// Class name of a struct declared in `file`, derived from its module path below `base`
///
/// `src/models/student.rs` scanned from `src` with namespace `app` gives
/// `app::models::student::Student`; `mod.rs`, `lib.rs` and `main.rs` do not add a segment.
pub fn module_class_name(file: &Path, base: &Path, namespace: &str, struct_name: &str) -> String {
    let relative = file.strip_prefix(base).unwrap_or(file);
    let mut segments: Vec<String> = Vec::new();

    if !namespace.is_empty() {
        segments.push(namespace.trim_end_matches("::").to_string());
    }

    let components: Vec<String> = relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    for (i, component) in components.iter().enumerate() {
        let is_last = i + 1 == components.len();
        if is_last && matches!(component.as_str(), "mod" | "lib" | "main") {
            continue;
        }
        segments.push(component.clone());
    }

    segments.push(struct_name.to_string());
    segments.join("::")
}

/// Sanitize identifiers for SQL and file names
pub fn sanitize_identifier(name: &str) -> String {
    // Remove or replace characters not allowed in SQL identifiers
    let mut sanitized = name.replace(|c: char| !c.is_alphanumeric() && c != '_', "_");

    // Ensure identifier doesn't start with a number
    if sanitized.chars().next().map_or(false, |c| c.is_numeric()) {
        sanitized = format!("_{}", sanitized);
    }

    sanitized
}

/// Truncate an identifier to fit a length limit, keeping it unique with a hash suffix
pub fn truncate_identifier(name: &str, max_length: usize) -> String {
    if name.len() <= max_length || max_length < 10 {
        name.to_string()
    } else {
        // We need space for the hash (8 chars) and the underscore (1 char)
        let keep_length = max_length - 9;
        let hash = format!("{:x}", md5::compute(name.as_bytes()));

        let mut cut = keep_length.min(name.len());
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }

        format!("{}_{}", &name[..cut], &hash[0..8])
    }
}

/// Format name as a valid file name
pub fn format_file_name(name: &str) -> String {
    name.replace([' ', '/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_")
        .to_lowercase()
}

/// Create a timestamp-based migration name
pub fn create_migration_name(description: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", at.format("%Y%m%d%H%M%S"), format_file_name(description))
}

/// Generate a unique name with a suffix if name exists in the list
pub fn generate_unique_name(name: &str, existing_names: &[String]) -> String {
    if !existing_names.iter().any(|existing| existing == name) {
        return name.to_string();
    }

    let mut counter = 1;
    loop {
        let new_name = format!("{}_{}", name, counter);
        if !existing_names.contains(&new_name) {
            return new_name;
        }
        counter += 1;
    }
}

/// Quote an SQL identifier for the given dialect
pub fn format_sql_identifier(name: &str, driver: Driver) -> String {
    match driver {
        Driver::Postgres | Driver::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        Driver::Mysql => format!("`{}`", name.replace('`', "``")),
    }
}

/// Quote an SQL string literal
pub fn quote_sql_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case("snake_case", "UserProfile", "user_profile")]
    #[case("camel_case", "user_profile", "userProfile")]
    #[case("pascal_case", "user_profile", "UserProfile")]
    #[case("kebab_case", "UserProfile", "user-profile")]
    #[case("screaming_snake_case", "UserProfile", "USER_PROFILE")]
    fn test_apply_naming_convention(#[case] style: &str, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(apply_naming_convention(input, style), expected);
    }

    #[rstest]
    #[case("Student", true, "students")]
    #[case("UserProfile", true, "user_profiles")]
    #[case("Category", true, "categories")]
    #[case("Person", true, "people")]
    #[case("Student", false, "student")]
    fn test_table_name(#[case] model: &str, #[case] pluralize: bool, #[case] expected: &str) {
        assert_eq!(get_table_name(model, "snake_case", pluralize), expected);
    }

    #[test]
    fn test_column_name() {
        assert_eq!(get_column_name("fullName", "snake_case"), "full_name");
        assert_eq!(get_column_name("date_of_birth", "camel_case"), "dateOfBirth");
    }

    #[test]
    fn test_short_class_name() {
        assert_eq!(short_class_name("App\\Models\\Student"), "Student");
        assert_eq!(short_class_name("app::models::Student"), "Student");
        assert_eq!(short_class_name("Student"), "Student");
    }

    #[rstest]
    #[case("App\\Models\\Student", "App_Models_Student")]
    #[case("App\\Modules\\Students\\Entities\\Student", "App_Modules_Students_Entities_Student")]
    #[case("app::models::Student", "app_models_Student")]
    #[case("\\App\\Models\\Student", "App_Models_Student")]
    fn test_snapshot_key(#[case] class_name: &str, #[case] expected: &str) {
        assert_eq!(snapshot_key(class_name), expected);
    }

    #[test]
    fn test_module_class_name() {
        let base = Path::new("/project/src");

        assert_eq!(
            module_class_name(Path::new("/project/src/models/student.rs"), base, "app", "Student"),
            "app::models::student::Student"
        );
        assert_eq!(
            module_class_name(Path::new("/project/src/models/mod.rs"), base, "", "Student"),
            "models::Student"
        );
        assert_eq!(
            module_class_name(Path::new("/project/src/lib.rs"), base, "app", "Student"),
            "app::Student"
        );
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("user-name"), "user_name");
        assert_eq!(sanitize_identifier("123user"), "_123user");
        assert_eq!(sanitize_identifier("user.name"), "user_name");
    }

    #[test]
    fn test_truncate_identifier() {
        let long_name = "refactor_this_is_a_very_long_table_name_that_exceeds_limits";
        let truncated = truncate_identifier(long_name, 30);

        assert_eq!(truncated.len(), 30);
        assert!(truncated.starts_with("refactor_this_is_a_"));
        assert_eq!(truncate_identifier("short", 30), "short");
    }

    #[test]
    fn test_create_migration_name() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 5).unwrap();
        assert_eq!(
            create_migration_name("Refactor students", at),
            "20261019083005_refactor_students"
        );
    }

    #[test]
    fn test_generate_unique_name() {
        let existing = vec!["user".to_string(), "user_1".to_string()];

        assert_eq!(generate_unique_name("profile", &existing), "profile");
        assert_eq!(generate_unique_name("user", &existing), "user_2");
    }

    #[test]
    fn test_format_sql_identifier() {
        assert_eq!(format_sql_identifier("students", Driver::Postgres), "\"students\"");
        assert_eq!(format_sql_identifier("students", Driver::Mysql), "`students`");
        assert_eq!(quote_sql_string("O'Hara"), "'O''Hara'");
    }
}
