use model_refactor::config::{Driver, PathsConfig};
use model_refactor::models::{FieldDefinition, ModelDefinition};
use model_refactor::schema::{Direction, MigrationOperation};
use model_refactor::snapshot::{ColumnDef, ColumnType};
use model_refactor::{
    Change, ChangeSet, Config, Error, FileSnapshotStore, ModelRefactor, ModelRegistry,
    RefactorOutcome, RefactorRequest, RenameHints, SnapshotStore,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};
use walkdir::WalkDir;

const OLD_CLASS: &str = "App\\Models\\Student";
const NEW_CLASS: &str = "App\\Modules\\Students\\Entities\\Student";

const CONTROLLER: &str = r#"<?php

use App\Models\Student;

class StudentController
{
    /** @return App\Models\Student */
    public function show(int $id): \App\Models\Student
    {
        return Student::findOrFail($id);
    }
}
"#;

const COURSE: &str = "<?php\n\nclass Course\n{\n}\n";

fn project() -> (TempDir, Config) {
    let dir = tempdir().unwrap();
    let root = dir.path();

    fs::create_dir_all(root.join("app/Http/Controllers")).unwrap();
    fs::create_dir_all(root.join("app/Models")).unwrap();
    fs::write(root.join("app/Http/Controllers/StudentController.php"), CONTROLLER).unwrap();
    fs::write(root.join("app/Models/Course.php"), COURSE).unwrap();

    let config = Config {
        paths: PathsConfig {
            code_root: root.to_path_buf(),
            ..PathsConfig::default()
        },
        ..Config::default()
    };

    (dir, config)
}

fn registry(config: &Config, class_name: &str, name_column: &str) -> ModelRegistry {
    let mut registry = ModelRegistry::new(config);
    registry.register_definition(
        ModelDefinition::new(class_name)
            .table("students")
            .field(FieldDefinition::new("id", "i64"))
            .field(FieldDefinition::new(name_column, "String")),
    );
    registry
}

fn client(config: &Config, registry: ModelRegistry) -> ModelRefactor<ModelRegistry, FileSnapshotStore> {
    let store = FileSnapshotStore::new(config.snapshot_directory());
    ModelRefactor::new(config.clone(), registry, store)
}

fn read(root: &Path, path: &str) -> String {
    fs::read_to_string(root.join(path)).unwrap()
}

/// Every file under `root` with its bytes, in path order
fn tree_contents(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| (entry.path().to_path_buf(), fs::read(entry.path()).unwrap()))
        .collect()
}

#[test]
fn test_student_rename_end_to_end() {
    let (dir, config) = project();
    let root = dir.path();

    let before = client(&config, registry(&config, OLD_CLASS, "full_name"));
    let old_snapshot = before.snapshot(OLD_CLASS).unwrap();
    let artifact = read(root, "storage/snapshots/App_Models_Student.json");

    let after = client(&config, registry(&config, NEW_CLASS, "name"));
    let outcome = after
        .refactor(&RefactorRequest::new(OLD_CLASS).to(NEW_CLASS))
        .unwrap();

    let RefactorOutcome::Completed(summary) = outcome else {
        panic!("expected changes");
    };

    assert_eq!(
        summary.changes,
        ChangeSet::new(vec![
            Change::ClassRename {
                old: OLD_CLASS.to_string(),
                new: NEW_CLASS.to_string(),
            },
            Change::ColumnDrop {
                table: "students".to_string(),
                column: ColumnDef::new("full_name", ColumnType::String),
            },
            Change::ColumnAdd {
                table: "students".to_string(),
                column: ColumnDef::new("name", ColumnType::String),
            },
        ])
    );

    // Three references rewritten, nothing else touched
    let controller = read(root, "app/Http/Controllers/StudentController.php");
    assert_eq!(summary.report.modified_files, vec![root.join("app/Http/Controllers/StudentController.php")]);
    assert_eq!(summary.report.total_replacements(), 3);
    assert_eq!(controller.matches(NEW_CLASS).count(), 3);
    assert!(!controller.contains(OLD_CLASS));
    assert_eq!(controller, CONTROLLER.replace(OLD_CLASS, NEW_CLASS));
    assert_eq!(read(root, "app/Models/Course.php"), COURSE);
    assert_eq!(read(root, "storage/snapshots/App_Models_Student.json"), artifact);

    let migration = summary.migration.unwrap();
    assert_eq!(
        migration.up,
        vec![
            MigrationOperation::DropColumn {
                table: "students".to_string(),
                column: ColumnDef::new("full_name", ColumnType::String),
            },
            MigrationOperation::AddColumn {
                table: "students".to_string(),
                column: ColumnDef::new("name", ColumnType::String),
            },
        ]
    );

    let migrated = migration.simulate(&old_snapshot, Direction::Up);
    let new_snapshot = after.snapshot(NEW_CLASS).unwrap();
    let mut columns: Vec<_> = migrated.columns().iter().map(|c| c.name.clone()).collect();
    let mut expected: Vec<_> = new_snapshot.columns().iter().map(|c| c.name.clone()).collect();
    columns.sort();
    expected.sort();
    assert_eq!(columns, expected);
    assert_eq!(migration.simulate(&migrated, Direction::Down), old_snapshot);

    let path = migration
        .write_to(&config.migrations_directory(), Driver::Postgres)
        .unwrap();
    let script = fs::read_to_string(path).unwrap();
    assert!(script.contains("ALTER TABLE \"students\" DROP COLUMN \"full_name\";"));
    assert!(script.contains("ALTER TABLE \"students\" ADD COLUMN \"name\" VARCHAR(255) NOT NULL;"));
}

#[test]
fn test_dry_run_leaves_sources_untouched() {
    let (dir, config) = project();
    let root = dir.path();

    client(&config, registry(&config, OLD_CLASS, "full_name"))
        .snapshot(OLD_CLASS)
        .unwrap();

    let after = client(&config, registry(&config, NEW_CLASS, "full_name"));
    let before = tree_contents(root);
    let outcome = after
        .refactor(&RefactorRequest::new(OLD_CLASS).to(NEW_CLASS).dry_run(true))
        .unwrap();

    let RefactorOutcome::Completed(summary) = outcome else {
        panic!("expected changes");
    };

    assert!(summary.report.dry_run);
    assert_eq!(summary.report.modified_files.len(), 1);
    assert_eq!(summary.report.total_replacements(), 3);
    assert_eq!(tree_contents(root), before);
    // Class-only rename: nothing for the database
    assert!(summary.migration.is_none());
    assert!(!config.migrations_directory().exists());
}

#[test]
fn test_column_rename_hint_produces_rename() {
    let (_dir, config) = project();

    client(&config, registry(&config, OLD_CLASS, "full_name"))
        .snapshot(OLD_CLASS)
        .unwrap();

    let after = client(&config, registry(&config, OLD_CLASS, "name"));
    let changes = after
        .plan(OLD_CLASS, OLD_CLASS, &RenameHints::new().column("full_name", "name"))
        .unwrap();

    assert_eq!(
        changes,
        ChangeSet::new(vec![Change::ColumnRename {
            table: "students".to_string(),
            old: "full_name".to_string(),
            new: "name".to_string(),
        }])
    );
}

#[test]
fn test_unchanged_model_reports_no_changes() {
    let (dir, config) = project();

    let client = client(&config, registry(&config, OLD_CLASS, "full_name"));
    client.snapshot(OLD_CLASS).unwrap();

    let outcome = client.refactor(&RefactorRequest::new(OLD_CLASS)).unwrap();

    assert!(matches!(outcome, RefactorOutcome::NoChanges));
    assert_eq!(read(dir.path(), "app/Http/Controllers/StudentController.php"), CONTROLLER);
}

#[test]
fn test_missing_snapshot_fails_before_diffing() {
    let (dir, config) = project();

    let client = client(&config, registry(&config, NEW_CLASS, "name"));
    let result = client.refactor(&RefactorRequest::new(OLD_CLASS).to(NEW_CLASS));

    assert!(matches!(result, Err(Error::SnapshotNotFoundError { .. })));
    assert_eq!(read(dir.path(), "app/Http/Controllers/StudentController.php"), CONTROLLER);
}

#[test]
fn test_unknown_model_fails() {
    let (_dir, config) = project();

    let client = client(&config, registry(&config, OLD_CLASS, "full_name"));

    assert!(matches!(
        client.snapshot("App\\Models\\Ghost"),
        Err(Error::ModelNotFoundError(_))
    ));
    assert!(!client.store().exists("App\\Models\\Ghost"));
}

#[test]
fn test_stored_snapshot_survives_refactor_in_custom_directory() {
    let (dir, mut config) = project();
    config.paths.snapshot_directory = PathBuf::from("snapshots");
    let root = dir.path();

    let mut before = ModelRegistry::new(&config);
    before.register_definition(
        ModelDefinition::new(OLD_CLASS)
            .table("students")
            .field(FieldDefinition::new("id", "i64")),
    );
    let before = client(&config, before);
    let stored = before.snapshot(OLD_CLASS).unwrap();
    let artifact = read(root, "snapshots/App_Models_Student.json");

    let mut after = ModelRegistry::new(&config);
    after.register_definition(
        ModelDefinition::new("App\\Models\\Pupil")
            .table("pupils")
            .field(FieldDefinition::new("id", "i64")),
    );
    let after = client(&config, after);
    let outcome = after
        .refactor(&RefactorRequest::new(OLD_CLASS).to("App\\Models\\Pupil"))
        .unwrap();

    assert!(matches!(outcome, RefactorOutcome::Completed(_)));
    assert_eq!(
        read(root, "app/Http/Controllers/StudentController.php"),
        CONTROLLER.replace(OLD_CLASS, "App\\Models\\Pupil")
    );
    assert_eq!(read(root, "snapshots/App_Models_Student.json"), artifact);
    assert_eq!(after.store().load(OLD_CLASS).unwrap(), stored);
}

#[test]
fn test_snapshot_taken_by_short_name_is_found_again() {
    let (_dir, config) = project();
    let mut registry = ModelRegistry::new(&config);
    registry.register_definition(
        ModelDefinition::new("app::models::student::Student")
            .table("students")
            .field(FieldDefinition::new("id", "i64")),
    );
    let client = client(&config, registry);

    let snapshot = client.snapshot("Student").unwrap();
    assert_eq!(snapshot.class_name(), "app::models::student::Student");

    let changes = client.plan("Student", "Student", &RenameHints::new()).unwrap();
    assert!(changes.is_empty());
    assert!(matches!(
        client.refactor(&RefactorRequest::new("Student")).unwrap(),
        RefactorOutcome::NoChanges
    ));
}
