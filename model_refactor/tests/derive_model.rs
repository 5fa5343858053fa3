use model_refactor::models::FieldDefinition;
use model_refactor::snapshot::{ColumnDef, ColumnType};
use model_refactor::{Config, MetadataProvider, Model, ModelRegistry, SnapshotExtractor};
use pretty_assertions::assert_eq;

#[allow(dead_code)]
#[derive(Debug, Model)]
#[model(class = "App\\Models\\Student", table = "students")]
pub struct Student {
    pub id: i64,
    #[column(name = "full_name")]
    pub name: String,
    pub nickname: Option<String>,
    #[column(ty = "text", default = "\"\"")]
    pub bio: String,
    #[column(skip)]
    pub cache: Vec<String>,
}

#[allow(dead_code)]
#[derive(Debug, Model)]
pub struct CourseEnrollment {
    pub credits: i32,
}

#[test]
fn test_derived_definitions() {
    assert_eq!(Student::class_name(), "App\\Models\\Student");
    assert_eq!(Student::table_name(), Some("students".to_string()));

    let fields = Student::field_definitions();
    assert_eq!(fields.len(), 4);
    assert_eq!(
        fields[1],
        FieldDefinition {
            name: "name".to_string(),
            column_name: Some("full_name".to_string()),
            rust_type: "String".to_string(),
            column_type: None,
            nullable: false,
            default: None,
        }
    );
    assert_eq!(fields[2].rust_type, "Option<String>");
}

#[test]
fn test_default_class_name_uses_module_path() {
    assert_eq!(
        CourseEnrollment::class_name(),
        concat!(module_path!(), "::CourseEnrollment")
    );
    assert_eq!(CourseEnrollment::table_name(), None);
}

#[test]
fn test_registered_model_snapshot() {
    let config = Config::default();
    let mut registry = ModelRegistry::new(&config);
    registry.register::<Student>();
    registry.register::<CourseEnrollment>();

    let snapshot = SnapshotExtractor::new(&registry)
        .extract("App\\Models\\Student")
        .unwrap();

    assert_eq!(snapshot.table_name(), "students");
    assert_eq!(
        snapshot.columns(),
        &[
            ColumnDef::new("id", ColumnType::BigInteger),
            ColumnDef::new("full_name", ColumnType::String),
            ColumnDef::new("nickname", ColumnType::String).nullable(true),
            ColumnDef::new("bio", ColumnType::Text).default(""),
        ]
    );

    let enrollment = registry.resolve("CourseEnrollment").unwrap();
    assert_eq!(enrollment.table_name, "course_enrollments");
}
