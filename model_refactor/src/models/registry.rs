//! Model registry for model_refactor
//!
//! This module manages the registration and discovery of model structs and
//! resolves them into snapshot metadata.

use indexmap::IndexMap;
use quote::ToTokens;
use std::path::{Path, PathBuf};
use syn::{parse_file, Attribute, Fields, Item, ItemStruct, LitBool, LitStr};
use walkdir::WalkDir;

use crate::config::{Config, ModelsConfig, NamingConfig, TypeMappingConfig};
use crate::error::{Error, Result};
use crate::snapshot::extractor::{MetadataProvider, ModelMetadata};
use crate::snapshot::types::{ColumnDef, ColumnType};
use crate::utils::naming::{get_column_name, get_table_name, module_class_name, short_class_name};

/// A model whose class and table identity can be snapshotted
///
/// Usually implemented with `#[derive(Model)]`.
pub trait Model {
    /// Fully-qualified class name
    fn class_name() -> String;

    /// Explicit table name; `None` applies the naming convention
    fn table_name() -> Option<String> {
        None
    }

    /// Persisted fields in declaration order
    fn field_definitions() -> Vec<FieldDefinition>;
}

/// One persisted field of a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Rust field name
    pub name: String,
    /// Explicit column name, overriding the naming convention
    pub column_name: Option<String>,
    pub rust_type: String,
    /// Explicit semantic column type, overriding the type mapping
    pub column_type: Option<String>,
    pub nullable: bool,
    /// Default value; parsed as JSON when possible, otherwise kept as a string
    pub default: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: &str, rust_type: &str) -> Self {
        Self {
            name: name.to_string(),
            column_name: None,
            rust_type: rust_type.to_string(),
            column_type: None,
            nullable: false,
            default: None,
        }
    }
}

/// Declarative description of a model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    pub class_name: String,
    pub table_name: Option<String>,
    pub fields: Vec<FieldDefinition>,
    /// Source file the model was discovered in, if scanned
    pub file_path: Option<PathBuf>,
}

impl ModelDefinition {
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            table_name: None,
            fields: Vec::new(),
            file_path: None,
        }
    }

    pub fn table(mut self, table_name: &str) -> Self {
        self.table_name = Some(table_name.to_string());
        self
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Short struct name, last segment of the class name
    pub fn struct_name(&self) -> &str {
        short_class_name(&self.class_name)
    }
}

/// Registry for model definitions
pub struct ModelRegistry {
    models: IndexMap<String, ModelDefinition>,
    models_config: ModelsConfig,
    naming: NamingConfig,
    type_mapping: TypeMappingConfig,
}

impl ModelRegistry {
    /// Create a new model registry
    pub fn new(config: &Config) -> Self {
        Self {
            models: IndexMap::new(),
            models_config: config.models.clone(),
            naming: config.naming.clone(),
            type_mapping: config.type_mapping.clone(),
        }
    }

    /// Register a type implementing [`Model`]
    pub fn register<M: Model>(&mut self) {
        self.register_definition(ModelDefinition {
            class_name: M::class_name(),
            table_name: M::table_name(),
            fields: M::field_definitions(),
            file_path: None,
        });
    }

    /// Register a declarative model definition, replacing any earlier one
    pub fn register_definition(&mut self, definition: ModelDefinition) {
        tracing::debug!(
            class_name = %definition.class_name,
            fields = definition.fields.len(),
            "Registered model"
        );

        if let Some(previous) = self.models.insert(definition.class_name.clone(), definition) {
            tracing::warn!(class_name = %previous.class_name, "Model registered twice, keeping the latest");
        }
    }

    /// Scan the configured directories for model structs and register them
    ///
    /// Returns the number of models found.
    pub fn scan_and_register(&mut self, config: &Config) -> Result<usize> {
        let exclude_paths: Vec<PathBuf> = self
            .models_config
            .exclude_paths
            .clone()
            .unwrap_or_default()
            .iter()
            .map(|path| config.resolve_path(Path::new(path)))
            .collect();
        let max_depth = if self.models_config.recursive_scan { usize::MAX } else { 1 };
        let mut found = 0;

        for path in self.models_config.paths.clone() {
            let base_path = config.resolve_path(Path::new(&path));

            if !base_path.exists() {
                return Err(Error::ModelRegistrationError(format!(
                    "Path does not exist: {}",
                    base_path.display()
                )));
            }

            let mut files: Vec<PathBuf> = WalkDir::new(&base_path)
                .max_depth(max_depth)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.into_path())
                .filter(|path| path.is_file() && path.extension().map_or(false, |ext| ext == "rs"))
                .filter(|path| !exclude_paths.iter().any(|exclude| path.starts_with(exclude)))
                .collect();
            files.sort();

            for file in files {
                found += self.process_file(&file, &base_path)?;
            }
        }

        tracing::info!(models = found, "Model scan finished");
        Ok(found)
    }

    /// Parse a Rust file and register the model structs it declares
    fn process_file(&mut self, file_path: &Path, base_path: &Path) -> Result<usize> {
        let file_content = std::fs::read_to_string(file_path)
            .map_err(|e| Error::file_access(file_path, e))?;
        let syntax = parse_file(&file_content).map_err(|e| {
            Error::SyntaxError(format!("Failed to parse {}: {}", file_path.display(), e))
        })?;

        let module_prefix = module_class_name(
            file_path,
            base_path,
            &self.models_config.namespace,
            "",
        );
        let module_prefix = module_prefix.trim_end_matches("::").to_string();

        self.process_items(&syntax.items, &module_prefix, file_path)
    }

    fn process_items(&mut self, items: &[Item], module_prefix: &str, file_path: &Path) -> Result<usize> {
        let mut found = 0;

        for item in items {
            match item {
                Item::Struct(item_struct) if self.derives_model(&item_struct.attrs) => {
                    let definition = self.definition_from_struct(item_struct, module_prefix, file_path)?;
                    self.register_definition(definition);
                    found += 1;
                }
                // Inline modules add a path segment
                Item::Mod(item_mod) => {
                    if let Some((_, nested)) = &item_mod.content {
                        let prefix = join_path(module_prefix, &item_mod.ident.to_string());
                        found += self.process_items(nested, &prefix, file_path)?;
                    }
                }
                _ => {}
            }
        }

        Ok(found)
    }

    /// Whether the struct derives one of the configured model macros
    fn derives_model(&self, attrs: &[Attribute]) -> bool {
        let mut derives = false;

        for attr in attrs.iter().filter(|attr| attr.path().is_ident("derive")) {
            let parsed = attr.parse_nested_meta(|meta| {
                if let Some(segment) = meta.path.segments.last() {
                    let name = segment.ident.to_string();
                    if self.models_config.derive_macros.iter().any(|m| m == &name) {
                        derives = true;
                    }
                }
                Ok(())
            });
            if let Err(err) = parsed {
                tracing::warn!(error = %err, "Malformed derive attribute");
            }
        }

        derives
    }

    /// Build a model definition from a struct declaration
    fn definition_from_struct(
        &self,
        item_struct: &ItemStruct,
        module_prefix: &str,
        file_path: &Path,
    ) -> Result<ModelDefinition> {
        let struct_name = item_struct.ident.to_string();
        let mut definition = ModelDefinition::new(&join_path(module_prefix, &struct_name));
        definition.file_path = Some(file_path.to_path_buf());

        for attr in item_struct.attrs.iter().filter(|attr| attr.path().is_ident("model")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("class") {
                    let value: LitStr = meta.value()?.parse()?;
                    definition.class_name = value.value();
                } else if meta.path.is_ident("table") {
                    let value: LitStr = meta.value()?.parse()?;
                    definition.table_name = Some(value.value());
                } else {
                    return Err(meta.error("unsupported model attribute"));
                }
                Ok(())
            })
            .map_err(|e| syntax_error(file_path, &struct_name, e))?;
        }

        let named = match &item_struct.fields {
            Fields::Named(named) => &named.named,
            Fields::Unit => return Ok(definition),
            Fields::Unnamed(_) => {
                return Err(Error::ModelRegistrationError(format!(
                    "Only named fields are supported in struct: {}",
                    struct_name
                )))
            }
        };

        for field in named {
            let Some(ident) = &field.ident else { continue };
            let rust_type = normalize_type(&field.ty.to_token_stream().to_string());
            let mut field_def = FieldDefinition::new(&ident.to_string(), &rust_type);
            let mut skip = false;

            for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("column")) {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        let value: LitStr = meta.value()?.parse()?;
                        field_def.column_name = Some(value.value());
                    } else if meta.path.is_ident("ty") {
                        let value: LitStr = meta.value()?.parse()?;
                        field_def.column_type = Some(value.value());
                    } else if meta.path.is_ident("default") {
                        let value: LitStr = meta.value()?.parse()?;
                        field_def.default = Some(value.value());
                    } else if meta.path.is_ident("nullable") {
                        field_def.nullable = if meta.input.peek(syn::Token![=]) {
                            meta.value()?.parse::<LitBool>()?.value()
                        } else {
                            true
                        };
                    } else if meta.path.is_ident("skip") {
                        skip = true;
                    } else {
                        return Err(meta.error("unsupported column attribute"));
                    }
                    Ok(())
                })
                .map_err(|e| syntax_error(file_path, &struct_name, e))?;
            }

            if !skip {
                definition.fields.push(field_def);
            }
        }

        Ok(definition)
    }

    /// Map a Rust type to a semantic column type and its nullability
    pub fn map_rust_type(&self, rust_type: &str) -> Result<(ColumnType, bool)> {
        let normalized = normalize_type(rust_type);
        let (inner, nullable) = match strip_wrapper(&normalized, "Option") {
            Some(inner) => (inner, true),
            None => (normalized.as_str(), false),
        };

        // Custom mappings first
        if let Some(custom) = &self.type_mapping.custom {
            if let Some(mapping) = custom
                .iter()
                .find(|m| normalize_type(&m.rust_type) == inner || m.rust_type == last_segment(inner))
            {
                return Ok((ColumnType::parse(&mapping.column_type), nullable));
            }
        }

        let column_type = match last_segment(inner) {
            "String" | "str" | "&str" | "char" => ColumnType::String,
            "i8" | "i16" | "u8" => ColumnType::SmallInteger,
            "i32" | "u16" | "u32" => ColumnType::Integer,
            "i64" | "u64" | "isize" | "usize" => ColumnType::BigInteger,
            "f32" => ColumnType::Float,
            "f64" => ColumnType::Double,
            "bool" => ColumnType::Boolean,
            "NaiveDateTime" | "PrimitiveDateTime" => ColumnType::DateTime,
            "DateTime" | "OffsetDateTime" => ColumnType::Timestamp,
            "NaiveDate" | "Date" => ColumnType::Date,
            "NaiveTime" | "Time" => ColumnType::Time,
            "Uuid" => ColumnType::Uuid,
            "Decimal" | "BigDecimal" => ColumnType::Decimal,
            "Value" | "Json" => ColumnType::Json,
            "Vec" if inner.ends_with("<u8>") => ColumnType::Binary,
            _ => {
                return Err(Error::TypeMappingError(format!(
                    "No mapping found for Rust type: {}",
                    rust_type
                )))
            }
        };

        Ok((column_type, nullable))
    }

    /// Column definition for a field
    fn column_for(&self, field: &FieldDefinition) -> Result<ColumnDef> {
        let name = field
            .column_name
            .clone()
            .unwrap_or_else(|| get_column_name(&field.name, &self.naming.column_style));

        let (column_type, option_nullable) = match &field.column_type {
            Some(tag) => (ColumnType::parse(tag), is_option(&field.rust_type)),
            None => self.map_rust_type(&field.rust_type)?,
        };

        let mut column = ColumnDef::new(&name, column_type).nullable(field.nullable || option_nullable);
        if let Some(default) = &field.default {
            column = column.default(parse_default(default));
        }

        Ok(column)
    }

    /// Declared table name, or the naming convention applied to the struct name
    pub fn table_name_for(&self, definition: &ModelDefinition) -> String {
        definition.table_name.clone().unwrap_or_else(|| {
            get_table_name(
                definition.struct_name(),
                &self.naming.table_style,
                self.naming.pluralize_tables,
            )
        })
    }

    /// Resolve a definition into snapshot metadata
    pub fn metadata_for(&self, definition: &ModelDefinition) -> Result<ModelMetadata> {
        let table_name = self.table_name_for(definition);

        let columns = definition
            .fields
            .iter()
            .map(|field| self.column_for(field))
            .collect::<Result<Vec<_>>>()?;

        Ok(ModelMetadata {
            class_name: definition.class_name.clone(),
            table_name,
            columns,
        })
    }

    /// Find a model by class name, or by struct name when that is unambiguous
    pub fn find(&self, identifier: &str) -> Option<&ModelDefinition> {
        if let Some(definition) = self.models.get(identifier) {
            return Some(definition);
        }

        let mut candidates = self
            .models
            .values()
            .filter(|definition| definition.struct_name() == identifier);
        match (candidates.next(), candidates.next()) {
            (Some(definition), None) => Some(definition),
            _ => None,
        }
    }

    /// Get all registered models, in registration order
    pub fn models(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl MetadataProvider for ModelRegistry {
    fn resolve(&self, identifier: &str) -> Result<ModelMetadata> {
        let definition = self
            .find(identifier)
            .ok_or_else(|| Error::ModelNotFoundError(identifier.to_string()))?;
        self.metadata_for(definition)
    }
}

fn syntax_error(file_path: &Path, struct_name: &str, err: syn::Error) -> Error {
    Error::SyntaxError(format!(
        "Invalid attribute on {} in {}: {}",
        struct_name,
        file_path.display(),
        err
    ))
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", prefix, name)
    }
}

/// Type as written, without the spaces a token stream inserts
fn normalize_type(rust_type: &str) -> String {
    rust_type.chars().filter(|c| !c.is_whitespace()).collect()
}

/// `Wrapper<T>` -> `T`
fn strip_wrapper<'a>(rust_type: &'a str, wrapper: &str) -> Option<&'a str> {
    let start = rust_type.find('<')?;
    if last_segment(&rust_type[..start]) != wrapper || !rust_type.ends_with('>') {
        return None;
    }
    Some(&rust_type[start + 1..rust_type.len() - 1])
}

fn is_option(rust_type: &str) -> bool {
    strip_wrapper(&normalize_type(rust_type), "Option").is_some()
}

/// Last path segment without generics: `chrono::DateTime<Utc>` -> `DateTime`
fn last_segment(rust_type: &str) -> &str {
    let base = rust_type.split('<').next().unwrap_or(rust_type);
    base.rsplit("::").next().unwrap_or(base)
}

fn parse_default(value: &str) -> serde_json::Value {
    serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()))
}
