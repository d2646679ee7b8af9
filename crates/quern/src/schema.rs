use crate::value::Value;
use std::{collections::BTreeMap, fmt, sync::Arc};
use thiserror::Error as ThisError;

///
/// FieldType
///
/// Scalar classification used for operator compatibility checks.
/// Deliberately smaller than a full type system: it only answers the
/// questions validation asks (orderability, text-ness, literal fit).
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Text,
    Timestamp,
}

impl FieldType {
    /// Whether range operators (`<`, `>`, sort keys) are defined.
    #[must_use]
    pub const fn is_orderable(self) -> bool {
        !matches!(self, Self::Bool)
    }

    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Text)
    }

    /// Whether a literal value fits this field type.
    /// Int literals are accepted for float fields (numeric widening).
    #[must_use]
    pub const fn matches_value(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Bool, Value::Bool(_))
                | (Self::Int, Value::Int(_))
                | (Self::Float, Value::Float(_) | Value::Int(_))
                | (Self::Text, Value::Text(_))
                | (Self::Timestamp, Value::Timestamp(_))
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

///
/// FieldDef
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub column: String,
    pub ty: FieldType,
}

///
/// RelationDef
///
/// Declared one-hop join path from this entity to a target entity.
/// Criteria may reference `relation.field`; anything without a declared
/// relation has no join path and fails compilation.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelationDef {
    pub name: String,
    pub target: String,
    pub local_column: String,
    pub target_column: String,
}

/// Standard audit field names appended by [`EntitySchemaBuilder::audited`].
pub const AUDIT_CREATED_BY: &str = "created_by";
pub const AUDIT_CREATED_AT: &str = "created_at";
pub const AUDIT_UPDATED_BY: &str = "updated_by";
pub const AUDIT_UPDATED_AT: &str = "updated_at";

///
/// EntitySchema
///
/// Immutable field map for one entity: logical field names, storage
/// columns, declared relations, and the primary key used as the
/// deterministic ordering tie-break. Built once at startup through the
/// validating builder and never mutated afterwards.
///

#[derive(Clone, Debug)]
pub struct EntitySchema {
    entity: String,
    table: String,
    fields: Vec<FieldDef>,
    by_name: BTreeMap<String, usize>,
    primary_key: usize,
    relations: BTreeMap<String, RelationDef>,
    audited: bool,
}

impl EntitySchema {
    #[must_use]
    pub fn builder(entity: impl Into<String>, table: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            entity: entity.into(),
            table: table.into(),
            fields: Vec::new(),
            primary_key: None,
            relations: Vec::new(),
            audited: false,
        }
    }

    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.by_name.get(name).map(|index| &self.fields[*index])
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    #[must_use]
    pub fn primary_key(&self) -> &FieldDef {
        &self.fields[self.primary_key]
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationDef> {
        self.relations.values()
    }

    #[must_use]
    pub const fn is_audited(&self) -> bool {
        self.audited
    }
}

///
/// EntitySchemaBuilder
///

#[derive(Debug)]
pub struct EntitySchemaBuilder {
    entity: String,
    table: String,
    fields: Vec<FieldDef>,
    primary_key: Option<String>,
    relations: Vec<RelationDef>,
    audited: bool,
}

impl EntitySchemaBuilder {
    /// Declare a field whose column name equals its logical name.
    #[must_use]
    pub fn field(self, name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        let column = name.clone();
        self.column(name, column, ty)
    }

    /// Declare a field with an explicit storage column name.
    #[must_use]
    pub fn column(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        ty: FieldType,
    ) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            column: column.into(),
            ty,
        });
        self
    }

    #[must_use]
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = Some(name.into());
        self
    }

    /// Declare a one-hop relation reachable from criteria as `name.field`.
    #[must_use]
    pub fn relation(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        local_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationDef {
            name: name.into(),
            target: target.into(),
            local_column: local_column.into(),
            target_column: target_column.into(),
        });
        self
    }

    /// Append the standard audit fields and mark the entity as audited.
    /// The engine stamps `updated_by`/`updated_at` on bulk updates.
    #[must_use]
    pub fn audited(self) -> Self {
        let mut builder = self
            .field(AUDIT_CREATED_BY, FieldType::Text)
            .field(AUDIT_CREATED_AT, FieldType::Timestamp)
            .field(AUDIT_UPDATED_BY, FieldType::Text)
            .field(AUDIT_UPDATED_AT, FieldType::Timestamp);
        builder.audited = true;
        builder
    }

    pub fn build(self) -> Result<EntitySchema, SchemaError> {
        let mut by_name = BTreeMap::new();
        for (index, field) in self.fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), index).is_some() {
                return Err(SchemaError::DuplicateField {
                    entity: self.entity,
                    field: field.name.clone(),
                });
            }
        }

        let pk_name = self.primary_key.ok_or_else(|| SchemaError::MissingPrimaryKey {
            entity: self.entity.clone(),
        })?;
        let primary_key = *by_name
            .get(&pk_name)
            .ok_or_else(|| SchemaError::UnknownPrimaryKey {
                entity: self.entity.clone(),
                field: pk_name.clone(),
            })?;
        if !self.fields[primary_key].ty.is_orderable() {
            return Err(SchemaError::UnorderablePrimaryKey {
                entity: self.entity,
                field: pk_name,
            });
        }

        let mut relations = BTreeMap::new();
        for relation in self.relations {
            if by_name.contains_key(&relation.name) {
                return Err(SchemaError::RelationShadowsField {
                    entity: self.entity,
                    relation: relation.name,
                });
            }
            if !self
                .fields
                .iter()
                .any(|field| field.column == relation.local_column)
            {
                return Err(SchemaError::UnknownRelationColumn {
                    entity: self.entity,
                    relation: relation.name,
                    column: relation.local_column,
                });
            }
            if relations
                .insert(relation.name.clone(), relation)
                .is_some()
            {
                return Err(SchemaError::DuplicateRelation {
                    entity: self.entity,
                });
            }
        }

        Ok(EntitySchema {
            entity: self.entity,
            table: self.table,
            fields: self.fields,
            by_name,
            primary_key,
            relations,
            audited: self.audited,
        })
    }
}

///
/// SchemaError
///

#[derive(Debug, ThisError)]
pub enum SchemaError {
    #[error("entity '{entity}' declares field '{field}' twice")]
    DuplicateField { entity: String, field: String },

    #[error("entity '{entity}' declares a relation twice")]
    DuplicateRelation { entity: String },

    #[error("entity '{entity}' has no primary key")]
    MissingPrimaryKey { entity: String },

    #[error("entity '{entity}' names unknown primary key field '{field}'")]
    UnknownPrimaryKey { entity: String, field: String },

    #[error("primary key '{field}' on entity '{entity}' is not orderable")]
    UnorderablePrimaryKey { entity: String, field: String },

    #[error("relation '{relation}' on entity '{entity}' shadows a field of the same name")]
    RelationShadowsField { entity: String, relation: String },

    #[error("relation '{relation}' on entity '{entity}' references unknown local column '{column}'")]
    UnknownRelationColumn {
        entity: String,
        relation: String,
        column: String,
    },

    #[error("duplicate entity '{entity}' in registry")]
    DuplicateEntity { entity: String },

    #[error("relation '{relation}' on entity '{entity}' targets unknown entity '{target}'")]
    UnknownRelationTarget {
        entity: String,
        relation: String,
        target: String,
    },

    #[error(
        "relation '{relation}' on entity '{entity}' joins on unknown column '{column}' of '{target}'"
    )]
    UnknownRelationTargetColumn {
        entity: String,
        relation: String,
        target: String,
        column: String,
    },
}

///
/// ResolveError
///
/// Field-path resolution failures. Criteria validation maps these onto
/// its own error vocabulary; compilation maps a missing relation onto a
/// missing-join-path failure.
///

#[derive(Debug, ThisError)]
pub enum ResolveError {
    #[error("unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    #[error("entity '{entity}' has no relation for path '{field}'")]
    UnknownRelation { entity: String, field: String },
}

///
/// ResolvedField
///
/// A logical field path resolved against the registry: the SQL column
/// expression it renders to, its type, and the join it requires (if any).
///

#[derive(Clone, Debug)]
pub struct ResolvedField<'a> {
    pub path: String,
    pub column: String,
    pub ty: FieldType,
    pub join: Option<&'a RelationDef>,
}

///
/// SchemaRegistry
///
/// Process-wide entity field maps, supplied at startup and immutable
/// afterwards. The registry is the only authority for resolving dotted
/// one-hop paths such as `team.name`.
///

#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    entities: BTreeMap<String, Arc<EntitySchema>>,
}

impl SchemaRegistry {
    pub fn new(schemas: Vec<EntitySchema>) -> Result<Self, SchemaError> {
        let mut entities: BTreeMap<String, Arc<EntitySchema>> = BTreeMap::new();
        for schema in schemas {
            let entity = schema.entity().to_string();
            if entities.insert(entity.clone(), Arc::new(schema)).is_some() {
                return Err(SchemaError::DuplicateEntity { entity });
            }
        }

        // Relations must land on a registered entity and an existing column.
        for schema in entities.values() {
            for relation in schema.relations() {
                let target = entities.get(&relation.target).ok_or_else(|| {
                    SchemaError::UnknownRelationTarget {
                        entity: schema.entity().to_string(),
                        relation: relation.name.clone(),
                        target: relation.target.clone(),
                    }
                })?;
                if !target
                    .fields()
                    .iter()
                    .any(|field| field.column == relation.target_column)
                {
                    return Err(SchemaError::UnknownRelationTargetColumn {
                        entity: schema.entity().to_string(),
                        relation: relation.name.clone(),
                        target: relation.target.clone(),
                        column: relation.target_column.clone(),
                    });
                }
            }
        }

        Ok(Self { entities })
    }

    #[must_use]
    pub fn get(&self, entity: &str) -> Option<&Arc<EntitySchema>> {
        self.entities.get(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntitySchema>> {
        self.entities.values()
    }

    /// Resolve a logical path (`age` or `team.name`) against `root`.
    ///
    /// Paths deeper than one hop are not supported and report the whole
    /// path as unknown.
    pub fn resolve<'a>(
        &'a self,
        root: &'a EntitySchema,
        path: &str,
    ) -> Result<ResolvedField<'a>, ResolveError> {
        if let Some(field) = root.field(path) {
            return Ok(ResolvedField {
                path: path.to_string(),
                column: field.column.clone(),
                ty: field.ty,
                join: None,
            });
        }

        let Some((head, rest)) = path.split_once('.') else {
            return Err(ResolveError::UnknownField {
                entity: root.entity().to_string(),
                field: path.to_string(),
            });
        };
        if rest.contains('.') {
            return Err(ResolveError::UnknownField {
                entity: root.entity().to_string(),
                field: path.to_string(),
            });
        }

        let relation = root
            .relation(head)
            .ok_or_else(|| ResolveError::UnknownRelation {
                entity: root.entity().to_string(),
                field: path.to_string(),
            })?;
        let target = self
            .entities
            .get(&relation.target)
            .ok_or_else(|| ResolveError::UnknownRelation {
                entity: root.entity().to_string(),
                field: path.to_string(),
            })?;
        let field = target
            .field(rest)
            .ok_or_else(|| ResolveError::UnknownField {
                entity: root.entity().to_string(),
                field: path.to_string(),
            })?;

        Ok(ResolvedField {
            path: path.to_string(),
            column: format!("{}.{}", target.table(), field.column),
            ty: field.ty,
            join: Some(relation),
        })
    }
}

///
/// TESTS
///
