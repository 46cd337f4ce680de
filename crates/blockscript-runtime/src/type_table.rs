//! Type table
//!
//! Registry of every type a compilation unit knows about: the built-in
//! primitives, the float vectors and user structs. Types are compared by
//! identity, so two structs with the same layout are still distinct.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Width of a register and of every scalar type
pub const CANON_REGISTER_BYTESIZE: u32 = 4;

/// Identity of a registered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(u32);

impl TypeId {
    pub const VOID: TypeId = TypeId(0);
    pub const INT: TypeId = TypeId(1);
    pub const FLOAT: TypeId = TypeId(2);
    pub const BOOL: TypeId = TypeId(3);
    pub const STRING: TypeId = TypeId(4);
    pub const FLOAT2: TypeId = TypeId(5);
    pub const FLOAT3: TypeId = TypeId(6);
    pub const FLOAT4: TypeId = TypeId(7);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout of one struct field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDesc {
    pub name: String,
    pub ty: TypeId,
    /// Byte offset inside the struct
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TypeKind {
    Void,
    Int,
    Float,
    Bool,
    String,
    Struct { fields: Vec<FieldDesc> },
}

/// Registered type descriptor
#[derive(Debug, Clone, Serialize)]
pub struct TypeDesc {
    pub id: TypeId,
    pub name: String,
    pub byte_size: u32,
    pub kind: TypeKind,
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDesc {}

impl TypeDesc {
    /// Fits in a register
    pub fn is_scalar(&self) -> bool {
        !matches!(self.kind, TypeKind::Void | TypeKind::Struct { .. })
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct { .. })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDesc> {
        match &self.kind {
            TypeKind::Struct { fields } => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }

    pub fn fields(&self) -> &[FieldDesc] {
        match &self.kind {
            TypeKind::Struct { fields } => fields,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("type '{0}' is already registered")]
    Duplicate(String),

    #[error("struct '{0}' has no fields")]
    EmptyStruct(String),

    #[error("struct '{name}' declares field '{field}' twice")]
    DuplicateField { name: String, field: String },

    #[error("field '{field}' of struct '{name}' cannot be void")]
    VoidField { name: String, field: String },

    #[error("field '{field}' of struct '{name}' uses type id {ty}, which this table does not define")]
    UnknownType { name: String, field: String, ty: u32 },
}

/// Type registry for one compilation arena
#[derive(Debug, Clone)]
pub struct TypeTable {
    types: Vec<TypeDesc>,
    by_name: HashMap<String, TypeId>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// Table pre-populated with the built-in types
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            by_name: HashMap::new(),
        };
        table.push("void", 0, TypeKind::Void);
        table.push("int", 4, TypeKind::Int);
        table.push("float", 4, TypeKind::Float);
        table.push("bool", 4, TypeKind::Bool);
        table.push("string", 4, TypeKind::String);
        for (name, lanes) in [("float2", 2usize), ("float3", 3), ("float4", 4)] {
            let fields = ["x", "y", "z", "w"][..lanes]
                .iter()
                .enumerate()
                .map(|(i, lane)| (lane.to_string(), TypeId::FLOAT, i as u32 * 4))
                .collect::<Vec<_>>();
            table.push_struct(name, fields);
        }
        table
    }

    fn push(&mut self, name: &str, byte_size: u32, kind: TypeKind) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeDesc {
            id,
            name: name.to_string(),
            byte_size,
            kind,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn push_struct(&mut self, name: &str, fields: Vec<(String, TypeId, u32)>) -> TypeId {
        let byte_size = fields
            .iter()
            .map(|(_, ty, offset)| offset + self.size_of(*ty))
            .max()
            .unwrap_or(0);
        let fields = fields
            .into_iter()
            .map(|(name, ty, offset)| FieldDesc { name, ty, offset })
            .collect();
        self.push(name, byte_size, TypeKind::Struct { fields })
    }

    /// Register a struct whose fields are laid out in declaration order
    pub fn register_type(&mut self, name: &str, fields: &[(&str, TypeId)]) -> Result<TypeId, TypeError> {
        if self.by_name.contains_key(name) {
            return Err(TypeError::Duplicate(name.to_string()));
        }
        if fields.is_empty() {
            return Err(TypeError::EmptyStruct(name.to_string()));
        }

        let mut layout: Vec<(String, TypeId, u32)> = Vec::with_capacity(fields.len());
        let mut offset = 0;
        for (field, ty) in fields {
            if layout.iter().any(|(existing, _, _)| existing == field) {
                return Err(TypeError::DuplicateField {
                    name: name.to_string(),
                    field: field.to_string(),
                });
            }
            if *ty == TypeId::VOID {
                return Err(TypeError::VoidField {
                    name: name.to_string(),
                    field: field.to_string(),
                });
            }
            if self.types.get(ty.index()).is_none() {
                return Err(TypeError::UnknownType {
                    name: name.to_string(),
                    field: field.to_string(),
                    ty: ty.0,
                });
            }
            layout.push((field.to_string(), *ty, offset));
            offset += self.size_of(*ty);
        }

        Ok(self.push_struct(name, layout))
    }

    /// Exact, case-sensitive lookup
    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Descriptor for an id issued by this table (or the table it was cloned from)
    pub fn desc(&self, id: TypeId) -> &TypeDesc {
        &self.types[id.index()]
    }

    pub fn size_of(&self, id: TypeId) -> u32 {
        self.desc(id).byte_size
    }

    pub fn name_of(&self, id: TypeId) -> &str {
        &self.desc(id).name
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDesc> {
        self.types.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_sizes() {
        let table = TypeTable::new();
        let sizes: Vec<_> = ["void", "int", "float", "bool", "string", "float2", "float3", "float4"]
            .iter()
            .map(|name| table.size_of(table.type_by_name(name).unwrap()))
            .collect();
        assert_eq!(sizes, vec![0, 4, 4, 4, 4, 8, 12, 16]);
        assert_eq!(table.type_by_name("float3"), Some(TypeId::FLOAT3));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let table = TypeTable::new();
        assert_eq!(table.type_by_name("Int"), None);
        assert_eq!(table.type_by_name("int "), None);
    }

    #[test]
    fn test_struct_layout() {
        let mut table = TypeTable::new();
        let light = table
            .register_type("Light", &[("pos", TypeId::FLOAT3), ("intensity", TypeId::FLOAT)])
            .unwrap();
        let desc = table.desc(light);
        assert_eq!(desc.byte_size, 16);
        assert_eq!(desc.field("intensity").map(|f| f.offset), Some(12));
        assert_eq!(desc.field("pos").map(|f| f.ty), Some(TypeId::FLOAT3));
        assert!(desc.is_struct());
        assert!(!desc.is_scalar());
    }

    #[test]
    fn test_identical_layouts_are_distinct_types() {
        let mut table = TypeTable::new();
        let a = table.register_type("A", &[("v", TypeId::INT)]).unwrap();
        let b = table.register_type("B", &[("v", TypeId::INT)]).unwrap();
        assert_ne!(a, b);
        assert_ne!(table.desc(a), table.desc(b));
        assert_eq!(table.desc(a), table.desc(a));
    }

    #[test]
    fn test_register_errors() {
        let mut table = TypeTable::new();
        assert_eq!(
            table.register_type("int", &[("v", TypeId::INT)]),
            Err(TypeError::Duplicate("int".to_string()))
        );
        assert_eq!(
            table.register_type("E", &[]),
            Err(TypeError::EmptyStruct("E".to_string()))
        );
        assert!(matches!(
            table.register_type("D", &[("v", TypeId::INT), ("v", TypeId::FLOAT)]),
            Err(TypeError::DuplicateField { .. })
        ));
        assert!(matches!(
            table.register_type("V", &[("v", TypeId::VOID)]),
            Err(TypeError::VoidField { .. })
        ));
        assert_eq!(table.type_by_name("D"), None);
    }

    #[test]
    fn test_register_rejects_foreign_id() {
        let mut other = TypeTable::new();
        other.register_type("A", &[("v", TypeId::INT)]).unwrap();
        let foreign = other.register_type("B", &[("v", TypeId::FLOAT)]).unwrap();

        let mut table = TypeTable::new();
        assert_eq!(
            table.register_type("C", &[("b", foreign)]),
            Err(TypeError::UnknownType {
                name: "C".to_string(),
                field: "b".to_string(),
                ty: foreign.0,
            })
        );
        assert_eq!(table.type_by_name("C"), None);
    }
}
