use std::any::{type_name, Any, TypeId};

use crate::{
    component::dirty_mask::DirtyMask, constants::MAX_FIELDS_PER_COMPONENT, error::ConfigError,
};

/// Which side's writes to a component are authoritative
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplicationDirection {
    /// The server writes, clients only mirror
    ServerAuthoritative,
    /// The owning client writes, the server relays to observers
    ClientAuthoritative,
}

/// One replicated field: its name and the type its codec is looked up by
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: &'static str,
    type_id: TypeId,
    type_name: &'static str,
}

impl FieldDescriptor {
    pub fn of<T: Any>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Flattened description of a replicated component: base-type fields come
/// first, then the component's own, in declaration order. Bit `i` of the
/// component's dirty mask refers to `fields()[i]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentSchema {
    name: &'static str,
    direction: ReplicationDirection,
    fields: Vec<FieldDescriptor>,
}

impl ComponentSchema {
    pub fn builder(name: &'static str) -> SchemaBuilder {
        SchemaBuilder {
            name,
            direction: ReplicationDirection::ServerAuthoritative,
            base: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn direction(&self) -> ReplicationDirection {
        self.direction
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field_index(&self, name: &str) -> Option<u8> {
        self.fields
            .iter()
            .position(|field| field.name == name)
            .map(|index| index as u8)
    }

    /// Mask with one bit per declared field
    pub fn all_fields(&self) -> DirtyMask {
        DirtyMask::all(self.fields.len())
    }
}

pub struct SchemaBuilder {
    name: &'static str,
    direction: ReplicationDirection,
    base: Vec<FieldDescriptor>,
    fields: Vec<FieldDescriptor>,
}

impl SchemaBuilder {
    pub fn direction(mut self, direction: ReplicationDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn client_authoritative(self) -> Self {
        self.direction(ReplicationDirection::ClientAuthoritative)
    }

    /// Places the fields of `base` ahead of this component's own fields
    pub fn inherit(mut self, base: &ComponentSchema) -> Self {
        let mut flattened = base.fields.clone();
        flattened.append(&mut self.base);
        self.base = flattened;
        self
    }

    pub fn field<T: Any>(mut self, name: &'static str) -> Self {
        self.fields.push(FieldDescriptor::of::<T>(name));
        self
    }

    pub fn build(self) -> Result<ComponentSchema, ConfigError> {
        let mut fields = self.base;
        fields.extend(self.fields);
        if fields.len() > MAX_FIELDS_PER_COMPONENT {
            return Err(ConfigError::TooManyFields {
                component: self.name,
                count: fields.len(),
                max: MAX_FIELDS_PER_COMPONENT,
            });
        }
        Ok(ComponentSchema {
            name: self.name,
            direction: self.direction,
            fields,
        })
    }
}
