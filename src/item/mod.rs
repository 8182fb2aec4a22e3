//! Item model.
//!
//! An item is a plain struct that embeds a [`BaseItem`] (the storage-managed
//! fields) and exposes its remaining fields through [`FieldDescriptor`]s so
//! that proxies can diff them and queries can address them by name.
//! `#[derive(TrackedItem)]` generates the [`Item`] impl.

mod base;
pub mod manager;
pub mod proxy;

pub use base::BaseItem;
pub use manager::ProxyManager;
pub use proxy::{ItemProxy, PropertyChange};

use crate::core::{DataError, Result, Value, ValueKind};

/// Static description of one item field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Rust field name, used by the query builder.
    pub name: &'static str,
    /// Name the field is stored under.
    pub external_name: &'static str,
    pub kind: ValueKind,
    pub nullable: bool,
    /// Whether changes to this field are recorded in save events.
    pub tracked: bool,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, external_name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            external_name,
            kind,
            nullable: false,
            tracked: true,
        }
    }

    pub const fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub const fn tracked(mut self, tracked: bool) -> Self {
        self.tracked = tracked;
        self
    }
}

/// A persistable domain entity.
pub trait Item: Clone + Send + Sync + 'static {
    /// Discriminator stored in `typeName`.
    const TYPE_NAME: &'static str;

    fn base(&self) -> &BaseItem;
    fn base_mut(&mut self) -> &mut BaseItem;

    /// Descriptors of the domain (non-base) fields, in declaration order.
    fn fields() -> &'static [FieldDescriptor];

    fn get_domain_field(&self, name: &str) -> Option<Value>;

    /// Returns `Ok(false)` when no domain field has this name.
    fn set_domain_field(&mut self, name: &str, value: Value) -> Result<bool>;

    fn descriptor(name: &str) -> Option<&'static FieldDescriptor> {
        BaseItem::FIELDS
            .iter()
            .chain(Self::fields().iter())
            .find(|field| field.name == name)
    }

    fn descriptor_by_external_name(external_name: &str) -> Option<&'static FieldDescriptor> {
        BaseItem::FIELDS
            .iter()
            .chain(Self::fields().iter())
            .find(|field| field.external_name == external_name)
    }

    fn get_field(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.base().get_field(name) {
            return Ok(value);
        }
        self.get_domain_field(name)
            .ok_or_else(|| DataError::FieldNotFound(name.to_string(), Self::TYPE_NAME))
    }

    fn get_field_by_external_name(&self, external_name: &str) -> Result<Value> {
        let descriptor = Self::descriptor_by_external_name(external_name).ok_or_else(|| {
            DataError::FieldNotFound(external_name.to_string(), Self::TYPE_NAME)
        })?;
        self.get_field(descriptor.name)
    }

    /// Sets a domain field; base fields are owned by the provider and storage.
    fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        if BaseItem::FIELDS.iter().any(|field| field.name == name) {
            return Err(DataError::InvalidOperation(format!(
                "field '{}' of '{}' is managed by storage",
                name,
                Self::TYPE_NAME
            )));
        }
        if self.set_domain_field(name, value)? {
            Ok(())
        } else {
            Err(DataError::FieldNotFound(name.to_string(), Self::TYPE_NAME))
        }
    }

    fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.base_mut().etag = Some(etag.into());
        self
    }
}
