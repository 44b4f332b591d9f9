//! Equipment, product and entitlement model
//!
//! Equipment types form a tree of types; a metric evaluates over one path
//! through that tree (a [`TypeChain`]), ordered from the bottom type to the top.

use crate::error::{ConfigurationError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Equipment instance identifier
pub type EquipmentId = String;

/// Product tag
pub type ProductId = String;

/// Attribute data kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    String,
    Int,
    Float,
}

impl DataKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataKind::Int | DataKind::Float)
    }
}

/// Attribute definition on an equipment type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Value kind
    pub data_kind: DataKind,
    /// Identifies the equipment instance
    #[serde(default)]
    pub identifier: bool,
    /// Holds the parent equipment identifier
    #[serde(default)]
    pub parent_identifier: bool,
    /// Shown in listings
    #[serde(default = "displayed_by_default")]
    pub displayed: bool,
    /// Indexed for search
    #[serde(default)]
    pub searchable: bool,
    /// Can be overridden with a what-if value at computation time
    #[serde(default)]
    pub simulated: bool,
}

fn displayed_by_default() -> bool {
    true
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_kind: DataKind) -> Self {
        Self {
            name: name.into(),
            data_kind,
            identifier: false,
            parent_identifier: false,
            displayed: true,
            searchable: false,
            simulated: false,
        }
    }

    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }
}

/// Equipment type definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentType {
    /// Type name
    pub name: String,
    /// Parent type name
    #[serde(default)]
    pub parent: Option<String>,
    /// Ordered attribute definitions
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl EquipmentType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            attributes: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Find an attribute by name (case-insensitive)
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Resolve an attribute, failing with a configuration error
    pub fn require_attribute(&self, name: &str) -> Result<&Attribute> {
        self.attribute(name).ok_or_else(|| {
            ConfigurationError::AttributeNotFound {
                type_name: self.name.clone(),
                attribute: name.to_string(),
            }
            .into()
        })
    }

    /// Resolve an attribute that must hold a number
    pub fn require_numeric_attribute(&self, name: &str) -> Result<&Attribute> {
        let attribute = self.require_attribute(name)?;
        if !attribute.data_kind.is_numeric() {
            return Err(ConfigurationError::AttributeNotNumeric {
                type_name: self.name.clone(),
                attribute: name.to_string(),
            }
            .into());
        }
        Ok(attribute)
    }
}

/// All equipment types of a scope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeCatalog {
    types: Vec<EquipmentType>,
}

impl TypeCatalog {
    pub fn new(types: Vec<EquipmentType>) -> Self {
        Self { types }
    }

    pub fn types(&self) -> &[EquipmentType] {
        &self.types
    }

    pub fn get(&self, name: &str) -> Option<&EquipmentType> {
        self.types.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn require(&self, name: &str) -> Result<&EquipmentType> {
        self.get(name).ok_or_else(|| {
            ConfigurationError::TypeNotFound {
                type_name: name.to_string(),
            }
            .into()
        })
    }

    /// Build the chain from `start` up to the root of the type tree
    pub fn parent_hierarchy(&self, start: &str) -> Result<TypeChain> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(self.require(start)?);

        while let Some(eq_type) = current {
            if !seen.insert(eq_type.name.to_lowercase()) {
                return Err(ConfigurationError::CyclicHierarchy(eq_type.name.clone()).into());
            }
            chain.push(eq_type.clone());
            current = match &eq_type.parent {
                Some(parent) => Some(self.require(parent)?),
                None => None,
            };
        }

        Ok(TypeChain::new(chain))
    }
}

/// Ordered path through the type tree, bottom to top
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeChain {
    types: Vec<EquipmentType>,
}

impl TypeChain {
    pub fn new(types: Vec<EquipmentType>) -> Self {
        Self { types }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EquipmentType> {
        self.types.get(index)
    }

    pub fn types(&self) -> &[EquipmentType] {
        &self.types
    }

    /// Index of the top type
    pub fn top(&self) -> usize {
        self.types.len().saturating_sub(1)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.types
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a type role to its index or fail with a configuration error
    pub fn require_index(&self, name: &str, role: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| {
            ConfigurationError::TypeNotInChain {
                type_name: name.to_string(),
                role: role.to_string(),
                start: self
                    .types
                    .first()
                    .map(|t| t.name.clone())
                    .unwrap_or_default(),
            }
            .into()
        })
    }

    /// Keep the levels `from..=to`
    pub fn slice(&self, from: usize, to: usize) -> TypeChain {
        let end = to.min(self.top());
        if from > end || self.types.is_empty() {
            return TypeChain::new(Vec::new());
        }
        TypeChain::new(self.types[from..=end].to_vec())
    }

    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }
}

impl fmt::Display for TypeChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(" -> "))
    }
}

/// Stored attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(Decimal),
}

impl AttributeValue {
    /// Numeric view of the value; strings are parsed when they hold a number
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            AttributeValue::Int(v) => Some(Decimal::from(*v)),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::String(s) => s.trim().parse::<Decimal>().ok(),
        }
    }

    /// Compare against a configured textual value
    pub fn matches(&self, expected: &str) -> bool {
        match self {
            AttributeValue::String(s) => s.trim().eq_ignore_ascii_case(expected.trim()),
            _ => match (self.as_decimal(), expected.trim().parse::<Decimal>()) {
                (Some(actual), Ok(expected)) => actual == expected,
                _ => false,
            },
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{}", s),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Equipment instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    /// Equipment identifier
    pub id: EquipmentId,
    /// Equipment type name
    pub equipment_type: String,
    /// Owning equipment (of the immediate parent type)
    #[serde(default)]
    pub parent: Option<EquipmentId>,
    /// Attribute values by name
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
}

impl Equipment {
    pub fn new(id: impl Into<String>, equipment_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            equipment_type: equipment_type.into(),
            parent: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_int(self, name: impl Into<String>, value: i64) -> Self {
        self.with_attr(name, AttributeValue::Int(value))
    }

    pub fn with_float(self, name: impl Into<String>, value: Decimal) -> Self {
        self.with_attr(name, AttributeValue::Float(value))
    }

    pub fn with_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_attr(name, AttributeValue::String(value.into()))
    }

    /// Attribute lookup (case-insensitive on the name)
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name).or_else(|| {
            self.attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    pub fn is_of_type(&self, type_name: &str) -> bool {
        self.equipment_type.eq_ignore_ascii_case(type_name)
    }
}

/// Product and its direct equipment links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product tag
    pub id: ProductId,
    /// Directly associated equipment
    #[serde(default)]
    pub equipment: Vec<EquipmentId>,
}

impl Product {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            equipment: Vec::new(),
        }
    }

    pub fn with_equipment<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.equipment.extend(ids.into_iter().map(Into::into));
        self
    }
}

/// Entitlement a product holds on a metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquiredRight {
    pub product: ProductId,
    pub metric: String,
    /// Software assurance; selects standalone mode for hybrid metrics
    #[serde(default)]
    pub software_assurance: bool,
}

impl AcquiredRight {
    pub fn new(product: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            metric: metric.into(),
            software_assurance: false,
        }
    }

    pub fn with_software_assurance(mut self) -> Self {
        self.software_assurance = true;
        self
    }
}

/// Users entitled to a product, optionally attached to equipment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub product: ProductId,
    #[serde(default)]
    pub equipment_id: Option<EquipmentId>,
    pub count: u64,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub concurrent: bool,
}

impl UserRecord {
    pub fn new(id: impl Into<String>, product: impl Into<String>, count: u64) -> Self {
        Self {
            id: id.into(),
            product: product.into(),
            equipment_id: None,
            count,
            profile: None,
            concurrent: false,
        }
    }

    pub fn on_equipment(mut self, equipment_id: impl Into<String>) -> Self {
        self.equipment_id = Some(equipment_id.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn concurrent(mut self) -> Self {
        self.concurrent = true;
        self
    }
}

/// Equipment capacity assigned to one metric for a product
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Allocation {
    pub product: ProductId,
    pub equipment_id: EquipmentId,
    pub metric: String,
}

impl Allocation {
    pub fn new(
        product: impl Into<String>,
        equipment_id: impl Into<String>,
        metric: impl Into<String>,
    ) -> Self {
        Self {
            product: product.into(),
            equipment_id: equipment_id.into(),
            metric: metric.into(),
        }
    }
}

/// User record assigned to one metric for a product
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserAllocation {
    pub product: ProductId,
    pub user_id: String,
    pub metric: String,
}

/// Named grouping of products sharing one entitlement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAggregation {
    pub name: String,
    #[serde(default)]
    pub products: Vec<ProductId>,
}
