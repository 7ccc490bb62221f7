use std::sync::Arc;

use eagerload_types::Value;

/// Property values in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(property, value);
        self
    }

    /// Sets a property, replacing an earlier value in place.
    pub fn set(&mut self, property: impl Into<String>, value: impl Into<Value>) {
        let property = property.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(p, _)| *p == property) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((property, value)),
        }
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find_map(|(p, v)| (p == property).then_some(v))
    }

    pub fn contains(&self, property: &str) -> bool {
        self.get(property).is_some()
    }

    pub fn remove(&mut self, property: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(p, _)| p == property)?;
        Some(self.fields.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(p, v)| (p.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<P: Into<String>, V: Into<Value>> FromIterator<(P, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (P, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (property, value) in iter {
            record.set(property, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// A loaded navigation.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    Reference(Option<Arc<Entity>>),
    Collection(Vec<Arc<Entity>>),
}

/// A materialized entity with its eagerly loaded navigations.
///
/// A related row that recurs under the same navigation path is one shared
/// instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    entity: String,
    values: Record,
    navigations: Vec<(String, Navigation)>,
}

impl Entity {
    pub fn new(entity: impl Into<String>, values: Record, navigations: Vec<(String, Navigation)>) -> Self {
        Self {
            entity: entity.into(),
            values,
            navigations,
        }
    }

    /// Name of the entity type.
    #[inline]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[inline]
    pub fn values(&self) -> &Record {
        &self.values
    }

    /// A property value; `None` when the property was left unset.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    pub fn navigation(&self, name: &str) -> Option<&Navigation> {
        self.navigations
            .iter()
            .find_map(|(n, nav)| (n == name).then_some(nav))
    }

    pub fn navigations(&self) -> impl Iterator<Item = (&str, &Navigation)> {
        self.navigations.iter().map(|(n, nav)| (n.as_str(), nav))
    }

    /// The related entity of a loaded reference navigation.
    pub fn reference(&self, name: &str) -> Option<&Arc<Entity>> {
        match self.navigation(name)? {
            Navigation::Reference(target) => target.as_ref(),
            Navigation::Collection(_) => None,
        }
    }

    /// Items of a loaded collection navigation; empty when not loaded.
    pub fn collection(&self, name: &str) -> &[Arc<Entity>] {
        match self.navigation(name) {
            Some(Navigation::Collection(items)) => items,
            _ => &[],
        }
    }

    /// Renders the entity and its loaded navigations as JSON.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (property, value) in self.values.iter() {
            object.insert(property.to_string(), serde_json::Value::from(value));
        }
        for (name, navigation) in &self.navigations {
            let rendered = match navigation {
                Navigation::Reference(Some(target)) => target.to_json(),
                Navigation::Reference(None) => serde_json::Value::Null,
                Navigation::Collection(items) => {
                    serde_json::Value::Array(items.iter().map(|e| e.to_json()).collect())
                }
            };
            object.insert(name.clone(), rendered);
        }
        serde_json::Value::Object(object)
    }
}
