//! Style targets that keyframe effects commit onto.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Surface a keyframe effect writes style strings to.
pub trait StyleTarget {
    /// Current value of `property`, if set.
    fn get_property(&self, property: &str) -> Option<String>;

    fn set_property(&mut self, property: &str, value: &str);

    fn remove_property(&mut self, property: &str);
}

/// Shared handle to a style target.
pub type TargetHandle = Rc<RefCell<dyn StyleTarget>>;

/// In-memory inline style declaration block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    properties: BTreeMap<String, String>,
}

impl InlineStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a new empty style in a [`TargetHandle`]-compatible cell.
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Builder-style setter for initial declarations.
    pub fn with(mut self, property: &str, value: &str) -> Self {
        self.set_property(property, value);
        self
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl StyleTarget for InlineStyle {
    fn get_property(&self, property: &str) -> Option<String> {
        self.properties.get(property).cloned()
    }

    fn set_property(&mut self, property: &str, value: &str) {
        self.properties.insert(property.to_string(), value.to_string());
    }

    fn remove_property(&mut self, property: &str) {
        self.properties.remove(property);
    }
}

/// Whether two handles refer to the same target.
pub fn same_target(a: &TargetHandle, b: &TargetHandle) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
