use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::function::Function;
use crate::value::Value;

/// Name of the method run by a constructor call.
pub const INITIALIZER: &str = "init";

#[derive(Debug)]
pub struct Class {
    name: String,
    methods: HashMap<String, Rc<Function>>,
    superclass: Option<Rc<Class>>,
}

impl Class {
    pub fn new(
        name: impl Into<String>,
        methods: HashMap<String, Rc<Function>>,
        superclass: Option<Rc<Class>>,
    ) -> Self {
        Self {
            name: name.into(),
            methods,
            superclass,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&Rc<Class>> {
        self.superclass.as_ref()
    }

    /// Own methods only.
    pub fn methods(&self) -> impl Iterator<Item = &Rc<Function>> {
        self.methods.values()
    }

    /// Look a method up here, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        match self.methods.get(name) {
            Some(method) => Some(method.clone()),
            None => self.superclass.as_ref()?.find_method(name),
        }
    }
}

/// An object created by calling a class.
pub struct Instance {
    class: Rc<Class>,
    fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn fields(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }
}

// Fields may point back at the instance itself.
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.fields.keys().collect();
        names.sort();

        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .field("fields", &names)
            .finish()
    }
}
