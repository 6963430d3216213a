use std::{
    cell::{Ref, RefCell, RefMut},
    io::Write,
    rc::{Rc, Weak},
};

use super::{Closure, Context, Executable, Object, ObjectHolder, RuntimeError};

const SELF_NAME: &str = "self";
const STR_METHOD: &str = "__str__";
const INIT_METHOD: &str = "__init__";

pub struct Method {
    pub name: String,
    pub formal_params: Vec<String>,
    pub body: Rc<dyn Executable>,
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("formal_params", &self.formal_params)
            .finish()
    }
}

impl Method {
    pub fn new<P: Into<String>>(
        name: impl Into<String>,
        formal_params: impl IntoIterator<Item = P>,
        body: impl Executable + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            formal_params: formal_params.into_iter().map(Into::into).collect(),
            body: Rc::new(body),
        }
    }

    /// Builds a method whose body is a Rust closure.
    pub fn from_fn<P, F>(
        name: impl Into<String>,
        formal_params: impl IntoIterator<Item = P>,
        body: F,
    ) -> Self
    where
        P: Into<String>,
        F: Fn(&mut Closure, &mut dyn Context) -> Result<ObjectHolder, RuntimeError> + 'static,
    {
        Self::new(name, formal_params, body)
    }

    pub fn arity(&self) -> usize {
        self.formal_params.len()
    }
}

/// A user class. Immutable once built; the parent chain is fixed at
/// construction and therefore acyclic.
pub struct Class {
    name: String,
    methods: Vec<Method>,
    parent: Option<Rc<Class>>,
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|c| c.name.clone()))
            .field("methods", &self.methods)
            .finish()
    }
}

impl Class {
    pub fn new(name: impl Into<String>, methods: Vec<Method>, parent: Option<Rc<Class>>) -> Self {
        Self {
            name: name.into(),
            methods,
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Class>> {
        self.parent.as_ref()
    }

    /// Looks a method up by name in this class, then in its ancestors.
    pub fn get_method(&self, name: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|method| method.name == name)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.get_method(name)))
    }

    /// Creates an instance, running `__init__` when one accepting exactly
    /// `args.len()` arguments is defined.
    pub fn instantiate(
        self: &Rc<Self>,
        args: &[ObjectHolder],
        context: &mut dyn Context,
    ) -> Result<ObjectHolder, RuntimeError> {
        let holder = ClassInstance::new(self.clone());
        let object = holder.object()?;
        if let Object::Instance(instance) = &*object {
            if instance.has_method(INIT_METHOD, args.len()) {
                instance.call(INIT_METHOD, args, context)?;
            }
        }
        Ok(holder)
    }
}

pub struct ClassInstance {
    class: Rc<Class>,
    this: Weak<Object>,
    fields: RefCell<Closure>,
}

impl std::fmt::Debug for ClassInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassInstance")
            .field("class", &self.class.name)
            .field("fields", &self.fields)
            .finish()
    }
}

impl ClassInstance {
    /// Allocates a new instance of `class`. Its fields start out holding only
    /// `self`, an aliasing reference back to the instance.
    pub fn new(class: Rc<Class>) -> ObjectHolder {
        let object = Rc::new_cyclic(|this: &Weak<Object>| {
            let mut fields = Closure::default();
            fields.insert(SELF_NAME.to_string(), ObjectHolder::alias(this.clone()));
            Object::Instance(ClassInstance {
                class,
                this: this.clone(),
                fields: RefCell::new(fields),
            })
        });
        ObjectHolder::from_rc(object)
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn fields(&self) -> Ref<'_, Closure> {
        self.fields.borrow()
    }

    /// Mutable field access. Callers must not rebind `self`.
    pub fn fields_mut(&self) -> RefMut<'_, Closure> {
        self.fields.borrow_mut()
    }

    pub fn has_method(&self, method: &str, argument_count: usize) -> bool {
        self.class
            .get_method(method)
            .is_some_and(|method| method.arity() == argument_count)
    }

    /// Calls `method` with `args` bound positionally to its formal
    /// parameters, in a fresh frame that also binds `self`.
    #[tracing::instrument(level = "debug", skip(self, args, context), fields(class = %self.class.name))]
    pub fn call(
        &self,
        method: &str,
        args: &[ObjectHolder],
        context: &mut dyn Context,
    ) -> Result<ObjectHolder, RuntimeError> {
        let found = self
            .class
            .get_method(method)
            .ok_or_else(|| RuntimeError::NoSuchMethod {
                class: self.class.name.clone(),
                method: method.to_string(),
            })?;
        if found.arity() != args.len() {
            return Err(RuntimeError::ArityMismatch {
                class: self.class.name.clone(),
                method: method.to_string(),
                expected: found.arity(),
                found: args.len(),
            });
        }

        let mut closure = Closure::default();
        closure.insert(SELF_NAME.to_string(), ObjectHolder::alias(self.this.clone()));
        for (param, arg) in found.formal_params.iter().zip(args) {
            closure.insert(param.clone(), arg.clone());
        }

        found.body.execute(&mut closure, context)
    }

    pub fn print(
        &self,
        out: &mut dyn Write,
        context: &mut dyn Context,
    ) -> Result<(), RuntimeError> {
        if self.has_method(STR_METHOD, 0) {
            tracing::debug!(class = %self.class.name, "printing through __str__");
            let rendered = self.call(STR_METHOD, &[], context)?;
            rendered.print(out, context)
        } else {
            write!(out, "<{} object at {:p}>", self.class.name, self)?;
            Ok(())
        }
    }
}
