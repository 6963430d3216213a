mod class;
mod compare;

use std::{
    fmt::Debug,
    io::Write,
    rc::{Rc, Weak},
};

use rustc_hash::FxHashMap;

pub use self::{
    class::{Class, ClassInstance, Method},
    compare::{equal, greater, greater_or_equal, less, less_or_equal, not_equal},
};

/// Named-variable environment: instance fields and method call frames alike.
pub type Closure = FxHashMap<String, ObjectHolder>;

/// Execution context threaded through printing, calls and comparisons.
pub trait Context {
    fn output(&mut self) -> &mut dyn Write;
}

/// A [`Context`] writing its output to any writer.
#[derive(Debug, Default)]
pub struct SimpleContext<W> {
    output: W,
}

impl<W: Write> SimpleContext<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: Write> Context for SimpleContext<W> {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.output
    }
}

/// A method body. Supplied by the statement layer; called once per method
/// invocation with a freshly built call frame.
pub trait Executable {
    fn execute(
        &self,
        closure: &mut Closure,
        context: &mut dyn Context,
    ) -> Result<ObjectHolder, RuntimeError>;
}

impl<F> Executable for F
where
    F: Fn(&mut Closure, &mut dyn Context) -> Result<ObjectHolder, RuntimeError>,
{
    fn execute(
        &self,
        closure: &mut Closure,
        context: &mut dyn Context,
    ) -> Result<ObjectHolder, RuntimeError> {
        self(closure, context)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("No such method: {class}.{method}")]
    NoSuchMethod { class: String, method: String },
    #[error("Invalid method call: {class}.{method} called with {found} arguments, expected {expected}")]
    ArityMismatch {
        class: String,
        method: String,
        expected: usize,
        found: usize,
    },
    #[error("Cannot compare objects for {operation}: {lhs} and {rhs}")]
    CannotCompare {
        operation: &'static str,
        lhs: String,
        rhs: String,
    },
    #[error("Dereference of an empty object holder")]
    InvalidHolder,
}

pub enum Object {
    Number(i32),
    String(String),
    Bool(bool),
    Class(Rc<Class>),
    Instance(ClassInstance),
}

impl Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Object::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Object::String(s) => f.debug_tuple("String").field(s).finish(),
            Object::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Object::Class(class) => f.debug_tuple("Class").field(class).finish(),
            Object::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
        }
    }
}

impl Object {
    pub fn type_name(&self) -> String {
        match self {
            Object::Number(_) => "Number".to_string(),
            Object::String(_) => "String".to_string(),
            Object::Bool(_) => "Bool".to_string(),
            Object::Class(class) => format!("Class {}", class.name()),
            Object::Instance(instance) => format!("instance of {}", instance.class().name()),
        }
    }

    pub fn print(
        &self,
        out: &mut dyn Write,
        context: &mut dyn Context,
    ) -> Result<(), RuntimeError> {
        match self {
            Object::Number(n) => write!(out, "{}", n)?,
            Object::String(s) => write!(out, "{}", s)?,
            Object::Bool(b) => write!(out, "{}", if *b { "True" } else { "False" })?,
            Object::Class(class) => write!(out, "Class {}", class.name())?,
            Object::Instance(instance) => instance.print(out, context)?,
        }
        Ok(())
    }
}

#[derive(Clone)]
enum Handle {
    Owned(Rc<Object>),
    Alias(Weak<Object>),
}

/// Nullable reference to a runtime value.
///
/// An owning holder keeps its value alive. An aliasing holder only points at
/// a value someone else owns; instances use one for their `self` binding so
/// that an instance never owns itself.
#[derive(Clone, Default)]
pub struct ObjectHolder(Option<Handle>);

impl Debug for ObjectHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(Handle::Owned(object)) => f.debug_tuple("Owned").field(&**object).finish(),
            Some(Handle::Alias(object)) => write!(f, "Alias({:p})", object.as_ptr()),
            None => write!(f, "None"),
        }
    }
}

impl From<Object> for ObjectHolder {
    fn from(object: Object) -> Self {
        Self::own(object)
    }
}

impl ObjectHolder {
    pub fn own(object: Object) -> Self {
        Self(Some(Handle::Owned(Rc::new(object))))
    }

    /// Aliasing holder for a value that stays owned elsewhere.
    pub fn share(object: &Rc<Object>) -> Self {
        Self(Some(Handle::Alias(Rc::downgrade(object))))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn number(value: i32) -> Self {
        Self::own(Object::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::own(Object::String(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        Self::own(Object::Bool(value))
    }

    pub fn class(class: Rc<Class>) -> Self {
        Self::own(Object::Class(class))
    }

    pub(crate) fn from_rc(object: Rc<Object>) -> Self {
        Self(Some(Handle::Owned(object)))
    }

    pub(crate) fn alias(object: Weak<Object>) -> Self {
        Self(Some(Handle::Alias(object)))
    }

    /// The referenced value, or `None` for the null holder and for an alias
    /// whose owner is gone.
    pub fn get(&self) -> Option<Rc<Object>> {
        match &self.0 {
            Some(Handle::Owned(object)) => Some(object.clone()),
            Some(Handle::Alias(object)) => object.upgrade(),
            None => None,
        }
    }

    /// Dereferences the holder, failing on a null or dangling one.
    pub fn object(&self) -> Result<Rc<Object>, RuntimeError> {
        self.get().ok_or(RuntimeError::InvalidHolder)
    }

    /// `Ok(None)` for the null holder, the value for a live one, and
    /// `InvalidHolder` for an alias whose owner is gone.
    pub fn resolve(&self) -> Result<Option<Rc<Object>>, RuntimeError> {
        match &self.0 {
            Some(Handle::Owned(object)) => Ok(Some(object.clone())),
            Some(Handle::Alias(object)) => object
                .upgrade()
                .map(Some)
                .ok_or(RuntimeError::InvalidHolder),
            None => Ok(None),
        }
    }

    /// True only for the null holder; a dangling alias is not `None`.
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn is_dangling(&self) -> bool {
        matches!(&self.0, Some(Handle::Alias(object)) if object.strong_count() == 0)
    }

    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.0, Some(Handle::Alias(_)))
    }

    /// Whether both holders refer to the very same value.
    pub fn ptr_eq(&self, other: &ObjectHolder) -> bool {
        match (self.get(), other.get()) {
            (Some(a), Some(b)) => Rc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<i32> {
        match self.get().as_deref() {
            Some(Object::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.get().as_deref() {
            Some(Object::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self.get().as_deref() {
            Some(Object::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<Rc<Class>> {
        match self.get().as_deref() {
            Some(Object::Class(class)) => Some(class.clone()),
            _ => None,
        }
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.get().as_deref(), Some(Object::Instance(_)))
    }

    /// Prints the value, or `None` for the null holder.
    pub fn print(
        &self,
        out: &mut dyn Write,
        context: &mut dyn Context,
    ) -> Result<(), RuntimeError> {
        match self.resolve()? {
            Some(object) => object.print(out, context),
            None => {
                write!(out, "None")?;
                Ok(())
            }
        }
    }

    fn describe(&self) -> String {
        self.get()
            .map(|object| object.type_name())
            .unwrap_or_else(|| "None".to_string())
    }
}

/// Truthiness: non-zero numbers, non-empty strings and `True`. Everything
/// else, `None` included, is false.
pub fn is_true(object: &ObjectHolder) -> bool {
    match object.get().as_deref() {
        Some(Object::Bool(b)) => *b,
        Some(Object::Number(n)) => *n != 0,
        Some(Object::String(s)) => !s.is_empty(),
        _ => false,
    }
}

/// Renders a value the way `print` would.
pub fn to_display_string(
    object: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<String, RuntimeError> {
    let mut buffer = Vec::new();
    object.print(&mut buffer, context)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Prints a value to the context's output.
pub fn print(object: &ObjectHolder, context: &mut dyn Context) -> Result<(), RuntimeError> {
    let rendered = to_display_string(object, context)?;
    write!(context.output(), "{}", rendered)?;
    Ok(())
}
