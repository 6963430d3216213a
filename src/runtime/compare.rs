//! Comparison protocol.
//!
//! Only `equal` and `less` inspect their operands: an instance on the left
//! defers to its `__eq__`/`__lt__` method, values of the same kind compare by
//! their natural order. The other four operators are derived from those two
//! and never call user code on their own.

use std::cmp::Ordering;

use super::{is_true, ClassInstance, Context, Object, ObjectHolder, RuntimeError};

const EQ_METHOD: &str = "__eq__";
const LT_METHOD: &str = "__lt__";

/// How a pair of operands can be compared.
enum Comparable<'a> {
    /// The left operand is an instance with its own hook.
    Instance(&'a ClassInstance),
    /// Both operands are values of the same kind.
    Values(Ordering),
    BothNone,
    Incomparable,
}

fn comparable<'a>(lhs: Option<&'a Object>, rhs: Option<&Object>) -> Comparable<'a> {
    match (lhs, rhs) {
        (Some(Object::Instance(instance)), _) => Comparable::Instance(instance),
        (Some(Object::Number(a)), Some(Object::Number(b))) => Comparable::Values(a.cmp(b)),
        (Some(Object::String(a)), Some(Object::String(b))) => Comparable::Values(a.cmp(b)),
        (Some(Object::Bool(a)), Some(Object::Bool(b))) => Comparable::Values(a.cmp(b)),
        (None, None) => Comparable::BothNone,
        _ => Comparable::Incomparable,
    }
}

fn call_hook(
    instance: &ClassInstance,
    hook: &str,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    tracing::debug!(class = %instance.class().name(), hook, "comparing through user method");
    let result = instance.call(hook, std::slice::from_ref(rhs), context)?;
    Ok(is_true(&result))
}

fn incomparable(operation: &'static str, lhs: &ObjectHolder, rhs: &ObjectHolder) -> RuntimeError {
    RuntimeError::CannotCompare {
        operation,
        lhs: lhs.describe(),
        rhs: rhs.describe(),
    }
}

pub fn equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    let (left, right) = (lhs.resolve()?, rhs.resolve()?);
    match comparable(left.as_deref(), right.as_deref()) {
        Comparable::Instance(instance) => call_hook(instance, EQ_METHOD, rhs, context),
        Comparable::Values(ordering) => Ok(ordering.is_eq()),
        Comparable::BothNone => Ok(true),
        Comparable::Incomparable => Err(incomparable("equality", lhs, rhs)),
    }
}

pub fn less(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    let (left, right) = (lhs.resolve()?, rhs.resolve()?);
    match comparable(left.as_deref(), right.as_deref()) {
        Comparable::Instance(instance) => call_hook(instance, LT_METHOD, rhs, context),
        Comparable::Values(ordering) => Ok(ordering.is_lt()),
        Comparable::BothNone | Comparable::Incomparable => Err(incomparable("order", lhs, rhs)),
    }
}

pub fn not_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!equal(lhs, rhs, context)?)
}

pub fn less_or_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(less(lhs, rhs, context)? || equal(lhs, rhs, context)?)
}

pub fn greater(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!less_or_equal(lhs, rhs, context)?)
}

pub fn greater_or_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    context: &mut dyn Context,
) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, context)?)
}
