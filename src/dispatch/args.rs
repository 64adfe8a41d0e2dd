//! Positional argument lists carried by a publish call.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::InvocationFault;

/// One positional argument slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// A concrete value.
    Value(Value),
    /// Explicit "no value"; binds to the parameter type's default.
    Nil,
    /// The publisher's value could not be serialized. Binding it fails.
    Unencodable(String),
}

/// Positional argument list delivered to every handler of a topic.
///
/// Each handler binds the slots to its own parameter types when it is
/// invoked, so one publish can feed handlers with different shapes as long
/// as the values deserialize into each of them.
///
/// ```
/// use topic_bus::{args, Args};
///
/// let a = Args::new().arg(7).arg("seven").nil();
/// assert_eq!(a.len(), 3);
///
/// let b = args![7, "seven"];
/// assert_eq!(b.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    slots: Vec<Slot>,
}

impl Args {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Append a value.
    pub fn arg<T: Serialize>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    /// Append an explicit "no value" placeholder.
    pub fn nil(mut self) -> Self {
        self.slots.push(Slot::Nil);
        self
    }

    /// Append a value in place.
    pub fn push<T: Serialize>(&mut self, value: T) {
        let slot = match serde_json::to_value(value) {
            Ok(value) => Slot::Value(value),
            Err(err) => Slot::Unencodable(err.to_string()),
        };
        self.slots.push(slot);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub(crate) fn expect_arity(&self, expected: usize) -> Result<(), InvocationFault> {
        if self.slots.len() == expected {
            Ok(())
        } else {
            Err(InvocationFault::Arity {
                expected,
                actual: self.slots.len(),
            })
        }
    }

    /// Bind the slot at `index` to `T`. `Nil` and JSON `null` yield `T::default()`.
    pub(crate) fn bind<T>(&self, index: usize) -> Result<T, InvocationFault>
    where
        T: DeserializeOwned + Default,
    {
        match self.slots.get(index) {
            None => Err(InvocationFault::Arity {
                expected: index + 1,
                actual: self.slots.len(),
            }),
            Some(Slot::Nil) | Some(Slot::Value(Value::Null)) => Ok(T::default()),
            Some(Slot::Value(value)) => {
                T::deserialize(value).map_err(|err| InvocationFault::Binding {
                    index,
                    reason: err.to_string(),
                })
            }
            Some(Slot::Unencodable(reason)) => Err(InvocationFault::Binding {
                index,
                reason: reason.clone(),
            }),
        }
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self {
            slots: values.into_iter().map(Slot::Value).collect(),
        }
    }
}

impl FromIterator<Slot> for Args {
    fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

/// Build an [`Args`] list from serializable expressions.
///
/// `None::<T>` serializes to `null`, which handlers receive as the default
/// of their parameter type.
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Args::new()$(.arg($value))+
    };
}
