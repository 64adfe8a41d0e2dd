//! Handler shapes and the type-erased [`Callback`] stored in each record.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::args::Args;
use crate::error::{DispatchError, InvocationFault};

/// A function that can be subscribed to a topic.
///
/// Implemented for `Fn` closures taking up to six parameters, each of which
/// must be `DeserializeOwned + Default`. `Params` is the tuple of parameter
/// types; it only exists to keep the implementations apart and is inferred
/// from the closure signature.
///
/// ```
/// use topic_bus::{args, Handler};
///
/// let handler = |name: String, count: u32| assert_eq!((name.as_str(), count), ("a", 0));
/// Handler::call(&handler, &args!["a", None::<u32>]).unwrap();
/// ```
pub trait Handler<Params>: Send + Sync + Sized + 'static {
    /// Bind `args` to the handler's parameters and invoke it.
    fn call(&self, args: &Args) -> Result<(), InvocationFault>;

    /// Erase the handler into a shareable [`Callback`].
    fn into_callback(self) -> Callback
    where
        Params: 'static,
    {
        Callback {
            inner: Arc::new(Typed {
                handler: self,
                _params: PhantomData,
            }),
        }
    }
}

impl<F> Handler<()> for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn call(&self, args: &Args) -> Result<(), InvocationFault> {
        args.expect_arity(0)?;
        (self)();
        Ok(())
    }
}

macro_rules! impl_handler {
    ($arity:expr; $($ty:ident => $idx:tt),+) => {
        impl<F, $($ty,)+> Handler<($($ty,)+)> for F
        where
            F: Fn($($ty),+) + Send + Sync + 'static,
            $($ty: DeserializeOwned + Default,)+
        {
            fn call(&self, args: &Args) -> Result<(), InvocationFault> {
                args.expect_arity($arity)?;
                (self)($(args.bind::<$ty>($idx)?),+);
                Ok(())
            }
        }
    };
}

impl_handler!(1; T1 => 0);
impl_handler!(2; T1 => 0, T2 => 1);
impl_handler!(3; T1 => 0, T2 => 1, T3 => 2);
impl_handler!(4; T1 => 0, T2 => 1, T3 => 2, T4 => 3);
impl_handler!(5; T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4);
impl_handler!(6; T1 => 0, T2 => 1, T3 => 2, T4 => 3, T5 => 4, T6 => 5);

trait Invoke: Send + Sync {
    fn invoke(&self, args: &Args) -> Result<(), InvocationFault>;
}

struct Typed<H, P> {
    handler: H,
    _params: PhantomData<fn() -> P>,
}

impl<H, P> Invoke for Typed<H, P>
where
    H: Handler<P>,
{
    fn invoke(&self, args: &Args) -> Result<(), InvocationFault> {
        self.handler.call(args)
    }
}

/// Marker for subscribing an already erased [`Callback`].
#[doc(hidden)]
pub struct Erased;

/// Shareable, type-erased handler.
///
/// Clones are the same callback: subscribing a clone and later passing
/// another clone to `Dispatcher::unsubscribe_callback` matches. Two callbacks
/// built separately from identical closures never match.
#[derive(Clone)]
pub struct Callback {
    inner: Arc<dyn Invoke>,
}

impl Callback {
    /// Erase a handler.
    pub fn new<H, P>(handler: H) -> Self
    where
        H: Handler<P>,
        P: 'static,
    {
        handler.into_callback()
    }

    /// Recover a callback from a dynamically typed value.
    ///
    /// Fails with [`DispatchError::InvalidHandler`] unless the value is a
    /// boxed [`Callback`].
    pub fn from_any(topic: &str, value: Box<dyn Any + Send + Sync>) -> Result<Self, DispatchError> {
        value
            .downcast::<Callback>()
            .map(|callback| *callback)
            .map_err(|_| DispatchError::InvalidHandler {
                topic: topic.to_string(),
            })
    }

    /// True if both values are clones of the same callback.
    pub fn same(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Invoke with panics caught and reported as [`InvocationFault::Panicked`].
    pub(crate) fn invoke(&self, args: &Args) -> Result<(), InvocationFault> {
        panic::catch_unwind(AssertUnwindSafe(|| self.inner.invoke(args)))
            .unwrap_or_else(|payload| Err(InvocationFault::from_panic(payload)))
    }
}

impl Handler<Erased> for Callback {
    fn call(&self, args: &Args) -> Result<(), InvocationFault> {
        self.inner.invoke(args)
    }

    fn into_callback(self) -> Callback {
        self
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("ptr", &Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}
