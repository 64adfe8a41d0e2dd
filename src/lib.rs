pub mod dispatch;
mod error;
mod lock;

pub use dispatch::{
    Args, Bus, BusController, BusPublisher, BusSubscriber, Callback, Dispatcher,
    DispatcherBuilder, DispatcherConfig, FaultReport, Handler, Mode, Slot, SubscriptionId,
};
pub use error::{DispatchError, InvocationFault};
