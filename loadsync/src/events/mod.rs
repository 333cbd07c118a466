//! Model-change notifications
//!
//! Every loader broadcasts a [`ModelChanged`] event when it starts and when it
//! finishes. Consumers (views, loggers, tests) subscribe to the bus and
//! refresh whatever they show for the task.
//!
//! ```rust,ignore
//! use loadsync::events::{ChangeCode, EventBus, ModelChanged};
//!
//! let bus = EventBus::with_default_capacity();
//! let mut rx = bus.subscribe();
//! bus.emit(ModelChanged::new("catalog-root".into(), ChangeCode::Started));
//! let event = rx.try_recv().unwrap();
//! ```

mod bus;
mod types;

pub use bus::{ChangeNotifier, DEFAULT_CHANNEL_CAPACITY, EventBus, create_event_bus};
pub use types::{ChangeCode, ModelChanged};
