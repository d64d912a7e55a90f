pub mod message;
pub mod queue;
pub mod record;
pub mod schema;
pub mod store;

pub use message::{decode_envelope, encode_payload, DecodeError, OrderAction, OrderMessage};
pub use queue::{Delivery, OrderQueue, QueueError};
pub use record::{OrderItem, OrderRecord};
pub use store::{OrderStore, StoreError};
