//! In-process publish/subscribe broker
//!
//! One broadcast channel per exchange, created lazily on first use. Payloads
//! are the JSON encoding of an IU; subscribers parse them themselves so a
//! malformed message only affects the listener that reads it.

use crate::iu::{Iu, IuError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Encoded message as it travels on an exchange
pub type Payload = Arc<str>;

/// Destination for IUs produced by this process
pub trait IuSink: Send + Sync {
    /// Publish an IU on its own exchange
    fn publish(&self, iu: &Iu) -> Result<(), IuError>;
}

impl<T: IuSink + ?Sized> IuSink for Arc<T> {
    fn publish(&self, iu: &Iu) -> Result<(), IuError> {
        (**self).publish(iu)
    }
}

/// Cloneable handle to the broker
#[derive(Clone)]
pub struct Bus {
    exchanges: Arc<Mutex<HashMap<String, broadcast::Sender<Payload>>>>,
    capacity: usize,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        Self {
            exchanges: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    fn sender(&self, exchange: &str) -> broadcast::Sender<Payload> {
        let mut exchanges = self
            .exchanges
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        exchanges
            .entry(exchange.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to every payload published on `exchange` from now on
    pub fn subscribe(&self, exchange: &str) -> broadcast::Receiver<Payload> {
        self.sender(exchange).subscribe()
    }

    /// Publish an already-encoded payload. Returns the number of subscribers
    /// that received it; an exchange nobody listens to simply drops it.
    pub fn publish_raw(&self, exchange: &str, payload: Payload) -> usize {
        self.sender(exchange).send(payload).unwrap_or(0)
    }
}

impl IuSink for Bus {
    fn publish(&self, iu: &Iu) -> Result<(), IuError> {
        let payload: Payload = iu.to_json()?.into();
        let receivers = self.publish_raw(&iu.exchange, payload);
        tracing::debug!(
            exchange = %iu.exchange,
            iu_id = %iu.id,
            update_type = ?iu.update_type,
            body = %iu.body,
            receivers,
            "Published IU"
        );
        Ok(())
    }
}
