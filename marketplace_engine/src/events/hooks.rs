use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    RefundClosedEvent,
    TransactionStatusChangedEvent,
    TransactionsCreatedEvent,
};

/// The publishing side of the registered hooks. Cheap to clone into every API object.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub transactions_created_producer: Vec<EventProducer<TransactionsCreatedEvent>>,
    pub status_changed_producer: Vec<EventProducer<TransactionStatusChangedEvent>>,
    pub refund_closed_producer: Vec<EventProducer<RefundClosedEvent>>,
}

impl EventProducers {
    pub async fn publish_transactions_created(&self, event: TransactionsCreatedEvent) {
        for producer in &self.transactions_created_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_status_changed(&self, event: TransactionStatusChangedEvent) {
        for producer in &self.status_changed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_refund_closed(&self, event: RefundClosedEvent) {
        for producer in &self.refund_closed_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_transactions_created: Option<EventHandler<TransactionsCreatedEvent>>,
    pub on_status_changed: Option<EventHandler<TransactionStatusChangedEvent>>,
    pub on_refund_closed: Option<EventHandler<RefundClosedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_transactions_created: hooks.on_transactions_created.map(|f| EventHandler::new(buffer_size, f)),
            on_status_changed: hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_refund_closed: hooks.on_refund_closed.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_transactions_created {
            result.transactions_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund_closed {
            result.refund_closed_producer.push(handler.subscribe());
        }
        result
    }

    pub fn start_handlers(self) {
        if let Some(handler) = self.on_transactions_created {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_refund_closed {
            tokio::spawn(handler.start_handler());
        }
    }
}

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_transactions_created: Option<Handler<TransactionsCreatedEvent>>,
    pub on_status_changed: Option<Handler<TransactionStatusChangedEvent>>,
    pub on_refund_closed: Option<Handler<RefundClosedEvent>>,
}

impl EventHooks {
    pub fn on_transactions_created<F>(&mut self, f: F) -> &mut Self
    where F: Fn(TransactionsCreatedEvent) -> BoxedFuture + Send + Sync + 'static {
        self.on_transactions_created = Some(Arc::new(f));
        self
    }

    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: Fn(TransactionStatusChangedEvent) -> BoxedFuture + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_refund_closed<F>(&mut self, f: F) -> &mut Self
    where F: Fn(RefundClosedEvent) -> BoxedFuture + Send + Sync + 'static {
        self.on_refund_closed = Some(Arc::new(f));
        self
    }
}
