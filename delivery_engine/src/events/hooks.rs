use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    CommissionCreditedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderStatusChangedEvent,
    WithdrawalRequestedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_status_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub commission_producer: Vec<EventProducer<CommissionCreditedEvent>>,
    pub withdrawal_producer: Vec<EventProducer<WithdrawalRequestedEvent>>,
}

pub struct EventHandlers {
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_commission_credited: Option<EventHandler<CommissionCreditedEvent>>,
    pub on_withdrawal_requested: Option<EventHandler<WithdrawalRequestedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_status_changed = hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_commission_credited = hooks.on_commission_credited.map(|f| EventHandler::new(buffer_size, f));
        let on_withdrawal_requested = hooks.on_withdrawal_requested.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_status_changed, on_commission_credited, on_withdrawal_requested }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_commission_credited {
            result.commission_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_withdrawal_requested {
            result.withdrawal_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_status_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_commission_credited {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_withdrawal_requested {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_commission_credited: Option<Handler<CommissionCreditedEvent>>,
    pub on_withdrawal_requested: Option<Handler<WithdrawalRequestedEvent>>,
}

impl EventHooks {
    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_commission_credited<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(CommissionCreditedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_commission_credited = Some(Arc::new(f));
        self
    }

    pub fn on_withdrawal_requested<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(WithdrawalRequestedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_withdrawal_requested = Some(Arc::new(f));
        self
    }
}
