use crate::host::NodeId;
use crate::transport::MessageEvent;

/// What a listener did with a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The message was handled.
    Delivered,
    /// Delivery was cancelled by a `sseBeforeMessage` handler; the listener stays.
    Vetoed,
    /// The listener is no longer wanted (its element left the document).
    Unsubscribe,
}

/// Callback invoked once per inbound message of the event name it is registered for.
///
/// Runs on the supervisor loop: it must not block.
pub trait Listener: Send + 'static {
    /// Handles one message.
    fn on_message(&mut self, message: &MessageEvent) -> Delivery;

    /// Element this listener acts for, if any (used for runtime events).
    fn node(&self) -> Option<NodeId> {
        None
    }
}

impl<F> Listener for F
where
    F: FnMut(&MessageEvent) -> Delivery + Send + 'static,
{
    fn on_message(&mut self, message: &MessageEvent) -> Delivery {
        self(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_listeners() {
        let mut seen = Vec::new();
        let mut l = move |m: &MessageEvent| {
            seen.push(m.data.clone());
            if seen.len() > 1 {
                Delivery::Unsubscribe
            } else {
                Delivery::Delivered
            }
        };
        let msg = MessageEvent::new("/events", "tick", "1");
        assert_eq!(Listener::on_message(&mut l, &msg), Delivery::Delivered);
        assert_eq!(Listener::on_message(&mut l, &msg), Delivery::Unsubscribe);
        assert_eq!(Listener::node(&l), None);
    }
}
