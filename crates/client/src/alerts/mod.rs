//! Audible and visual alerts for inbound events.

mod audio;
mod toast;

pub use audio::{AudioBackend, AudioCue, TerminalBell};
pub use toast::{Toast, ToastQueue};

use storedesk_shared::Event;
use thiserror::Error;

/// Reasons an alert could not be shown. Never surfaced past the presenter.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("audio playback is locked until the first user interaction")]
    Locked,
    #[error("audio output failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Presents an event to the operator.
pub trait AlertPresenter: Send + Sync {
    /// Best-effort: implementations must not panic or block on failure.
    fn present(&self, event: &Event);
}

/// Sound cue plus toast.
#[derive(Debug)]
pub struct Alerts {
    audio: AudioCue,
    toasts: ToastQueue,
}

impl Alerts {
    pub fn new(audio: AudioCue, toasts: ToastQueue) -> Self {
        Self { audio, toasts }
    }

    pub fn audio(&self) -> &AudioCue {
        &self.audio
    }

    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }
}

impl AlertPresenter for Alerts {
    fn present(&self, event: &Event) {
        self.audio.play();
        let (title, body) = describe(event);
        self.toasts.push(title, body);
    }
}

/// Toast title and body for an event.
pub fn describe(event: &Event) -> (String, String) {
    match event {
        Event::NewOrder(order) => (
            format!("New order #{}", order.order_number),
            format!(
                "{} · {:.2} {}",
                order.customer_name, order.total, order.currency
            ),
        ),
        Event::NewCallRequest(call) => {
            let body = match &call.product_name {
                Some(product) => format!("{} ({}) about {}", call.customer_name, call.phone, product),
                None => format!("{} ({})", call.customer_name, call.phone),
            };
            ("New call request".to_string(), body)
        }
    }
}
