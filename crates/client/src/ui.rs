//! Dioxus bindings for the notification stream.
//!
//! Components read counters and toasts from signals bridged off the
//! underlying watch channels; they never see stream events directly.
//!
//! ```rust,ignore
//! // In your app root, after login
//! use_context_provider(|| stream.clone());
//! use_context_provider(|| alerts.clone());
//!
//! rsx! {
//!     NotificationStream {
//!         CounterBadges {}
//!         ToastStack {}
//!         // Your app here
//!     }
//! }
//! ```
//!
//! The renderer must run on a tokio runtime (desktop does).

#![allow(non_snake_case)]

use std::sync::Arc;

use dioxus::prelude::*;

use crate::alerts::{Alerts, Toast};
use crate::stores::{Counters, COUNTERS};
use crate::stream::{ConnectionStatus, StreamManager};

/// Keeps the stream open while mounted and unlocks the sound cue on the
/// first click or key press inside it.
///
/// Expects a [`StreamManager`] and an `Arc<Alerts>` in context.
#[component]
pub fn NotificationStream(children: Element) -> Element {
    let stream = use_context::<StreamManager>();
    let alerts = use_context::<Arc<Alerts>>();

    use_hook({
        let stream = stream.clone();
        move || stream.start()
    });
    use_drop(move || stream.stop());

    let unlock = move || {
        if alerts.audio().unlock() {
            tracing::debug!("Audio cue unlocked by user interaction");
        }
    };
    let unlock_on_key = unlock.clone();
    let unlock_on_click = unlock;

    rsx! {
        div {
            onclick: move |_| unlock_on_click(),
            onkeydown: move |_| unlock_on_key(),
            {children}
        }
    }
}

/// Counter values, updated whenever the global store changes.
pub fn use_counters() -> Signal<Counters> {
    let mut counters = use_signal(|| COUNTERS.get());

    use_future(move || async move {
        let mut rx = COUNTERS.subscribe();
        while rx.changed().await.is_ok() {
            let next = *rx.borrow_and_update();
            counters.set(next);
        }
    });

    counters
}

/// Connection status of the [`StreamManager`] in context.
pub fn use_connection_status() -> Signal<ConnectionStatus> {
    let stream = use_context::<StreamManager>();
    let mut status = use_signal(|| stream.status());

    use_future(move || {
        let mut rx = stream.subscribe_status();
        async move {
            while rx.changed().await.is_ok() {
                let next = *rx.borrow_and_update();
                status.set(next);
            }
        }
    });

    status
}

fn use_toasts() -> Signal<Vec<Toast>> {
    let alerts = use_context::<Arc<Alerts>>();
    let mut toasts = use_signal(|| alerts.toasts().visible());

    use_future(move || {
        let mut rx = alerts.toasts().subscribe();
        async move {
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                toasts.set(next);
            }
        }
    });

    toasts
}

#[component]
pub fn CounterBadges() -> Element {
    let counters = use_counters();
    let Counters {
        pending_orders,
        new_call_requests,
    } = *counters.read();

    rsx! {
        nav { class: "flex gap-4",
            span { class: "inline-flex items-center gap-1",
                "Orders"
                if pending_orders > 0 {
                    span { class: "bg-red-500 text-white text-xs rounded-full px-2", "{pending_orders}" }
                }
            }
            span { class: "inline-flex items-center gap-1",
                "Call requests"
                if new_call_requests > 0 {
                    span { class: "bg-red-500 text-white text-xs rounded-full px-2", "{new_call_requests}" }
                }
            }
        }
    }
}

#[component]
pub fn ToastStack() -> Element {
    let alerts = use_context::<Arc<Alerts>>();
    let toasts = use_toasts();

    rsx! {
        div { class: "fixed bottom-4 right-4 flex flex-col gap-2",
            for toast in toasts.read().iter().cloned() {
                div {
                    key: "{toast.id}",
                    class: "bg-gray-800 text-white rounded shadow p-3 w-72",
                    div { class: "flex justify-between",
                        strong { "{toast.title}" }
                        button {
                            class: "text-gray-400",
                            onclick: {
                                let alerts = alerts.clone();
                                move |_| {
                                    alerts.toasts().dismiss(toast.id);
                                }
                            },
                            "×"
                        }
                    }
                    p { class: "text-sm", "{toast.body}" }
                }
            }
        }
    }
}
