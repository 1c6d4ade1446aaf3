//! Lifecycle of the notification subscription.
//!
//! One [`StreamManager`] owns at most one driver task. The task walks the
//! [`StreamMachine`]: open the channel, dispatch frames, and on failure either
//! back off or refresh credentials first. Every resumption after an `.await`
//! re-checks the run's cancellation token while holding the manager lock, and
//! [`StreamManager::stop`] takes the same lock, so once `stop()` returns no
//! continuation of the old run can dispatch an event or change state.
//!
//! A cancelled run winds down on its own and drops its channel on the way
//! out. The next run waits for that before opening, so two channels are never
//! open at once.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use storedesk_shared::Event;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::cancel::CancelToken;
use super::dispatch::EventSink;
use super::state::{ConnectionStatus, Input, Step, StreamMachine};
use super::transport::{PushTransport, WsTransport};
use crate::config::ClientConfig;
use crate::credentials::CredentialProvider;

/// Handle on the notification subscription. Clones control the same subscription.
#[derive(Clone)]
pub struct StreamManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    credentials: Arc<dyn CredentialProvider>,
    transport: Arc<dyn PushTransport>,
    sink: Arc<dyn EventSink>,
    core: Mutex<Core>,
    status: watch::Sender<ConnectionStatus>,
}

struct Core {
    machine: StreamMachine,
    run: Option<Run>,
    /// Driver of the last stopped run, possibly still winding down.
    retired: Option<JoinHandle<()>>,
}

impl Core {
    /// Cancel the current run and hand back the task the next run must outlive.
    fn retire(&mut self) -> Option<JoinHandle<()>> {
        match self.run.take() {
            Some(run) => {
                run.cancel.cancel();
                Some(run.task)
            }
            None => self.retired.take(),
        }
    }
}

/// A spawned driver and the token that winds it down.
struct Run {
    cancel: CancelToken,
    task: JoinHandle<()>,
}

impl StreamManager {
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
        transport: Arc<dyn PushTransport>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let machine = StreamMachine::new(config.backoff);
        let (status, _rx) = watch::channel(machine.status());

        Self {
            inner: Arc::new(Inner {
                config,
                credentials,
                transport,
                sink,
                core: Mutex::new(Core {
                    machine,
                    run: None,
                    retired: None,
                }),
                status,
            }),
        }
    }

    /// Manager over the WebSocket transport.
    pub fn websocket(
        config: ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self::new(config, credentials, Arc::new(WsTransport), sink)
    }

    /// Open (or reopen) the subscription.
    ///
    /// Without an access credential this does nothing; call again after login.
    /// Any existing channel is closed before the new one is opened. Must be
    /// called from within a tokio runtime.
    pub fn start(&self) {
        let Some(access) = self.inner.credentials.access_token() else {
            tracing::debug!("No access credential, notification stream not started");
            return;
        };

        let mut core = self.inner.core.lock();
        let previous = core.retire();

        let step = core.machine.apply(Input::Start { credential: true });
        self.inner.publish(&core.machine);
        if step != Step::Connect {
            core.retired = previous;
            return;
        }

        let cancel = CancelToken::new();
        let task = tokio::spawn(drive(
            Arc::clone(&self.inner),
            cancel.clone(),
            access,
            previous,
        ));
        core.run = Some(Run { cancel, task });
    }

    /// Close the channel and cancel any pending reconnect or refresh.
    ///
    /// Nothing from the stopped run is observable after this returns.
    pub fn stop(&self) {
        let mut core = self.inner.core.lock();
        let retired = core.retire();
        core.retired = retired;
        core.machine.apply(Input::Stop);
        self.inner.publish(&core.machine);
    }

    /// [`stop`](Self::stop), then wait for the driver task to wind down.
    pub async fn shutdown(&self) {
        let task = {
            let mut core = self.inner.core.lock();
            let task = core.retire();
            core.machine.apply(Input::Stop);
            self.inner.publish(&core.machine);
            task
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Notification stream driver ended abnormally: {}", e);
            }
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Whether a driver task is alive (connecting, open, or waiting to retry).
    pub fn is_running(&self) -> bool {
        self.inner
            .core
            .lock()
            .run
            .as_ref()
            .is_some_and(|run| !run.task.is_finished())
    }
}

impl Inner {
    fn publish(&self, machine: &StreamMachine) {
        let next = machine.status();
        self.status.send_if_modified(|status| {
            if *status == next {
                false
            } else {
                *status = next;
                true
            }
        });
    }

    /// Apply `input` unless the run was cancelled. `None` means stop driving.
    fn transition(&self, cancel: &CancelToken, input: Input) -> Option<Step> {
        let mut core = self.core.lock();
        if cancel.is_cancelled() {
            return None;
        }
        let step = core.machine.apply(input);
        self.publish(&core.machine);
        Some(step)
    }

    fn failures(&self) -> u32 {
        self.core.lock().machine.failures()
    }

    async fn connect(&self, cancel: &CancelToken, access: &str) -> Option<Step> {
        let url = self.config.stream_url(access);
        tracing::info!(
            "Opening notification stream to {}{}",
            url.host_str().unwrap_or_default(),
            url.path()
        );

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            opened = self.transport.open(&url) => opened,
        };

        let mut frames = match opened {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!("Notification stream failed to open: {}", e);
                return self.transition(cancel, Input::Failed);
            }
        };

        self.transition(cancel, Input::Opened)?;
        tracing::info!("Notification stream open");

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                frame = frames.next() => frame,
            };

            match frame {
                Some(Ok(text)) => self.dispatch(cancel, &text)?,
                Some(Err(e)) => {
                    tracing::warn!("Notification stream error: {}", e);
                    break;
                }
                None => {
                    tracing::warn!("Notification stream closed");
                    break;
                }
            }
        }

        drop(frames);
        self.transition(cancel, Input::Failed)
    }

    fn dispatch(&self, cancel: &CancelToken, frame: &str) -> Option<()> {
        let event = match Event::from_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!("Dropping malformed notification frame: {}", e);
                return Some(());
            }
        };

        let _core = self.core.lock();
        if cancel.is_cancelled() {
            return None;
        }
        tracing::debug!("Delivering {} event", event.kind().as_str());
        self.sink.deliver(event);
        Some(())
    }

    async fn refresh(&self, cancel: &CancelToken) -> Option<Step> {
        tracing::info!(
            "Refreshing credentials after {} consecutive stream failures",
            self.failures()
        );

        let refreshed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            refreshed = self.credentials.refresh() => refreshed,
        };

        if refreshed.is_none() {
            tracing::warn!("Credential refresh failed, notification stream stays down until restarted");
        }
        self.transition(cancel, Input::Refreshed { ok: refreshed.is_some() })
    }

    /// Sleep out the backoff, then re-read the credential for the next attempt.
    async fn wait(&self, cancel: &CancelToken, delay: Duration) -> Option<(Step, Option<String>)> {
        tracing::info!("Reconnecting notification stream in {}ms", delay.as_millis());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        let access = self.credentials.access_token();
        let step = self.transition(cancel, Input::TimerFired { credential: access.is_some() })?;
        Some((step, access))
    }
}

/// Driver task: one per `start()`, ends on cancellation or when the machine halts.
///
/// `previous` is the driver of the run this one replaces. It was cancelled
/// already; waiting for it guarantees its channel is closed before ours opens.
async fn drive(
    inner: Arc<Inner>,
    cancel: CancelToken,
    mut access: String,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            tracing::warn!("Previous notification stream driver ended abnormally: {}", e);
        }
    }
    if cancel.is_cancelled() {
        return;
    }

    let mut step = Step::Connect;

    loop {
        let next = match step {
            Step::Connect => inner.connect(&cancel, &access).await,
            Step::Refresh => inner.refresh(&cancel).await,
            Step::Wait(delay) => inner.wait(&cancel, delay).await.map(|(next, fresh)| {
                if let Some(fresh) = fresh {
                    access = fresh;
                }
                next
            }),
            Step::Read | Step::Halt | Step::Ignore => None,
        };

        match next {
            Some(next) => step = next,
            None => break,
        }
    }

    tracing::debug!("Notification stream driver finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertPresenter;
    use crate::stores::CounterStore;
    use crate::stream::dispatch::Notifier;
    use crate::stream::state::ConnectionState;
    use crate::stream::transport::{FrameStream, TransportError};
    use async_trait::async_trait;
    use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storedesk_shared::CredentialPair;
    use tokio::sync::oneshot;
    use tokio::time::Instant;
    use url::Url;

    const ORDER: &str = r#"{"type":"new_order","order_number":"1042","customer_name":"Ada","total":12.5,"currency":"EUR"}"#;
    const CALL: &str = r#"{"type":"new_call_request","customer_name":"Grace","phone":"+15550100"}"#;

    enum Outcome {
        Fail,
        /// Frames come from `frames`; `sender` tells whether the stream was dropped.
        Open {
            frames: UnboundedReceiver<String>,
            sender: UnboundedSender<String>,
        },
    }

    #[derive(Debug, Clone)]
    struct Opened {
        at: Instant,
        url: Url,
        /// Streams handed out earlier that were still alive at this open.
        still_open: usize,
    }

    /// Transport that plays back a script of outcomes, then fails forever.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Outcome>>,
        handed_out: Mutex<Vec<UnboundedSender<String>>>,
        opened: watch::Sender<Vec<Opened>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Outcome>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                handed_out: Mutex::new(Vec::new()),
                opened: watch::channel(Vec::new()).0,
            }
        }

        fn opened(&self) -> Vec<Opened> {
            self.opened.borrow().clone()
        }

        async fn wait_opens(&self, n: usize) -> Vec<Opened> {
            let mut rx = self.opened.subscribe();
            let opened = rx.wait_for(|opened| opened.len() >= n).await.unwrap().clone();
            opened
        }
    }

    #[async_trait]
    impl PushTransport for ScriptedTransport {
        async fn open(&self, url: &Url) -> Result<FrameStream, TransportError> {
            let still_open = self
                .handed_out
                .lock()
                .iter()
                .filter(|tx| !tx.is_closed())
                .count();
            self.opened.send_modify(|opened| {
                opened.push(Opened {
                    at: Instant::now(),
                    url: url.clone(),
                    still_open,
                })
            });
            let next = self.script.lock().pop_front();
            match next {
                Some(Outcome::Open { frames, sender }) => {
                    self.handed_out.lock().push(sender);
                    Ok(frames.map(Ok).boxed())
                }
                Some(Outcome::Fail) | None => {
                    Err(TransportError::Connection("connection refused".into()))
                }
            }
        }
    }

    #[derive(Default)]
    struct FakeCredentials {
        access: Mutex<Option<String>>,
        next_pair: Mutex<Option<CredentialPair>>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        refreshes: AtomicUsize,
    }

    impl FakeCredentials {
        fn with_access(token: Option<&str>) -> Self {
            let credentials = Self::default();
            *credentials.access.lock() = token.map(str::to_string);
            credentials
        }

        fn refreshes(&self) -> usize {
            self.refreshes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialProvider for FakeCredentials {
        fn access_token(&self) -> Option<String> {
            self.access.lock().clone()
        }

        async fn refresh(&self) -> Option<CredentialPair> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            let pair = self.next_pair.lock().take()?;
            *self.access.lock() = Some(pair.access_token.clone());
            Some(pair)
        }
    }

    #[derive(Default)]
    struct CountingPresenter(AtomicUsize);

    impl AlertPresenter for CountingPresenter {
        fn present(&self, _event: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        manager: StreamManager,
        transport: Arc<ScriptedTransport>,
        credentials: Arc<FakeCredentials>,
        presenter: Arc<CountingPresenter>,
        counters: CounterStore,
    }

    impl Harness {
        fn new(access: Option<&str>, script: Vec<Outcome>) -> Self {
            let transport = Arc::new(ScriptedTransport::new(script));
            let credentials = Arc::new(FakeCredentials::with_access(access));
            let presenter = Arc::new(CountingPresenter::default());
            let counters = CounterStore::new();
            let sink = Arc::new(Notifier::new(presenter.clone(), counters.clone()));

            let manager = StreamManager::new(
                ClientConfig::default(),
                credentials.clone(),
                transport.clone(),
                sink,
            );

            Self {
                manager,
                transport,
                credentials,
                presenter,
                counters,
            }
        }

        async fn wait_status(&self, pred: impl Fn(&ConnectionStatus) -> bool) -> ConnectionStatus {
            let mut rx = self.manager.subscribe_status();
            let status = *rx.wait_for(|status| pred(status)).await.unwrap();
            status
        }

        async fn wait_state(&self, pred: impl Fn(&ConnectionState) -> bool) -> ConnectionStatus {
            self.wait_status(|status| pred(&status.state)).await
        }

        fn presented(&self) -> usize {
            self.presenter.0.load(Ordering::SeqCst)
        }
    }

    fn open_channel() -> (UnboundedSender<String>, Outcome) {
        let (tx, rx) = unbounded();
        let sender = tx.clone();
        (tx, Outcome::Open { frames: rx, sender })
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    /// Paused time advances to timer deadlines, which sit on millisecond ticks.
    fn assert_near(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(5),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    fn token_of(url: &Url) -> String {
        url.query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_credential_nothing_is_attempted() {
        let h = Harness::new(None, vec![]);
        h.manager.start();

        tokio::time::sleep(secs(3600)).await;
        assert!(h.transport.opened().is_empty());
        assert_eq!(h.manager.status().state, ConnectionState::Idle);
        assert!(!h.manager.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_schedules_one_reconnect_after_5s() {
        let (tx1, first) = open_channel();
        let (_tx2, second) = open_channel();
        let h = Harness::new(Some("access-1"), vec![first, second]);

        h.manager.start();
        let status = h.wait_state(ConnectionState::is_open).await;
        assert_eq!(status.failures, 0);
        assert_eq!(token_of(&h.transport.opened()[0].url), "access-1");

        tokio::time::sleep(secs(1)).await;
        let closed_at = Instant::now();
        drop(tx1);

        let status = h.wait_state(|s| matches!(s, ConnectionState::Backoff { .. })).await;
        assert_eq!(status.state, ConnectionState::Backoff { delay: secs(5) });
        assert_eq!(status.failures, 1);
        assert_eq!(h.credentials.refreshes(), 0);

        let opened = h.transport.wait_opens(2).await;
        assert_near(opened[1].at - closed_at, secs(5));

        let status = h.wait_state(ConnectionState::is_open).await;
        assert_eq!(status.failures, 0);
        assert_eq!(h.credentials.refreshes(), 0);
        assert_eq!(h.transport.opened().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_refresh_never_schedules_third_attempt() {
        let h = Harness::new(Some("access-1"), vec![Outcome::Fail, Outcome::Fail]);

        h.manager.start();
        h.wait_status(|s| s.state == ConnectionState::Idle && s.failures == 2)
            .await;
        assert_eq!(h.credentials.refreshes(), 1);

        tokio::time::sleep(secs(3600)).await;
        assert_eq!(h.transport.opened().len(), 2);
        assert_eq!(h.manager.status().state, ConnectionState::Idle);
        assert!(!h.manager.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_then_reconnect_with_new_credential() {
        let (_tx, third) = open_channel();
        let h = Harness::new(Some("access-1"), vec![Outcome::Fail, Outcome::Fail, third]);
        *h.credentials.next_pair.lock() = Some(CredentialPair {
            access_token: "access-2".into(),
            refresh_token: "refresh-2".into(),
        });

        h.manager.start();
        let opened = h.transport.wait_opens(3).await;
        assert_near(opened[1].at - opened[0].at, secs(5));
        assert_near(opened[2].at - opened[1].at, secs(10));
        assert_eq!(token_of(&opened[1].url), "access-1");
        assert_eq!(token_of(&opened[2].url), "access-2");

        let status = h.wait_state(ConnectionState::is_open).await;
        assert_eq!(status.failures, 0);
        assert_eq!(h.credentials.refreshes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frames_are_dropped_without_closing() {
        let (tx, channel) = open_channel();
        let h = Harness::new(Some("access-1"), vec![channel]);
        h.manager.start();
        h.wait_state(ConnectionState::is_open).await;

        let mut counters = h.counters.subscribe();
        tx.unbounded_send("not json".into()).unwrap();
        tx.unbounded_send(r#"{"type":"order_cancelled","order_number":"1"}"#.into())
            .unwrap();
        tx.unbounded_send(r#"{"type":"new_order"}"#.into()).unwrap();
        tx.unbounded_send(ORDER.into()).unwrap();

        counters.wait_for(|c| c.pending_orders == 1).await.unwrap();
        assert_eq!(h.counters.get().new_call_requests, 0);
        assert_eq!(h.presented(), 1);
        assert_eq!(h.manager.status().state, ConnectionState::Open);
        assert_eq!(h.transport.opened().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_event_counted_and_presented_once() {
        let (tx, channel) = open_channel();
        let h = Harness::new(Some("access-1"), vec![channel]);
        h.manager.start();
        h.wait_state(ConnectionState::is_open).await;

        let mut counters = h.counters.subscribe();
        tx.unbounded_send(ORDER.into()).unwrap();
        tx.unbounded_send(ORDER.into()).unwrap();
        tx.unbounded_send(CALL.into()).unwrap();

        counters
            .wait_for(|c| c.pending_orders == 2 && c.new_call_requests == 1)
            .await
            .unwrap();
        assert_eq!(h.presented(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_backoff_cancels_reconnect() {
        let h = Harness::new(Some("access-1"), vec![Outcome::Fail]);
        h.manager.start();
        h.wait_state(|s| matches!(s, ConnectionState::Backoff { .. }))
            .await;

        h.manager.stop();
        assert_eq!(h.manager.status().state, ConnectionState::Stopped);

        tokio::time::sleep(secs(3600)).await;
        assert_eq!(h.transport.opened().len(), 1);
        assert_eq!(h.manager.status().state, ConnectionState::Stopped);
        assert_eq!(h.manager.status().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_refresh_ignores_late_result() {
        let (_tx, channel) = open_channel();
        let h = Harness::new(Some("access-1"), vec![Outcome::Fail, Outcome::Fail, channel]);
        let (release, gate) = oneshot::channel();
        *h.credentials.gate.lock() = Some(gate);
        *h.credentials.next_pair.lock() = Some(CredentialPair {
            access_token: "access-2".into(),
            refresh_token: "refresh-2".into(),
        });

        h.manager.start();
        h.wait_state(|s| *s == ConnectionState::Refreshing).await;

        h.manager.stop();
        let _ = release.send(());

        tokio::time::sleep(secs(3600)).await;
        assert_eq!(h.transport.opened().len(), 2);
        assert_eq!(h.manager.status().state, ConnectionState::Stopped);
        assert_eq!(h.presented(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_dispatch_after_stop() {
        let (tx, channel) = open_channel();
        let h = Harness::new(Some("access-1"), vec![channel]);
        h.manager.start();
        h.wait_state(ConnectionState::is_open).await;

        h.manager.stop();
        let _ = tx.unbounded_send(ORDER.into());

        tokio::time::sleep(secs(60)).await;
        assert_eq!(h.counters.get().pending_orders, 0);
        assert_eq!(h.presented(), 0);
        assert_eq!(h.transport.opened().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_closes_previous_channel_first() {
        let (tx1, first) = open_channel();
        let (tx2, second) = open_channel();
        let h = Harness::new(Some("access-1"), vec![first, second]);

        h.manager.start();
        h.wait_state(ConnectionState::is_open).await;

        h.manager.start();
        let opened = h.transport.wait_opens(2).await;
        assert_eq!(opened[1].still_open, 0);
        assert!(tx1.is_closed());
        assert!(tx1.unbounded_send(ORDER.into()).is_err());
        h.wait_state(ConnectionState::is_open).await;

        let mut counters = h.counters.subscribe();
        tx2.unbounded_send(ORDER.into()).unwrap();
        counters.wait_for(|c| c.pending_orders == 1).await.unwrap();

        tokio::time::sleep(secs(1)).await;
        assert_eq!(h.counters.get().pending_orders, 1);
        assert_eq!(h.presented(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rapid_restarts_never_overlap_channels() {
        const RESTARTS: usize = 100;
        let (senders, script): (Vec<_>, Vec<_>) = (0..RESTARTS).map(|_| open_channel()).unzip();
        let h = Harness::new(Some("access-1"), script);

        for n in 1..=RESTARTS {
            h.manager.start();
            h.transport.wait_opens(n).await;
            h.wait_state(ConnectionState::is_open).await;
        }

        let opened = h.transport.opened();
        assert_eq!(opened.len(), RESTARTS);
        let overlapping = opened.iter().filter(|o| o.still_open > 0).count();
        assert_eq!(overlapping, 0);
        assert_eq!(senders.iter().filter(|tx| !tx.is_closed()).count(), 1);

        h.manager.shutdown().await;
        assert!(senders.iter().all(|tx| tx.is_closed()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_start_closes_channel_before_reopening() {
        let (tx1, first) = open_channel();
        let (_tx2, second) = open_channel();
        let h = Harness::new(Some("access-1"), vec![first, second]);

        h.manager.start();
        h.wait_state(ConnectionState::is_open).await;

        h.manager.stop();
        h.manager.start();
        let opened = h.transport.wait_opens(2).await;
        assert_eq!(opened[1].still_open, 0);
        assert!(tx1.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_driver() {
        let (_tx, channel) = open_channel();
        let h = Harness::new(Some("access-1"), vec![channel]);
        h.manager.start();
        h.wait_state(ConnectionState::is_open).await;
        assert!(h.manager.is_running());

        h.manager.shutdown().await;
        assert!(!h.manager.is_running());
        assert_eq!(h.manager.status().state, ConnectionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_failure_count() {
        let (_tx, channel) = open_channel();
        let h = Harness::new(Some("access-1"), vec![Outcome::Fail, Outcome::Fail, channel]);

        h.manager.start();
        let status = h.wait_state(|s| matches!(s, ConnectionState::Backoff { .. })).await;
        assert_eq!(status.failures, 1);
        h.manager.stop();

        h.manager.start();
        h.transport.wait_opens(2).await;
        let status = h.wait_state(|s| matches!(s, ConnectionState::Backoff { .. })).await;
        assert_eq!(status.state, ConnectionState::Backoff { delay: secs(5) });
        assert_eq!(status.failures, 1);
        assert_eq!(h.credentials.refreshes(), 0);

        let status = h.wait_state(ConnectionState::is_open).await;
        assert_eq!(status.failures, 0);
        assert_eq!(h.transport.opened().len(), 3);
        assert_eq!(h.credentials.refreshes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_abandoned_chain_is_fresh() {
        let (_tx, channel) = open_channel();
        let h = Harness::new(
            Some("access-1"),
            vec![Outcome::Fail, Outcome::Fail, Outcome::Fail, channel],
        );

        h.manager.start();
        h.wait_status(|s| s.state == ConnectionState::Idle && s.failures == 2)
            .await;
        assert_eq!(h.credentials.refreshes(), 1);

        h.manager.start();
        let status = h.wait_state(|s| matches!(s, ConnectionState::Backoff { .. })).await;
        assert_eq!(status.state, ConnectionState::Backoff { delay: secs(5) });
        assert_eq!(status.failures, 1);
        assert_eq!(h.credentials.refreshes(), 1);

        h.wait_state(ConnectionState::is_open).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_stop_resumes() {
        let (_tx, channel) = open_channel();
        let h = Harness::new(Some("access-1"), vec![Outcome::Fail, channel]);
        h.manager.start();
        h.wait_state(|s| matches!(s, ConnectionState::Backoff { .. }))
            .await;
        h.manager.stop();

        h.manager.start();
        let status = h.wait_state(ConnectionState::is_open).await;
        assert_eq!(status.failures, 0);
        assert_eq!(h.transport.opened().len(), 2);
    }
}
