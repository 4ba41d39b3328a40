// ============================
// watchdog-lib/src/watchdog.rs
// ============================
//! Session watchdog actor.
//!
//! One task owns the [`SessionMachine`] and serializes everything that can
//! touch it: activity, modal choices, timer deadlines, poll ticks and the
//! results of network calls. Network calls run in their own tasks and report
//! back through the same channel, so a slow request never delays a deadline.
use std::sync::Arc;

use metrics::counter;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::activity::{ActivityKind, ActivityTracker};
use crate::backend::SessionBackend;
use crate::config::{Routes, SessionConfig};
use crate::machine::{Effect, SessionMachine, SessionState, WatchdogStatus};
use crate::metrics::LOGOUT;
use crate::modal::{ModalActions, ModalPresenter, ModalView};
use crate::page::Page;
use crate::renewal::{RenewalClient, RenewalOutcome};
use crate::validator::{PollOutcome, SessionValidator};

/// Message sent *into* the actor
#[derive(Debug)]
pub(crate) enum WatchdogMsg {
    Activity { kind: ActivityKind, at: Instant },
    Continue,
    LogoutNow,
    RenewalFinished(RenewalOutcome),
    PollFinished(PollOutcome),
    Stop,
}

/// A watchdog ready to be started for one page
pub struct SessionWatchdog {
    config: SessionConfig,
    routes: Routes,
    page: Arc<Page>,
    backend: Arc<dyn SessionBackend>,
    modal_view: Arc<dyn ModalView>,
}

impl SessionWatchdog {
    pub fn new(
        config: SessionConfig,
        routes: Routes,
        page: Arc<Page>,
        backend: Arc<dyn SessionBackend>,
        modal_view: Arc<dyn ModalView>,
    ) -> Self {
        Self {
            config,
            routes,
            page,
            backend,
            modal_view,
        }
    }

    /// Schedule the first timer pair from now and spawn the actor
    pub fn start(self) -> WatchdogHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let machine = SessionMachine::new(self.config, self.routes, Instant::now());
        let (status_tx, status_rx) = watch::channel(machine.status());

        info!(
            timeout_secs = self.config.session_timeout().as_secs(),
            warning_lead_secs = self.config.warning_lead().as_secs(),
            poll_secs = self.config.poll_interval().as_secs(),
            "session watchdog started"
        );

        let actor = WatchdogActor {
            machine,
            config: self.config,
            renewal: Arc::new(RenewalClient::new(self.backend.clone(), self.config.renew_throttle())),
            validator: Arc::new(SessionValidator::new(self.backend)),
            modal: ModalPresenter::new(self.modal_view, ModalActions::new(cmd_tx.clone())),
            page: self.page,
            cmd_tx: cmd_tx.clone(),
            status_tx,
        };
        let task = tokio::spawn(actor.run(cmd_rx));

        WatchdogHandle {
            cmd_tx,
            status_rx,
            task,
        }
    }
}

/// Handle that the host keeps: command channel + status snapshot
pub struct WatchdogHandle {
    cmd_tx: mpsc::UnboundedSender<WatchdogMsg>,
    status_rx: watch::Receiver<WatchdogStatus>,
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    /// Emitter for user interaction events
    pub fn activity_tracker(&self) -> ActivityTracker {
        ActivityTracker::new(self.cmd_tx.clone())
    }

    /// The overlay's buttons, for hosts that draw it themselves
    pub fn modal_actions(&self) -> ModalActions {
        ModalActions::new(self.cmd_tx.clone())
    }

    /// "Continue" on the warning overlay
    pub fn continue_session(&self) {
        self.modal_actions().continue_session();
    }

    /// "Logout now" on the warning overlay
    pub fn logout_now(&self) {
        self.modal_actions().logout_now();
    }

    /// Latest published snapshot
    pub fn status(&self) -> WatchdogStatus {
        *self.status_rx.borrow()
    }

    /// Receiver notified after every transition
    pub fn subscribe(&self) -> watch::Receiver<WatchdogStatus> {
        self.status_rx.clone()
    }

    /// Whether the actor has exited (stopped, logged out or page torn down)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the actor to exit on its own
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "watchdog task ended abnormally");
        }
    }

    /// Cancel all timers, remove the overlay and wait for the actor to exit
    pub async fn stop(self) {
        let _ = self.cmd_tx.send(WatchdogMsg::Stop);
        self.join().await;
    }
}

struct WatchdogActor {
    machine: SessionMachine,
    config: SessionConfig,
    renewal: Arc<RenewalClient>,
    validator: Arc<SessionValidator>,
    modal: ModalPresenter,
    page: Arc<Page>,
    cmd_tx: mpsc::UnboundedSender<WatchdogMsg>,
    status_tx: watch::Sender<WatchdogStatus>,
}

impl WatchdogActor {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<WatchdogMsg>) {
        // First tick completes immediately: validate on page load
        let mut poll = tokio::time::interval(self.config.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let page = self.page.clone();

        loop {
            let warning_at = self.machine.warning_deadline();
            let logout_at = self.machine.logout_deadline();

            let effect = tokio::select! {
                biased;
                _ = page.torn_down() => {
                    debug!("page torn down, watchdog exiting");
                    break;
                }
                msg = cmd_rx.recv() => match msg {
                    None | Some(WatchdogMsg::Stop) => {
                        debug!("watchdog stopped");
                        break;
                    }
                    Some(msg) => self.handle(msg),
                },
                _ = sleep_until(logout_at) => self.machine.on_logout_timer(Instant::now()),
                _ = sleep_until(warning_at) => self.machine.on_warning_timer(Instant::now()),
                _ = poll.tick() => self.on_poll_tick(),
            };

            if let Some(effect) = effect {
                self.apply(effect);
            }
            self.status_tx.send_replace(self.machine.status());

            if self.machine.state() == SessionState::LoggedOut {
                break;
            }
        }

        self.modal.dismiss();
    }

    fn handle(&mut self, msg: WatchdogMsg) -> Option<Effect> {
        match msg {
            WatchdogMsg::Activity { kind, at } => {
                debug!(%kind, "user activity");
                self.machine.on_activity(at)
            }
            WatchdogMsg::Continue => self.machine.on_continue(),
            WatchdogMsg::LogoutNow => self.machine.on_logout_requested(),
            WatchdogMsg::RenewalFinished(RenewalOutcome::Renewed) => {
                self.machine.on_renewal_succeeded(Instant::now())
            }
            // Failures were logged by the renewal client; timers keep running
            WatchdogMsg::RenewalFinished(_) => None,
            WatchdogMsg::PollFinished(outcome) => self.machine.on_poll_result(&outcome),
            WatchdogMsg::Stop => None,
        }
    }

    fn on_poll_tick(&mut self) -> Option<Effect> {
        if let Some(effect) = self.machine.on_poll_tick(Instant::now()) {
            return Some(effect);
        }
        let validator = self.validator.clone();
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let outcome = validator.check().await;
            let _ = tx.send(WatchdogMsg::PollFinished(outcome));
        });
        None
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::RequestRenewal => {
                if !self.renewal.try_begin() {
                    return;
                }
                let renewal = self.renewal.clone();
                let tx = self.cmd_tx.clone();
                tokio::spawn(async move {
                    let outcome = renewal.send().await;
                    let _ = tx.send(WatchdogMsg::RenewalFinished(outcome));
                });
            }
            Effect::ShowWarning { remaining } => {
                self.modal.show(remaining);
            }
            Effect::DismissWarning => {
                self.modal.dismiss();
            }
            Effect::Navigate { target, reason } => {
                self.modal.dismiss();
                counter!(LOGOUT, "reason" => reason.as_str()).increment(1);
                info!(reason = reason.as_str(), %target, "ending session");
                self.page.navigate(&target);
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
