use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::reminders::{
    clock::Clock,
    dispatch::Dispatcher,
    engine::{self, PassOutcome},
    inbox::NotificationInbox,
    store::ReminderStore,
    types::{AlertState, Recipient},
};

/// Totals for one pass over every user.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub users: usize,
    pub alerts: usize,
}

/// Loads data, evaluates, dispatches and persists. Passes never overlap.
pub struct ReminderEngine {
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
    dispatcher: Dispatcher,
    pass_lock: Mutex<()>,
}

impl ReminderEngine {
    pub fn new(store: Arc<dyn ReminderStore>, clock: Arc<dyn Clock>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            clock,
            dispatcher,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &dyn ReminderStore {
        self.store.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn inbox(&self) -> &NotificationInbox {
        self.dispatcher.inbox()
    }

    #[instrument(skip(self))]
    pub async fn run_pass_all(&self) -> PassSummary {
        let _guard = self.pass_lock.lock().await;
        let recipients = match self.store.recipients().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "could not load reminder recipients; skipping pass");
                return PassSummary::default();
            }
        };

        let mut summary = PassSummary::default();
        for recipient in &recipients {
            let outcome = self.pass_for(recipient).await;
            summary.users += 1;
            summary.alerts += outcome.alerts().count();
        }
        self.inbox().prune(self.clock.now()).await;

        if summary.alerts > 0 {
            info!(users = summary.users, alerts = summary.alerts, "reminder pass finished");
        } else {
            debug!(users = summary.users, "reminder pass finished quietly");
        }
        summary
    }

    /// Single-user pass, run when that user's data has just been loaded.
    #[instrument(skip(self))]
    pub async fn run_pass_for(&self, user_id: Uuid) -> PassOutcome {
        let _guard = self.pass_lock.lock().await;
        match self.store.recipient(user_id).await {
            Ok(Some(recipient)) => self.pass_for(&recipient).await,
            Ok(None) => PassOutcome::default(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "could not load reminder recipient");
                PassOutcome::default()
            }
        }
    }

    /// Resets the user's ledger, task markers and email log. Holds the pass
    /// lock, so a pass already in flight finishes before the reset and
    /// cannot write its stale state back over it.
    #[instrument(skip(self))]
    pub async fn clear_history(&self, user_id: Uuid) -> anyhow::Result<()> {
        let _guard = self.pass_lock.lock().await;
        self.store.clear_history(user_id).await
    }

    async fn pass_for(&self, recipient: &Recipient) -> PassOutcome {
        let user_id = recipient.id;
        let now = self.clock.now();

        let bills = self.store.bills(user_id).await.unwrap_or_else(|e| {
            warn!(user_id = %user_id, error = %e, "could not load bills for reminders");
            Vec::new()
        });
        let tasks = self.store.tasks(user_id).await.unwrap_or_else(|e| {
            warn!(user_id = %user_id, error = %e, "could not load tasks for reminders");
            Vec::new()
        });
        let mut state = self.store.alert_state(user_id).await.unwrap_or_else(|e| {
            warn!(user_id = %user_id, error = %e, "could not load alert state");
            AlertState::default()
        });

        let outcome = engine::evaluate(now, &bills, &tasks, &mut state);
        if !outcome.state_changed() {
            return outcome;
        }

        let settings = self.store.settings(user_id).await.unwrap_or_else(|e| {
            warn!(user_id = %user_id, error = %e, "could not load alert settings; using defaults");
            Default::default()
        });
        for alert in outcome.alerts() {
            self.dispatcher.deliver(recipient, &settings, alert, now).await;
        }

        if let Err(e) = self.store.save_alert_state(user_id, &state).await {
            warn!(user_id = %user_id, error = %e, "could not persist alert state");
        }
        outcome
    }
}

/// Runs a pass right away and then once per `period` until `shutdown` flips.
pub async fn run(engine: Arc<ReminderEngine>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_secs = period.as_secs(), "reminder scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                engine.run_pass_all().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("reminder scheduler stopped");
}
