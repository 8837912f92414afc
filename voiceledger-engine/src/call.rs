//! Async driver for one call.
//!
//! `CallRun` owns the `CallSession` and is the only writer to it. Commands from the UI,
//! a one-second ticker and completions of spawned operations are all funneled into the
//! same loop, so transitions are applied strictly one at a time.

use anyhow::Context;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use voiceledger_core::account::resolve_account;
use voiceledger_core::config::CallTimings;
use voiceledger_core::text::FALLBACK_APOLOGY;
use voiceledger_core::types::{ParsedTransaction, SavedRecord, TransactionDraft};

use crate::capture::CaptureOutcome;
use crate::machine::{CallEvent, CallSession, CallSnapshot, CallState, Effect, SaveOutcome};
use crate::playback::FallbackPlayback;
use crate::resolver::{DialogueResolver, ResolverOutcome};
use crate::traits::{AccountsProvider, NluBackend, Ringer, SpeechCapture, TransactionStore};

#[derive(Debug, Error)]
pub enum CallError {
    #[error("call has already ended")]
    Ended,
}

/// Everything a call talks to.
#[derive(Clone)]
pub struct CallCollaborators {
    pub capture: Arc<dyn SpeechCapture>,
    pub playback: FallbackPlayback,
    pub nlu: Arc<dyn NluBackend>,
    pub store: Arc<dyn TransactionStore>,
    pub accounts: Arc<dyn AccountsProvider>,
    pub ringer: Arc<dyn Ringer>,
}

#[derive(Debug)]
enum Command {
    ToggleMute(bool),
    End,
}

enum Signal {
    Event(CallEvent),
    Close,
}

pub struct CallOrchestrator {
    timings: CallTimings,
    deps: CallCollaborators,
}

impl CallOrchestrator {
    pub fn new(timings: CallTimings, deps: CallCollaborators) -> Self {
        Self { timings, deps }
    }

    /// Splits the call into the UI-facing handle and the loop that drives it. Nothing
    /// happens until `CallRun::run` is awaited.
    pub fn start(self) -> (CallHandle, CallRun) {
        let session = CallSession::new(self.timings);
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (signals_tx, signals) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots) = watch::channel(session.snapshot());

        let handle = CallHandle {
            commands: commands_tx,
            snapshots,
        };
        let run = CallRun {
            resolver: DialogueResolver::new(self.deps.nlu.clone()),
            session,
            deps: self.deps,
            commands,
            signals_tx,
            signals,
            snapshots: snapshots_tx,
            listen_task: None,
            speak_task: None,
            tasks: Vec::new(),
        };
        (handle, run)
    }
}

/// UI side of a call. Dropping every clone tears the call down.
#[derive(Clone)]
pub struct CallHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<CallSnapshot>,
}

impl CallHandle {
    pub fn toggle_mute(&self, muted: bool) -> Result<(), CallError> {
        self.send(Command::ToggleMute(muted))
    }

    pub fn end_call(&self) -> Result<(), CallError> {
        self.send(Command::End)
    }

    pub fn snapshot(&self) -> CallSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CallSnapshot> {
        self.snapshots.clone()
    }

    fn send(&self, cmd: Command) -> Result<(), CallError> {
        self.commands.send(cmd).map_err(|_| CallError::Ended)
    }
}

pub struct CallRun {
    session: CallSession,
    deps: CallCollaborators,
    resolver: DialogueResolver,
    commands: mpsc::UnboundedReceiver<Command>,
    signals_tx: mpsc::UnboundedSender<Signal>,
    signals: mpsc::UnboundedReceiver<Signal>,
    snapshots: watch::Sender<CallSnapshot>,
    listen_task: Option<JoinHandle<()>>,
    speak_task: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl CallRun {
    /// Rings, answers and runs turns until the call ends. Resolves once the close delay
    /// after `Ended` has passed, returning the final snapshot.
    pub async fn run(mut self) -> CallSnapshot {
        self.dispatch(CallEvent::Start);

        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        let mut commands_open = true;
        loop {
            tokio::select! {
                cmd = self.commands.recv(), if commands_open => match cmd {
                    Some(Command::ToggleMute(muted)) => self.dispatch(CallEvent::ToggleMute(muted)),
                    Some(Command::End) => self.dispatch(CallEvent::End),
                    None => {
                        commands_open = false;
                        log::info!("all call handles dropped; tearing down");
                        self.dispatch(CallEvent::Teardown);
                    }
                },
                Some(signal) = self.signals.recv() => match signal {
                    Signal::Event(event) => self.dispatch(event),
                    Signal::Close => break,
                },
                _ = ticker.tick() => self.dispatch(CallEvent::Tick),
            }
        }

        self.shutdown();
        self.session.snapshot()
    }

    fn dispatch(&mut self, event: CallEvent) {
        let prev = self.session.state();
        let effects = self.session.handle(event);
        let now = self.session.state();
        if prev != now {
            log::info!("call: {} -> {}", prev.label(), now.label());
        }

        for effect in effects {
            self.execute(effect);
        }

        let snapshot = self.session.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartRinging => self.deps.ringer.start(),
            Effect::StopRinging => self.deps.ringer.stop(),
            Effect::ScheduleAnswer { generation, delay } => {
                self.after(delay, Signal::Event(CallEvent::Answered { generation }));
            }
            Effect::ScheduleListen { generation, delay } => {
                self.after(delay, Signal::Event(CallEvent::ListenDue { generation }));
            }
            Effect::ScheduleClose { delay } => self.after(delay, Signal::Close),
            Effect::StartListening { generation } => {
                if let Some(stale) = self.listen_task.take() {
                    stale.abort();
                }
                let capture = self.deps.capture.clone();
                let interim_tx = self.signals_tx.clone();
                let on_interim = Box::new(move |text: String| {
                    let _ = interim_tx.send(Signal::Event(CallEvent::Interim { generation, text }));
                });
                let task = self.spawn_step(
                    async move {
                        let outcome = capture.listen(on_interim).await;
                        CallEvent::Captured {
                            generation,
                            outcome,
                        }
                    },
                    CallEvent::Captured {
                        generation,
                        outcome: CaptureOutcome::Failed("speech capture panicked".into()),
                    },
                );
                self.listen_task = Some(task);
            }
            Effect::AbortListening => {
                self.deps.capture.abort();
                if let Some(task) = self.listen_task.take() {
                    task.abort();
                }
            }
            Effect::Resolve {
                generation,
                transcript,
                prior_context,
            } => {
                let resolver = self.resolver.clone();
                let task = self.spawn_step(
                    async move {
                        let outcome = resolver
                            .resolve(&transcript, prior_context.as_deref())
                            .await;
                        CallEvent::Resolved {
                            generation,
                            outcome,
                        }
                    },
                    CallEvent::Resolved {
                        generation,
                        outcome: ResolverOutcome::Unresolvable {
                            reply: FALLBACK_APOLOGY.into(),
                        },
                    },
                );
                self.track(task);
            }
            Effect::Save {
                generation,
                transaction,
            } => {
                let store = self.deps.store.clone();
                let accounts = self.deps.accounts.clone();
                let task = self.spawn_step(
                    async move {
                        let today = chrono::Local::now().date_naive();
                        let outcome =
                            save_transaction(transaction, store.as_ref(), accounts.as_ref(), today)
                                .await;
                        CallEvent::SaveFinished {
                            generation,
                            outcome,
                        }
                    },
                    CallEvent::SaveFinished {
                        generation,
                        outcome: SaveOutcome::Failed("save panicked".into()),
                    },
                );
                self.track(task);
            }
            Effect::Speak { generation, text } => {
                if let Some(stale) = self.speak_task.take() {
                    stale.abort();
                }
                let playback = self.deps.playback.clone();
                let task = self.spawn_step(
                    async move {
                        let report = playback.say(&text).await;
                        log::debug!("spoke {:?} via {report:?}", text);
                        CallEvent::SpeechFinished { generation }
                    },
                    CallEvent::SpeechFinished { generation },
                );
                self.speak_task = Some(task);
            }
            Effect::StopSpeaking => self.stop_speaking(),
        }
    }

    fn stop_speaking(&mut self) {
        self.deps.playback.stop();
        if let Some(task) = self.speak_task.take() {
            task.abort();
        }
    }

    /// Runs one operation off the loop. A panic inside it still produces `on_panic`, so
    /// the call never waits on a completion that cannot arrive.
    fn spawn_step<F>(&self, step: F, on_panic: CallEvent) -> JoinHandle<()>
    where
        F: Future<Output = CallEvent> + Send + 'static,
    {
        let tx = self.signals_tx.clone();
        tokio::spawn(async move {
            let event = match AssertUnwindSafe(step).catch_unwind().await {
                Ok(event) => event,
                Err(_) => {
                    log::error!("call step panicked; recovering with {on_panic:?}");
                    on_panic
                }
            };
            let _ = tx.send(Signal::Event(event));
        })
    }

    fn after(&mut self, delay: Duration, signal: Signal) {
        let tx = self.signals_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(signal);
        });
        self.track(task);
    }

    fn track(&mut self, task: JoinHandle<()>) {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(task);
    }

    fn shutdown(&mut self) {
        debug_assert_eq!(self.session.state(), CallState::Ended);
        self.deps.ringer.stop();
        self.deps.capture.abort();
        if let Some(task) = self.listen_task.take() {
            task.abort();
        }
        if let Some(task) = self.speak_task.take() {
            if !task.is_finished() {
                self.deps.playback.stop();
            }
            task.abort();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Resolves the account, persists the transaction and applies the balance change.
pub async fn save_transaction(
    transaction: ParsedTransaction,
    store: &dyn TransactionStore,
    accounts: &dyn AccountsProvider,
    today: chrono::NaiveDate,
) -> SaveOutcome {
    match try_save(&transaction, store, accounts, today).await {
        Ok(Some((record, account_name))) => SaveOutcome::Saved {
            record,
            account_name,
        },
        Ok(None) => SaveOutcome::NotSaved,
        Err(e) => SaveOutcome::Failed(format!("{e:#}")),
    }
}

async fn try_save(
    transaction: &ParsedTransaction,
    store: &dyn TransactionStore,
    accounts: &dyn AccountsProvider,
    today: chrono::NaiveDate,
) -> anyhow::Result<Option<(SavedRecord, Option<String>)>> {
    let available = accounts.list_accounts().await.context("list accounts")?;
    let account = resolve_account(&available, transaction.account_name.as_deref());

    let draft =
        TransactionDraft::from_parsed(transaction, account.map(|a| a.id.clone()), today);
    let Some(record) = store.save(&draft).await.context("save transaction")? else {
        return Ok(None);
    };

    if let Some(account) = account {
        // The record is already stored; a failed balance update must not turn into a retry.
        if let Err(e) = accounts
            .adjust_balance(&account.id, draft.amount, draft.kind.is_credit())
            .await
        {
            log::warn!("balance update for account {} failed: {e:#}", account.id.as_str());
        }
    }

    let spoken_account = transaction
        .account_name
        .as_ref()
        .and(account.map(|a| a.name.clone()));
    Ok(Some((record, spoken_account)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use voiceledger_core::account::{Account, AccountKind};
    use voiceledger_core::types::{AccountId, RecordId, TransactionType};

    struct Store {
        decline: bool,
        saved: Mutex<Vec<TransactionDraft>>,
    }

    #[async_trait]
    impl TransactionStore for Store {
        async fn save(&self, draft: &TransactionDraft) -> anyhow::Result<Option<SavedRecord>> {
            if self.decline {
                return Ok(None);
            }
            self.saved.lock().unwrap().push(draft.clone());
            Ok(Some(SavedRecord {
                id: RecordId::new(),
                draft: draft.clone(),
            }))
        }
    }

    struct Accounts {
        list: Vec<Account>,
        fail_adjust: bool,
        adjusted: Mutex<Vec<(AccountId, f64, bool)>>,
    }

    #[async_trait]
    impl AccountsProvider for Accounts {
        async fn list_accounts(&self) -> anyhow::Result<Vec<Account>> {
            Ok(self.list.clone())
        }

        async fn adjust_balance(
            &self,
            account_id: &AccountId,
            amount: f64,
            is_credit: bool,
        ) -> anyhow::Result<()> {
            if self.fail_adjust {
                anyhow::bail!("balance service down");
            }
            self.adjusted
                .lock()
                .unwrap()
                .push((account_id.clone(), amount, is_credit));
            Ok(())
        }
    }

    fn accounts(fail_adjust: bool) -> Accounts {
        Accounts {
            list: vec![
                Account::new("cash", "Cash", AccountKind::Cash).with_default(true),
                Account::new("bk", "bKash", AccountKind::MobileBanking),
            ],
            fail_adjust,
            adjusted: Mutex::new(vec![]),
        }
    }

    fn store(decline: bool) -> Store {
        Store {
            decline,
            saved: Mutex::new(vec![]),
        }
    }

    fn income(account_name: Option<&str>) -> ParsedTransaction {
        ParsedTransaction {
            kind: TransactionType::Income,
            amount: 15000.0,
            category: "salary".into(),
            description: "salary".into(),
            transaction_date: None,
            account_name: account_name.map(str::to_string),
        }
    }

    fn today() -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn named_account_is_credited_and_spoken() {
        let store = store(false);
        let accounts = accounts(false);

        let out = save_transaction(income(Some("bkash")), &store, &accounts, today()).await;
        let SaveOutcome::Saved {
            record,
            account_name,
        } = out
        else {
            panic!("expected saved");
        };
        assert_eq!(account_name.as_deref(), Some("bKash"));
        assert_eq!(record.draft.account_id, Some(AccountId::new("bk")));
        assert_eq!(record.draft.transaction_date, today());
        assert_eq!(
            *accounts.adjusted.lock().unwrap(),
            vec![(AccountId::new("bk"), 15000.0, true)]
        );
    }

    #[tokio::test]
    async fn unnamed_account_falls_back_silently() {
        let store = store(false);
        let accounts = accounts(false);

        let out = save_transaction(income(None), &store, &accounts, today()).await;
        assert!(matches!(out, SaveOutcome::Saved { account_name: None, .. }));
        assert_eq!(
            store.saved.lock().unwrap()[0].account_id,
            Some(AccountId::new("cash"))
        );
    }

    #[tokio::test]
    async fn declined_save_skips_balance_update() {
        let accounts = accounts(false);
        let out = save_transaction(income(None), &store(true), &accounts, today()).await;
        assert_eq!(out, SaveOutcome::NotSaved);
        assert!(accounts.adjusted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn balance_failure_still_reports_saved() {
        let store = store(false);
        let out = save_transaction(income(None), &store, &accounts(true), today()).await;
        assert!(matches!(out, SaveOutcome::Saved { .. }));
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }
}
