use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use voiceledger_core::config::{AppConfig, NluMode};
use voiceledger_core::text::confirmation_reply;
use voiceledger_core::types::ParsedTransactionRequest;
use voiceledger_engine::call::{CallHandle, CallOrchestrator, save_transaction};
use voiceledger_engine::capture::{ChannelCapture, RecognitionEvent};
use voiceledger_engine::machine::{CallSnapshot, CallState, SaveOutcome};
use voiceledger_engine::resolver::{DialogueResolver, ResolverOutcome};
use voiceledger_engine::tone::{PcmSink, RingTone, ToneRinger};
use voiceledger_runtime::builder::{HostDevices, build_call_collaborators, build_nlu, chat_config};
use voiceledger_runtime::chat::{ChatTurn, chat_transaction};
use voiceledger_runtime::config_store::ConfigStore;
use voiceledger_runtime::ledger::JsonLedger;
use voiceledger_runtime::secrets::{SecretKey, delete_secret, lookup_secret, set_secret};
use voiceledger_runtime::tts::ConsolePlayback;

#[derive(Parser)]
#[command(name = "voiceledger", about = "Record income and expenses by talking to an assistant")]
struct Cli {
    /// Config file; written with defaults when missing.
    #[arg(long, env = "VOICELEDGER_CONFIG", default_value = "voiceledger/config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Place a call. Type what you would say; `/mute`, `/unmute` and `/end` control the call.
    ///
    /// Lines typed while the assistant is not listening are not heard; wait for
    /// `[listening]` before typing.
    Call,
    /// Enter one transaction as a typed chat message.
    Chat { text: Vec<String> },
    /// List accounts and balances.
    Accounts,
    /// List saved transactions.
    Transactions,
    /// Store an API key in the OS keyring.
    SetKey { key: KeyName, value: String },
    /// Remove an API key from the OS keyring.
    DeleteKey { key: KeyName },
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyName {
    Nlu,
    Elevenlabs,
}

impl From<KeyName> for SecretKey {
    fn from(k: KeyName) -> Self {
        match k {
            KeyName::Nlu => SecretKey::NluApiKey,
            KeyName::Elevenlabs => SecretKey::ElevenLabsApiKey,
        }
    }
}

/// Shows the ring cadence on stderr instead of driving a sound card.
struct ConsoleRingSink;

impl PcmSink for ConsoleRingSink {
    fn write(&self, samples: &[f32], sample_rate_hz: u32) {
        let secs = samples.len() as f32 / sample_rate_hz.max(1) as f32;
        eprintln!("~ ring ring ~ ({secs:.0}s cadence)");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = ConfigStore::at_path(&cli.config);
    let cfg = store.load_or_init()?;
    let base_dir = cli
        .config
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let ledger_path = cfg
        .ledger_path
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| base_dir.join("ledger.json"));

    match cli.command.unwrap_or(Command::Call) {
        Command::Call => run_call(&cfg, ledger_path, base_dir.join("audio")).await,
        Command::Chat { text } => run_chat(&cfg, ledger_path, &text.join(" ")).await,
        Command::Accounts => {
            let ledger = open_ledger(ledger_path).await?;
            for a in ledger.load()?.accounts {
                let marker = if a.is_default { "*" } else { " " };
                println!("{marker} {:<12} {:<10} {:>12.2}", a.name, a.id.as_str(), a.balance);
            }
            Ok(())
        }
        Command::Transactions => {
            let ledger = open_ledger(ledger_path).await?;
            for r in ledger.transactions()? {
                let d = &r.draft;
                println!(
                    "{} {:<7} {:>10.2} {:<16} {} [{}]",
                    d.transaction_date,
                    d.kind.as_str(),
                    d.amount,
                    d.category,
                    d.description,
                    d.account_id.as_ref().map(|a| a.as_str()).unwrap_or("-"),
                );
            }
            Ok(())
        }
        Command::SetKey { key, value } => {
            set_secret(key.into(), value.trim())?;
            println!("stored");
            Ok(())
        }
        Command::DeleteKey { key } => {
            delete_secret(key.into())?;
            println!("removed");
            Ok(())
        }
    }
}

async fn open_ledger(path: PathBuf) -> anyhow::Result<JsonLedger> {
    let ledger = JsonLedger::at_path(path);
    ledger
        .ensure_accounts(voiceledger_runtime::defaults::default_accounts())
        .await?;
    Ok(ledger)
}

async fn run_call(cfg: &AppConfig, ledger_path: PathBuf, audio_dir: PathBuf) -> anyhow::Result<()> {
    let (capture, recognizer) = ChannelCapture::new();
    let host = HostDevices {
        capture: Arc::new(capture),
        ringer: Arc::new(ToneRinger::new(
            RingTone::ringback(8_000),
            Arc::new(ConsoleRingSink),
        )),
        local_voice: Arc::new(ConsolePlayback::stdout()),
        audio_dir,
    };
    let (deps, _ledger) = build_call_collaborators(cfg, ledger_path, host).await?;

    let (handle, run) = CallOrchestrator::new(cfg.call, deps).start();
    let printer = tokio::spawn(print_status(handle.subscribe()));
    let input = tokio::spawn(read_user_input(handle, recognizer));

    let last = run.run().await;
    input.abort();
    printer.abort();
    println!("call ended after {}s", last.duration_seconds);
    Ok(())
}

/// Each typed line stands in for one recognized utterance.
async fn read_user_input(
    handle: CallHandle,
    recognizer: tokio::sync::mpsc::UnboundedSender<RecognitionEvent>,
) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut muted = false;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::warn!("reading stdin failed: {e}");
                break;
            }
        };

        let sent = match line.trim() {
            "/mute" => {
                muted = true;
                handle.toggle_mute(true)
            }
            "/unmute" => {
                muted = false;
                handle.toggle_mute(false)
            }
            "/end" => handle.end_call(),
            "" => {
                let _ = recognizer.send(RecognitionEvent::Error("no-speech".into()));
                Ok(())
            }
            said => {
                if let Some(hint) = unheard_input_hint(handle.snapshot().state, muted) {
                    eprintln!("{hint}");
                    continue;
                }
                let _ = recognizer.send(RecognitionEvent::Final(said.to_string()));
                let _ = recognizer.send(RecognitionEvent::End);
                Ok(())
            }
        };
        if sent.is_err() {
            return;
        }
    }
    let _ = handle.end_call();
}

/// Why a typed line would not reach the recognizer, if it would not.
fn unheard_input_hint(state: CallState, muted: bool) -> Option<&'static str> {
    if muted {
        return Some("(muted; nothing was heard)");
    }
    match state {
        CallState::Listening => None,
        CallState::Ended => Some("(the call has ended)"),
        _ => Some("(not listening yet; type that again once [listening] shows)"),
    }
}

async fn print_status(mut updates: tokio::sync::watch::Receiver<CallSnapshot>) {
    let mut last: Option<(String, Option<String>)> = None;
    loop {
        let line = {
            let snap = updates.borrow_and_update();
            (snap.state.label().to_string(), snap.status.clone())
        };
        if last.as_ref() != Some(&line) {
            let (state, status) = &line;
            eprintln!("[{state}] {}", status.as_deref().unwrap_or(""));
            last = Some(line);
        }
        if updates.changed().await.is_err() {
            return;
        }
    }
}

async fn run_chat(cfg: &AppConfig, ledger_path: PathBuf, text: &str) -> anyhow::Result<()> {
    anyhow::ensure!(!text.trim().is_empty(), "nothing to record");
    cfg.validate()?;

    let ledger = open_ledger(ledger_path).await?;
    let api_key = lookup_secret(SecretKey::NluApiKey);
    let today = chrono::Local::now().date_naive();

    let turn = match cfg.nlu.mode {
        NluMode::Chat => {
            let chat = chat_config(cfg, api_key);
            let mut stdout = std::io::stdout();
            let turn = chat_transaction(&chat, text, today, |delta| {
                let _ = write!(stdout, "{delta}");
                let _ = stdout.flush();
            })
            .await
            .context("chat request")?;
            println!();
            turn
        }
        NluMode::Proxy => {
            let resolver = DialogueResolver::new(build_nlu(cfg, api_key));
            match resolver.resolve(text, None).await {
                ResolverOutcome::Resolved(tx) => {
                    ChatTurn::Request(ParsedTransactionRequest::Complete(tx))
                }
                ResolverOutcome::Clarify { question, .. } => {
                    ChatTurn::Request(ParsedTransactionRequest::NeedsClarification { question })
                }
                ResolverOutcome::UnsupportedLanguage { reply }
                | ResolverOutcome::Unresolvable { reply } => ChatTurn::Reply(reply),
            }
        }
    };

    let reply = match turn {
        ChatTurn::Request(ParsedTransactionRequest::Complete(tx)) => {
            match save_transaction(tx, &ledger, &ledger, today).await {
                SaveOutcome::Saved {
                    record,
                    account_name,
                } => confirmation_reply(
                    record.draft.kind,
                    record.draft.amount,
                    &record.draft.category,
                    account_name.as_deref(),
                ),
                SaveOutcome::NotSaved => voiceledger_core::text::SAVE_FAILED_REPLY.to_string(),
                SaveOutcome::Failed(reason) => {
                    log::warn!("saving transaction failed: {reason}");
                    voiceledger_core::text::SAVE_FAILED_REPLY.to_string()
                }
            }
        }
        ChatTurn::Request(ParsedTransactionRequest::NeedsClarification { question }) => question,
        ChatTurn::Reply(reply) => reply,
    };
    println!("assistant: {reply}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_commands_parse() {
        let cli = Cli::try_parse_from(["voiceledger", "delete-key", "elevenlabs"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::DeleteKey {
                key: KeyName::Elevenlabs
            })
        ));

        let cli = Cli::try_parse_from(["voiceledger", "set-key", "nlu", "sk-1"]).unwrap();
        let Some(Command::SetKey { key, value }) = cli.command else {
            panic!("expected set-key");
        };
        assert_eq!(SecretKey::from(key), SecretKey::NluApiKey);
        assert_eq!(value, "sk-1");
    }

    #[test]
    fn typed_lines_are_heard_only_while_listening() {
        assert_eq!(unheard_input_hint(CallState::Listening, false), None);
        assert!(unheard_input_hint(CallState::Listening, true).is_some());
        for state in [
            CallState::Ringing,
            CallState::Connected,
            CallState::Processing,
            CallState::Speaking,
            CallState::Ended,
        ] {
            assert!(unheard_input_hint(state, false).is_some(), "{state:?}");
        }
    }
}
