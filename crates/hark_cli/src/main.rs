mod logging;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use hark_core::{HarkConfig, Report};
use hark_dispatch::Dispatcher;
use hark_voice::{transcribe_recording, AudioFormat, HttpTranscriber, SpeechToText};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use session::Session;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target host (IP or hostname); `localhost` runs on this machine
    #[arg(long, env = "HARK_HOST")]
    host: Option<String>,

    /// Username for the target host
    #[arg(short, long, env = "HARK_USERNAME")]
    username: Option<String>,

    /// Run one instruction and exit
    #[arg(short, long, conflicts_with = "audio")]
    text: Option<String>,

    /// Transcribe an audio file (or `-` for a recording on stdin) and run it
    #[arg(short, long)]
    audio: Option<PathBuf>,

    /// Format of a recording read from stdin
    #[arg(long, default_value = "wav")]
    audio_format: String,

    /// Path to the config file (default: <config dir>/hark/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write daily-rotated logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _log_guard = logging::init(args.log_dir.as_deref());

    let config = match &args.config {
        Some(path) => HarkConfig::load(path)?,
        None => HarkConfig::load_or_default(
            HarkConfig::default_path().unwrap_or_else(|| PathBuf::from("hark.toml")),
        ),
    };
    config.validate()?;

    let dispatcher = Arc::new(Dispatcher::from_config(&config)?);
    let stt: Arc<dyn SpeechToText> = Arc::new(HttpTranscriber::from_config(&config)?);

    let session = Session::gather(args.host.clone(), args.username.clone())?;
    info!("Targeting {}", session.host());

    if let Some(text) = &args.text {
        let report = run_request(&dispatcher, &session, text).await;
        return Ok(exit_code(report.as_ref()));
    }

    if let Some(audio) = &args.audio {
        let text = match transcribe_input(stt.as_ref(), audio, &args.audio_format).await {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(ExitCode::SUCCESS),
            Err(report) => {
                print!("{}", report);
                return Ok(ExitCode::FAILURE);
            }
        };
        let report = run_request(&dispatcher, &session, &text).await;
        return Ok(exit_code(report.as_ref()));
    }

    repl(&dispatcher, stt.as_ref(), &session).await?;
    Ok(ExitCode::SUCCESS)
}

async fn repl(dispatcher: &Arc<Dispatcher>, stt: &dyn SpeechToText, session: &Session) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to open terminal")?;
    println!(
        "hark ready on {}. Type an instruction, `audio <file>` to transcribe one, or `quit`.",
        session.host()
    );

    loop {
        let line = match tokio::task::block_in_place(|| editor.readline("hark> ")) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let trimmed = line.trim();

        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
        if trimmed.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(trimmed);

        let text = match trimmed.strip_prefix("audio ") {
            Some(path) => {
                let path = PathBuf::from(path.trim());
                match transcribe_input(stt, &path, "wav").await {
                    Ok(Some(text)) => text,
                    Ok(None) => continue,
                    Err(report) => {
                        print!("{}", report);
                        continue;
                    }
                }
            }
            None => trimmed.to_string(),
        };

        run_request(dispatcher, session, &text).await;
    }
    Ok(())
}

/// Dispatch on its own task so Ctrl-C can abandon it. Dropping the task
/// drops its sockets, sessions and child processes with it.
async fn run_request(dispatcher: &Arc<Dispatcher>, session: &Session, text: &str) -> Option<Report> {
    let request = session.request(text);
    let dispatcher = dispatcher.clone();
    let mut task = tokio::spawn(async move { dispatcher.dispatch(&request).await });

    tokio::select! {
        joined = &mut task => match joined {
            Ok(outcome) => {
                print!("{}", outcome.report);
                Some(outcome.report)
            }
            Err(e) => {
                error!("Request task failed: {}", e);
                None
            }
        },
        _ = tokio::signal::ctrl_c() => {
            task.abort();
            let _ = task.await;
            println!("[info] Cancelled.");
            None
        }
    }
}

/// `-` reads a raw recording from stdin; anything else is a file path.
/// `Ok(None)` means nothing was said.
async fn transcribe_input(
    stt: &dyn SpeechToText,
    path: &Path,
    format: &str,
) -> std::result::Result<Option<String>, Report> {
    let transcript = if path == Path::new("-") {
        let mut audio = Vec::new();
        if let Err(e) = std::io::stdin().read_to_end(&mut audio) {
            let mut report = Report::new();
            report.error(format!("failed to read recording from stdin: {e}"));
            return Err(report);
        }
        let format = AudioFormat::from_path(Path::new(&format!("recording.{format}")));
        transcribe_recording(stt, &audio, format).await
    } else {
        stt.transcribe(path).await
    };

    let mut report = Report::new();
    match transcript {
        Ok(t) if t.text.is_empty() => {
            report.info("No speech recognised");
            print!("{}", report);
            Ok(None)
        }
        Ok(t) => {
            report.info(format!("Transcription: {}", t.text));
            print!("{}", report);
            Ok(Some(t.text))
        }
        Err(e) => {
            report.failure(&e);
            Err(report)
        }
    }
}

fn exit_code(report: Option<&Report>) -> ExitCode {
    match report {
        Some(r) if !r.has_errors() => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}
