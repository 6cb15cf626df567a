use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::StreamExt;
use mm_chat::{
    chat_protocol::Message, init_logging, llm_multimodal::MediaInput, ClientConfig, Conversation,
    ConversationMode, DisplayPayload, TurnInput,
};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "mm-chat",
    version,
    about = "Stream multimodal chat turns to a vision language model"
)]
struct Cli {
    /// YAML config file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Text of the (first) turn
    #[arg(long, short)]
    text: Option<String>,

    /// Image, video or capture-frame file; repeat for several
    #[arg(long = "file", short = 'f')]
    files: Vec<PathBuf>,

    /// Stream a separate reasoning channel (default)
    #[arg(long, overrides_with = "no_thinking")]
    thinking: bool,

    /// Answer directly without a reasoning channel
    #[arg(long = "no-thinking", overrides_with = "thinking")]
    no_thinking: bool,

    #[arg(long, default_value_t = 1.0)]
    temperature: f32,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    log_json: bool,

    /// Keep a session open and read turns from stdin
    #[arg(long, short)]
    interactive: bool,
}

impl Cli {
    fn mode(&self) -> ConversationMode {
        ConversationMode::from_thinking(self.thinking || !self.no_thinking)
    }

    fn load_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_yaml_file(path)?,
            None => ClientConfig::default(),
        };
        if let Some(model) = &self.model {
            config.model_id = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.log_json {
            config.logging.json = true;
        }
        config.resolve_api_key()?;
        config.validate()?;
        Ok(config)
    }
}

/// Prints cumulative snapshots as they grow, writing only the new suffix of
/// each channel.
#[derive(Debug, Default)]
struct StreamPrinter {
    reasoning_len: usize,
    answer_len: usize,
    opened: bool,
    closed: bool,
}

impl StreamPrinter {
    fn print(&mut self, out: &mut impl Write, display: &DisplayPayload) -> io::Result<()> {
        if display.thinking && !self.opened {
            out.write_all(b"<think>")?;
            self.opened = true;
        }
        if let Some(new) = display.reasoning.get(self.reasoning_len..) {
            out.write_all(new.as_bytes())?;
            self.reasoning_len = display.reasoning.len();
        }
        if let Some(new) = display.answer.get(self.answer_len..) {
            if !new.is_empty() && self.opened && !self.closed {
                out.write_all(b"</think>")?;
                self.closed = true;
            }
            out.write_all(new.as_bytes())?;
            self.answer_len = display.answer.len();
        }
        out.flush()
    }

    fn finish(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.opened && !self.closed {
            out.write_all(b"</think>")?;
        }
        out.write_all(b"\n")?;
        out.flush()
    }
}

struct Session {
    conversation: Conversation,
    mode: ConversationMode,
    temperature: f32,
    /// Token of the turn in flight, if any; Ctrl-C cancels it
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Session {
    /// Run one turn, printing it, and return the history to keep.
    async fn run_turn(&self, input: TurnInput, history: Vec<Message>) -> Result<Vec<Message>> {
        let cancel = CancellationToken::new();
        *self.current.lock() = Some(cancel.clone());
        let result = self.stream_turn(input, history, &cancel).await;
        *self.current.lock() = None;
        result
    }

    async fn stream_turn(
        &self,
        input: TurnInput,
        history: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>> {
        let mut stream = self
            .conversation
            .turn(
                input,
                Some(history.clone()),
                self.mode,
                self.temperature,
                cancel.clone(),
            )
            .await?;

        let mut stdout = io::stdout().lock();
        let mut printer = StreamPrinter::default();
        let mut last = None;
        while let Some(update) = stream.next().await {
            let update = update?;
            printer.print(&mut stdout, &update.display)?;
            last = Some(update);
        }
        printer.finish(&mut stdout)?;

        if cancel.is_cancelled() {
            warn!("Turn cancelled, keeping partial reply");
        }
        Ok(last.map(|update| update.history.into()).unwrap_or(history))
    }
}

/// Ctrl-C cancels the turn in flight; with no turn running it exits.
fn spawn_interrupt_handler(current: Arc<Mutex<Option<CancellationToken>>>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !interrupt(&current) {
                eprintln!();
                std::process::exit(130);
            }
        }
    });
}

/// Cancel the turn in flight. Returns false when there is none.
fn interrupt(current: &Mutex<Option<CancellationToken>>) -> bool {
    match current.lock().as_ref() {
        Some(token) => {
            token.cancel();
            true
        }
        None => false,
    }
}

fn turn_input(text: Option<String>, files: &[PathBuf]) -> TurnInput {
    TurnInput {
        text: text.unwrap_or_default(),
        media: files.iter().cloned().map(MediaInput::from_path).collect(),
        streaming_index: None,
    }
}

async fn interactive(session: &Session, first: TurnInput) -> Result<()> {
    let mut history = Vec::new();
    if !first.text.is_empty() || !first.media.is_empty() {
        history = session.run_turn(first, history).await?;
    }

    let mut queued: Vec<PathBuf> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            (":quit", _) | (":q", _) => break,
            (":reset", _) => {
                history.clear();
                queued.clear();
                eprintln!("history cleared");
            }
            (":file", path) if !path.trim().is_empty() => {
                queued.push(PathBuf::from(path.trim()));
                eprintln!("{} file(s) queued", queued.len());
            }
            (command, _) if command.starts_with(':') => {
                eprintln!("commands: :file <path>, :reset, :quit");
            }
            _ => {
                let input = turn_input(Some(line.to_string()), &queued);
                match session.run_turn(input, history.clone()).await {
                    Ok(updated) => {
                        history = updated;
                        queued.clear();
                    }
                    Err(e) => eprintln!("error: {e:#}"),
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config().context("invalid configuration")?;
    init_logging(&config.logging)?;
    info!(?config, "Loaded configuration");

    let session = Session {
        conversation: Conversation::from_config(&config)?,
        mode: cli.mode(),
        temperature: cli.temperature,
        current: Arc::new(Mutex::new(None)),
    };
    spawn_interrupt_handler(Arc::clone(&session.current));

    let first = turn_input(cli.text.clone(), &cli.files);
    if cli.interactive {
        return interactive(&session, first).await;
    }
    if first.text.is_empty() && first.media.is_empty() {
        bail!("nothing to send: pass --text and/or --file, or use --interactive");
    }
    session.run_turn(first, Vec::new()).await?;
    Ok(())
}
