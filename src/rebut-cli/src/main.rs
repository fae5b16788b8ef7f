//! Rebut CLI - evidence-backed AI debates
//!
//! Runs a PRO/CON debate on a claim and prints the transcript as it is
//! produced, either as colored text or as JSON.

use std::env;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use futures::StreamExt;
use rebut_core::config::{RetrievalBackend, SpeechBackendKind};
use rebut_core::{
    AudioController, Config, DebateEngine, DebateEvent, DebateMode, DebateRequest,
    DebateResponse, ElevenLabsSpeech, ErrorResponse, EvidenceRetriever, InMemoryRetriever,
    NoEvidence, OpenAiGenerator, PineconeRetriever, PlaybackDevice, Position, SpeechBackend,
    Turn, VoiceTable,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rebut",
    version,
    about = "Evidence-backed AI debates",
    long_about = "Runs an alternating PRO/CON debate on a claim using an OpenAI-compatible model, \
                  optional evidence retrieval and optional spoken turns."
)]
struct Cli {
    /// The claim to debate
    #[arg(value_name = "CLAIM", required_unless_present = "list_voices")]
    claim: Option<String>,

    /// Total number of turns (PRO speaks on odd turns, CON on even)
    #[arg(short, long, default_value = "4", value_name = "ROUNDS")]
    rounds: u32,

    /// Speak each turn through the configured speech backend
    #[arg(long)]
    audio: bool,

    /// Voice name for the PRO side
    #[arg(long, default_value = "Rachel", value_name = "VOICE")]
    pro_voice: String,

    /// Voice name for the CON side
    #[arg(long, default_value = "Adam", value_name = "VOICE")]
    con_voice: String,

    /// What to surface for each turn
    #[arg(long, value_enum, default_value = "both")]
    mode: ModeArg,

    /// Print each turn as soon as it is produced
    #[arg(long)]
    stream: bool,

    /// Emit JSON instead of formatted text
    #[arg(long)]
    json: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// JSON corpus for in-memory evidence retrieval
    #[arg(long, value_name = "PATH")]
    corpus: Option<String>,

    /// List the known voice names and exit
    #[arg(long)]
    list_voices: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    TextOnly,
    Both,
}

impl From<ModeArg> for DebateMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::TextOnly => DebateMode::TextOnly,
            ModeArg::Both => DebateMode::Both,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => rebut_core::config::default_config(),
    };
    if let Ok(api_base) = env::var("OPENAI_API_BASE").or_else(|_| env::var("OPENAI_BASE_URL")) {
        config.generation.api_base = api_base;
    }
    if let Some(corpus) = &cli.corpus {
        config.retrieval.backend = RetrievalBackend::Memory;
        config.retrieval.corpus = Some(corpus.clone());
    }

    let voices = VoiceTable::from_config(&config.audio);
    if cli.list_voices {
        for name in voices.names() {
            println!("{:<10} {}", name.bright_cyan(), voices.resolve(name).dimmed());
        }
        return Ok(());
    }
    let Some(claim) = cli.claim.clone() else {
        return Ok(());
    };

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!("{}", "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow());
        String::new()
    });

    let generator = Arc::new(OpenAiGenerator::new(&config.generation, &api_key)?);
    let retriever = build_retriever(&config)?;
    let audio = Arc::new(build_audio(&config, voices, cli.audio).await);
    let engine = DebateEngine::from_config(&config, generator, retriever, audio.clone())?;

    for voice in [&cli.pro_voice, &cli.con_voice] {
        if cli.audio && !audio.voices().contains(voice) {
            eprintln!(
                "{}",
                format!("Warning: unknown voice '{}', using the default voice.", voice).yellow()
            );
        }
    }

    let request = DebateRequest::new(claim)
        .with_rounds(cli.rounds)
        .with_audio(cli.audio)
        .with_voices(&cli.pro_voice, &cli.con_voice)
        .with_mode(cli.mode.into());

    let mut run = match engine.start(request) {
        Ok(run) => run,
        Err(e) => {
            report_failure(&e, cli.json);
            std::process::exit(2);
        }
    };

    let abort = run.abort_handle();
    {
        let audio = audio.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                abort.abort();
                audio.stop();
            }
        });
    }

    if !cli.json {
        print_header(run.state().claim(), cli.rounds);
    }

    if cli.stream {
        let mut events = run.into_stream();
        let mut failed = false;
        while let Some(event) = events.next().await {
            failed |= matches!(event, DebateEvent::Error { .. });
            if cli.json {
                println!("{}", serde_json::to_string(&event)?);
            } else {
                print_event(&event);
            }
        }
        if failed {
            std::process::exit(1);
        }
    } else {
        let outcome = run.run_to_completion().await;
        if cli.json {
            match DebateResponse::from_result(outcome) {
                Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                Err(response) => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                    std::process::exit(1);
                }
            }
        } else {
            match outcome {
                Ok(transcript) => {
                    for turn in &transcript.turns {
                        print_turn(turn);
                    }
                    print_footer(transcript.total_exchanges());
                }
                Err(e) => {
                    for turn in run.history() {
                        print_turn(turn);
                    }
                    report_failure(&e, false);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn build_retriever(config: &Config) -> Result<Arc<dyn EvidenceRetriever>, Box<dyn std::error::Error>> {
    let retriever: Arc<dyn EvidenceRetriever> = match config.retrieval.backend {
        RetrievalBackend::None => Arc::new(NoEvidence),
        RetrievalBackend::Memory => {
            let path = config
                .retrieval
                .corpus
                .as_deref()
                .ok_or("retrieval.backend = \"memory\" requires retrieval.corpus")?;
            Arc::new(InMemoryRetriever::from_json_file(path)?)
        }
        RetrievalBackend::Pinecone => {
            let api_key = env::var("PINECONE_API_KEY").unwrap_or_default();
            Arc::new(PineconeRetriever::new(&config.retrieval, api_key)?)
        }
    };
    Ok(retriever)
}

async fn build_audio(config: &Config, voices: VoiceTable, enabled: bool) -> AudioController {
    if !enabled {
        return AudioController::new(None, None, voices);
    }

    let speech: Option<Arc<dyn SpeechBackend>> = match config.audio.backend {
        SpeechBackendKind::None => None,
        SpeechBackendKind::Elevenlabs => {
            let api_key = env::var("ELEVENLABS_API_KEY").unwrap_or_default();
            Some(Arc::new(ElevenLabsSpeech::new(api_key, &config.audio.model_id)))
        }
        SpeechBackendKind::Kokoro => local_speech().await,
    };

    AudioController::new(speech, open_device(), voices)
}

#[cfg(feature = "local-tts")]
async fn local_speech() -> Option<Arc<dyn SpeechBackend>> {
    match rebut_core::speech::KokoroSpeech::new().await {
        Ok(speech) => Some(Arc::new(speech)),
        Err(e) => {
            warn!(error = %e, "local speech unavailable");
            None
        }
    }
}

#[cfg(not(feature = "local-tts"))]
async fn local_speech() -> Option<Arc<dyn SpeechBackend>> {
    warn!("built without the local-tts feature, audio disabled");
    None
}

#[cfg(feature = "playback")]
fn open_device() -> Option<Arc<dyn PlaybackDevice>> {
    match rebut_core::audio::RodioDevice::open() {
        Ok(device) => Some(Arc::new(device)),
        Err(e) => {
            warn!(error = %e, "no audio output device");
            None
        }
    }
}

#[cfg(not(feature = "playback"))]
fn open_device() -> Option<Arc<dyn PlaybackDevice>> {
    warn!("built without the playback feature, audio disabled");
    None
}

fn print_header(claim: &str, rounds: u32) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Rebut - Evidence-backed Debate".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Claim:".bold(), claim.bright_white());
    println!("{} {}", "Turns:".bold(), rounds);
    println!("{}", "─".repeat(70).dimmed());
}

fn print_footer(total: usize) {
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  Debate concluded after {} turns.", total)
            .bright_green()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
}

fn print_event(event: &DebateEvent) {
    match event {
        DebateEvent::Start { .. } => {}
        DebateEvent::Message {
            speaker,
            message,
            round,
            show_text,
            ..
        } => {
            print_speaker(*speaker, *round);
            if *show_text {
                print_wrapped(message);
            }
        }
        DebateEvent::Complete { total_exchanges, .. } => print_footer(*total_exchanges),
        DebateEvent::Error { message } => {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
    }
}

fn print_turn(turn: &Turn) {
    print_speaker(turn.speaker, turn.round);
    if turn.show_text {
        print_wrapped(&turn.text);
    }
}

fn print_speaker(speaker: Position, round: u32) {
    let label = match speaker {
        Position::Pro => speaker.display_name().bright_green().bold(),
        Position::Con => speaker.display_name().bright_red().bold(),
    };
    println!();
    println!("{} {} {}", "▶".bright_cyan(), label, format!("(round {})", round).dimmed());
}

fn print_wrapped(text: &str) {
    for line in wrap_lines(text, 66) {
        println!("  {}", line);
    }
    println!();
}

fn report_failure(err: &rebut_core::DebateError, json: bool) {
    if json {
        let response = ErrorResponse::from(err);
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.detail.clone())
        );
    } else {
        eprintln!("{} {}", "Error:".red().bold(), err);
    }
}

/// Greedy word wrap that keeps the paragraph breaks of generated text.
fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split("\n\n") {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.len() + 1 + word.len() > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}
