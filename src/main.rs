use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use interview_live::{
    create_router, Analysis, AppState, BackendClient, Config, ConsoleSpeech, FileCaptor, InterviewSetup,
    LiveSessionController, SessionConfig, SessionId, SessionNotice, SessionSnapshot, SessionState,
    TransportFactory,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "interview-live", version, about = "Live mock interview session client")]
struct Cli {
    /// Config file, without extension
    #[arg(long, default_value = "config/interview-live")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the local control API for the web UI
    Serve {
        /// WAV file used as the microphone
        #[arg(long)]
        audio: String,
    },
    /// Run one interview in the terminal
    Run(RunArgs),
    /// Print the report of a finished interview
    Report { session_id: String },
}

#[derive(Args)]
struct RunArgs {
    /// Join an existing session instead of creating one
    #[arg(long)]
    session_id: Option<String>,

    #[arg(long, default_value = "Software Engineer")]
    role: String,

    #[arg(long, default_value = "0-1 years")]
    experience: String,

    #[arg(long, default_value = "Technical")]
    interview_type: String,

    #[arg(long, default_value_t = 8)]
    questions: u32,

    /// WAV file used as the microphone
    #[arg(long)]
    audio: String,

    /// Seconds recorded per answer
    #[arg(long, default_value_t = 10)]
    answer_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let backend = BackendClient::new(&cfg.backend).context("Failed to build backend client")?;

    match cli.command {
        Command::Serve { audio } => serve(cfg, backend, &audio).await,
        Command::Run(args) => run_session(cfg, backend, args).await,
        Command::Report { session_id } => {
            let session_id = SessionId::parse(session_id)?;
            print_report(&backend, &session_id).await
        }
    }
}

async fn serve(cfg: Config, backend: BackendClient, audio: &str) -> Result<()> {
    let addr = cfg.http_addr();
    let captor = FileCaptor::new(shellexpand::tilde(audio).into_owned())
        .with_channels(cfg.audio.channels)
        .with_sample_rate(cfg.audio.sample_rate);

    let state = AppState::new(cfg, backend, Arc::new(captor));
    let router = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Control API listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    state.dispose_all().await;
    Ok(())
}

async fn run_session(cfg: Config, backend: BackendClient, args: RunArgs) -> Result<()> {
    let session_id = match args.session_id {
        Some(raw) => SessionId::parse(raw)?,
        None => {
            let setup = InterviewSetup {
                role: args.role,
                experience: args.experience,
                interview_type: args.interview_type,
                question_count: args.questions,
                ..InterviewSetup::default()
            };
            backend.start_interview(&setup).await?
        }
    };

    let captor = FileCaptor::new(shellexpand::tilde(&args.audio).into_owned())
        .with_channels(cfg.audio.channels)
        .with_sample_rate(cfg.audio.sample_rate);

    let controller = LiveSessionController::spawn(
        SessionConfig::from_config(&cfg, session_id.as_str()),
        TransportFactory::create(&cfg),
        Arc::new(captor),
        Arc::new(ConsoleSpeech),
    )?;

    let answer_time = Duration::from_secs(args.answer_secs.max(1));
    let mut snapshots = controller.subscribe();
    let mut last_question: Option<String> = None;
    let mut last_analysis = None;

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        if snapshot.state.is_terminal() {
            break;
        }

        if snapshot.analysis != Analysis::default() && last_analysis != Some(snapshot.analysis) {
            last_analysis = Some(snapshot.analysis);
            print_analysis(&snapshot);
        }

        let new_question = snapshot.state == SessionState::Active
            && snapshot.current_question.is_some()
            && snapshot.current_question != last_question;

        if new_question {
            last_question = snapshot.current_question.clone();
            if record_answer(&controller, answer_time).await? {
                controller.dispose().await;
                break;
            }
            continue;
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, ending session");
                controller.dispose().await;
                break;
            }
        }
    }

    let finished = controller.wait_finished().await;
    println!(
        "\nSession {} {} ({} answers, {} chunks sent)",
        finished.session_id, finished.state, finished.answers_submitted, finished.chunks_sent
    );

    while let Some(notice) = controller.try_next_notice().await {
        match notice {
            SessionNotice::ShowReport { session_id } => print_report(&backend, &session_id).await?,
            SessionNotice::Failed(e) => return Err(e.into()),
            SessionNotice::RecordingRejected(e) => warn!("Recording was rejected: {}", e),
        }
    }

    Ok(())
}

/// Record one answer; returns `true` when interrupted
async fn record_answer(controller: &LiveSessionController, answer_time: Duration) -> Result<bool> {
    if let Err(e) = controller.start_recording().await {
        if e.is_fatal() {
            return Err(e.into());
        }
        warn!("Could not start recording: {}", e);
        return Ok(false);
    }

    println!("Recording for {}s...", answer_time.as_secs());

    tokio::select! {
        _ = tokio::time::sleep(answer_time) => {
            controller.stop_recording().await;
            println!("Answer submitted ({}s)", controller.snapshot().elapsed_seconds);
            Ok(false)
        }
        _ = tokio::signal::ctrl_c() => Ok(true),
    }
}

fn print_analysis(snapshot: &SessionSnapshot) {
    let fmt = |v: Option<f64>| v.map(|v| format!("{:.0}%", v)).unwrap_or_else(|| "-".into());
    println!(
        "Clarity {} | Confidence {}",
        fmt(snapshot.analysis.clarity),
        fmt(snapshot.analysis.confidence)
    );
}

async fn print_report(backend: &BackendClient, session_id: &SessionId) -> Result<()> {
    let report = backend.fetch_report(session_id).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
