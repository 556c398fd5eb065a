use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use examprep_core::providers::{
    GeminiProvider, GroqProvider, HuggingFaceProvider, OllamaProvider, http_client,
};
use examprep_core::{
    LlmProvider, ProviderKind, ProviderRouter, QuizSettings, StudyTasks, TaskError, TaskOptions,
};
use examprep_gateway::{AiServer, AiState};

mod config;

use config::ExamPrepConfig;

#[derive(Parser)]
#[command(name = "examprep")]
#[command(version)]
#[command(about = "examprep — AI study assistant service")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the AI service HTTP server
    Serve,

    /// Run one study task against a local text file
    Ask {
        /// File with the study material
        file: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Task::Summary)]
        task: Task,

        /// Topic to explain (required for --task explain)
        #[arg(long)]
        topic: Option<String>,

        /// Preferred provider (gemini, groq, ollama, huggingface)
        #[arg(short, long)]
        provider: Option<ProviderKind>,

        /// Model id for the preferred provider
        #[arg(short, long)]
        model: Option<String>,

        /// Number of quiz questions
        #[arg(long, default_value_t = examprep_core::tasks::DEFAULT_NUM_QUESTIONS)]
        questions: u32,

        /// Quiz difficulty
        #[arg(long, default_value = examprep_core::tasks::DEFAULT_DIFFICULTY)]
        difficulty: String,

        /// Only try --provider, without falling back
        #[arg(long, requires = "provider")]
        exclusive: bool,
    },

    /// Show which providers are configured
    Providers,

    /// Initialize config directory and default config
    Init,

    /// Show current configuration (secrets masked)
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Task {
    Quiz,
    Topics,
    Summary,
    Explain,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --debug
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config),
        Commands::Providers => cmd_providers(&cli.config),
        Commands::Serve => cmd_serve(&cli.config).await,
        Commands::Ask {
            file,
            task,
            topic,
            provider,
            model,
            questions,
            difficulty,
            exclusive,
        } => {
            let options = TaskOptions {
                provider,
                model,
                exclusive,
            };
            let settings = QuizSettings {
                num_questions: questions,
                difficulty,
            };
            cmd_ask(&cli.config, &file, task, topic.as_deref(), &settings, &options).await
        }
    }
}

/// Build every backend once and hand them to the router
fn build_router(cfg: &ExamPrepConfig) -> Result<ProviderRouter> {
    let providers = &cfg.providers;
    let client = http_client(Duration::from_secs(providers.request_timeout_secs))
        .context("Failed to build HTTP client")?;

    let mut gemini = GeminiProvider::new(client.clone(), Some(providers.gemini.api_key.clone()));
    if let Some(url) = &providers.gemini.base_url {
        gemini = gemini.with_base_url(url);
    }
    if let Some(model) = &providers.gemini.model {
        gemini = gemini.with_default_model(model);
    }

    let mut groq = GroqProvider::new(client.clone(), Some(providers.groq.api_key.clone()));
    if let Some(url) = &providers.groq.base_url {
        groq = groq.with_base_url(url);
    }
    if let Some(model) = &providers.groq.model {
        groq = groq.with_default_model(model);
    }

    let mut ollama = OllamaProvider::new(client.clone(), providers.ollama.effective_base_url());
    if let Some(model) = &providers.ollama.model {
        ollama = ollama.with_default_model(model);
    }

    let mut huggingface =
        HuggingFaceProvider::new(client, Some(providers.huggingface.api_key.clone()));
    if let Some(url) = &providers.huggingface.base_url {
        huggingface = huggingface.with_base_url(url);
    }
    if let Some(model) = &providers.huggingface.model {
        huggingface = huggingface.with_default_model(model);
    }

    let router = ProviderRouter::new(vec![
        Arc::new(gemini) as Arc<dyn LlmProvider>,
        Arc::new(groq) as Arc<dyn LlmProvider>,
        Arc::new(ollama) as Arc<dyn LlmProvider>,
        Arc::new(huggingface) as Arc<dyn LlmProvider>,
    ]);

    for (kind, available) in router.availability() {
        if available {
            info!("{} provider ready", kind.label());
        } else {
            info!("{} provider not configured", kind.label());
        }
    }
    Ok(router)
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config::default_config_path();
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        tokio::fs::write(&config_path, config::DEFAULT_CONFIG).await?;
        // The loader refuses group/other-readable files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        info!("Created default config at {}", config_path.display());
    }

    println!("examprep initialized at {}", config_dir.display());
    println!(
        "Edit {} or export GEMINI_API_KEY / GROQ_API_KEY / HF_API_KEY to configure providers.",
        config_path.display()
    );
    Ok(())
}

fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = ExamPrepConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&cfg.redacted())?);
    Ok(())
}

fn cmd_providers(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = ExamPrepConfig::load(config_path)?;
    let router = build_router(&cfg)?;
    let chain = examprep_core::providers::DEFAULT_FALLBACK_ORDER;

    println!("{:<13} {:<10} {:<8} DEFAULT MODEL", "PROVIDER", "STATUS", "FALLBACK");
    for kind in ProviderKind::ALL {
        let Some(provider) = router.provider(kind) else {
            continue;
        };
        println!(
            "{:<13} {:<10} {:<8} {}",
            kind.as_str(),
            if provider.is_available() { "ready" } else { "missing" },
            if chain.contains(&kind) { "yes" } else { "no" },
            provider.default_model()
        );
    }
    Ok(())
}

async fn cmd_serve(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = ExamPrepConfig::load(config_path)?;
    let addr = cfg.socket_addr()?;
    info!("Starting AI service...");

    let tasks = StudyTasks::new(Arc::new(build_router(&cfg)?));
    let state = AiState::new(tasks)
        .with_auth_token(cfg.server.auth_token.clone())
        .with_max_body_bytes(cfg.server.max_body_bytes);

    let cancel = CancellationToken::new();
    let shutdown = {
        let cancel = cancel.clone();
        async move { cancel.cancelled().await }
    };
    let mut server = tokio::spawn(AiServer::new(addr, state).run(shutdown));

    tokio::select! {
        res = signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
        }
        // Bind failures and other early exits
        res = &mut server => {
            return res.context("AI service task failed")?;
        }
    }

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("AI service error: {:#}", e),
        Err(e) => error!("AI service task failed: {}", e),
    }

    println!("examprep stopped.");
    Ok(())
}

async fn cmd_ask(
    config_path: &Option<PathBuf>,
    file: &Path,
    task: Task,
    topic: Option<&str>,
    settings: &QuizSettings,
    options: &TaskOptions,
) -> Result<()> {
    let cfg = ExamPrepConfig::load(config_path)?;
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let tasks = StudyTasks::new(Arc::new(build_router(&cfg)?));

    let result = match task {
        Task::Quiz => tasks
            .generate_quiz(&text, settings, options)
            .await
            .map(|v| serde_json::to_string_pretty(&v).unwrap_or_else(|_| v.to_string())),
        Task::Topics => tasks
            .generate_topics(&text, options)
            .await
            .map(|v| serde_json::to_string_pretty(&v).unwrap_or_else(|_| v.to_string())),
        Task::Summary => tasks.generate_summary(&text, options).await,
        Task::Explain => {
            tasks
                .explain_topic(&text, topic.unwrap_or_default(), options)
                .await
        }
    };

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            if let TaskError::Provider(router_err) = &e {
                for attempt in router_err.attempts() {
                    eprintln!("  {:<12} {}", attempt.provider.as_str(), attempt.error);
                }
            }
            Err(e.into())
        }
    }
}
