use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use api::{AppState, router};
use quiz_core::model::QuizId;
use services::{AppServices, Clock};

mod db;
mod seed;

#[derive(Parser)]
#[command(name = "quiz", version, about = "Quiz site server and management commands")]
struct Cli {
    /// SQLite database URL or path
    #[arg(
        long = "db",
        env = "QUIZ_DB_URL",
        default_value = "sqlite://quiz.sqlite3",
        global = true
    )]
    db_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, env = "QUIZ_BIND", default_value = "127.0.0.1:8000")]
        bind: String,
    },

    /// Create a demo category, quiz and questions
    Seed,

    /// Write a quiz with its questions and answers as JSON
    ExportQuiz {
        /// Quiz id
        id: QuizId,

        /// Output file
        #[arg(long, default_value = "quiz.json")]
        filepath: PathBuf,
    },

    /// Create an account with every permission
    CreateSuperuser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },
}

async fn open_services(raw_db_url: &str) -> Result<AppServices, Box<dyn std::error::Error>> {
    let db_url = db::normalize_sqlite_url(raw_db_url)?;
    db::prepare_sqlite_file(&db_url)?;
    let services = AppServices::new_sqlite(&db_url, Clock::default()).await?;
    tracing::debug!(%db_url, "database ready");
    Ok(services)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let services = open_services(&cli.db_url).await?;

    match cli.command {
        Command::Serve { bind } => {
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            tracing::info!(addr = %listener.local_addr()?, "listening");
            axum::serve(listener, router(AppState::new(services)))
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Command::Seed => match seed::seed(&services).await? {
            Some(quiz) => println!("seeded demo quiz {quiz} at /{}", seed::DEMO_SLUG),
            None => println!("demo quiz already present"),
        },
        Command::ExportQuiz { id, filepath } => {
            let export = services.quizzes().export(id).await?;
            let json = serde_json::to_string_pretty(&export)?;
            std::fs::write(&filepath, json)?;
            println!("wrote {} to {}", export.title, filepath.display());
        }
        Command::CreateSuperuser { email, password } => {
            let user = services.users().create_superuser(&email, &password).await?;
            println!("created superuser {} (id {})", user.email().as_str(), user.id());
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
