use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use projectiq_chain::{ProjectIq, SyncReport};
use projectiq_core::config::Config;
use projectiq_core::scanner::all_files;
use projectiq_core::types::{Conversation, Role};

#[derive(Parser)]
#[command(name = "projectiq", version, about = "Ask questions about your project documents")]
struct Cli {
    /// Configuration file; `config.<RUST_ENV>.toml` and `PROJECTIQ_*` variables are layered on top.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the index from the document root
    Sync,
    /// Answer one question
    Ask { question: Vec<String> },
    /// Interactive question loop
    Chat,
    /// Show whether an index exists and what built it
    Status,
    /// List the files a sync would ingest
    Scan,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug,lance=info,lancedb=info" } else { "info,lance=warn,lancedb=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let settings = Config::load_from(&cli.config)?.settings().context("invalid configuration")?;
    let mut app = ProjectIq::open(settings).await?;

    match cli.command {
        Command::Sync => match app.sync().await {
            Ok(report) => print_report(&report),
            Err(e) => {
                print_skipped(app.skipped());
                return Err(e.into());
            }
        },
        Command::Ask { question } => {
            let question = question.join(" ");
            match app.answer(&question).await {
                Ok(answer) => println!("{answer}"),
                Err(e) if e.needs_sync() => println!("No index found, please sync first (projectiq sync)."),
                Err(e) => return Err(e.into()),
            }
        }
        Command::Chat => chat(&mut app).await?,
        Command::Status => {
            match app.status().await? {
                Some(info) => {
                    println!("Collection : {}", info.collection);
                    println!("Chunks     : {}", info.chunk_count);
                    println!("Embedder   : {} (dim {})", info.embedder_id, info.dim);
                    println!("Built at   : {}", info.built_at.as_deref().unwrap_or("unknown"));
                }
                None => println!("No index at {}; run `projectiq sync`.", app.settings().index.storage_path.display()),
            }
            if let Some(reason) = app.stale_reason() {
                println!("Index is unusable with the current embedder ({reason}); run `projectiq sync`.");
            }
        }
        Command::Scan => {
            let index = app.scan()?;
            for (ext, paths) in &index {
                println!("{ext} ({})", paths.len());
                for path in paths { println!("  {}", path.display()); }
            }
            println!("{} files", all_files(&index).len());
        }
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("Synced {} files into {} documents and {} chunks.", report.files_scanned, report.documents, report.chunks);
    print_skipped(&report.failures);
}

fn print_skipped(failures: &[(PathBuf, String)]) {
    if !failures.is_empty() {
        println!("Skipped {} files:", failures.len());
        for (path, reason) in failures { println!("  {}: {}", path.display(), reason); }
    }
}

fn prompt_line(label: &str) -> io::Result<Option<String>> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 { return Ok(None); }
    Ok(Some(line.trim().to_string()))
}

async fn chat(app: &mut ProjectIq) -> anyhow::Result<()> {
    println!("\n=== ProjectIQ ===\n");
    if !app.has_index() {
        println!("No index found.");
        let choice = prompt_line("Sync project data now? (y/n): ")?.unwrap_or_default();
        if !choice.eq_ignore_ascii_case("y") {
            println!("Exiting.");
            return Ok(());
        }
        print_report(&app.sync().await?);
        println!();
    }

    println!("Ask questions about your project. Type 'exit' to quit.\n");
    let mut history = Conversation::new();
    while let Some(question) = prompt_line("you : ")? {
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") { break; }
        if question.is_empty() { continue; }
        history.push(Role::User, question.as_str());
        match app.answer(&question).await {
            Ok(answer) => {
                println!("\nProjectIQ: {answer}\n");
                history.push(Role::Assistant, answer);
            }
            Err(e) if e.needs_sync() => println!("\nProjectIQ: please sync first.\n"),
            Err(e) => eprintln!("\nerror: {e}\n"),
        }
    }
    println!("Good bye ({} turns).", history.len());
    Ok(())
}
