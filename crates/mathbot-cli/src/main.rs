//! CLI entry point for MathBot: ingest PDF textbooks, inspect the index, ask the tutor.

mod render;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use mathbot_core::{
    app_data_dir, load_config, load_config_from, page_count, scan_pdfs, set_pdf_dir, status,
    AskOutcome, ChatSession, Config, FileOutcome, RetrievedChunk, Services,
};
use tracing_subscriber::EnvFilter;

use crate::render::{preview, render_answer};

const NO_CONTEXT: &str = "No relevant context found in your PDFs.";
const EMPTY_QUESTION: &str = "Please type a question first.";
const PREVIEW_CHARS: usize = 300;

#[derive(Parser)]
#[command(name = "mathbot")]
#[command(about = "MathBot: your AI math tutor, grounded in your own PDF textbooks")]
struct Cli {
    /// Read settings from this TOML file instead of the app data directory.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status.
    Status,
    /// Show where MathBot stores its config and index (app data directory).
    DataDir,
    /// Show the effective config, or persist a new PDF folder.
    Config {
        /// Folder holding your PDF textbooks.
        #[arg(long, value_name = "PATH")]
        pdf_dir: Option<PathBuf>,
    },
    /// List the PDFs in a folder with their page counts.
    Scan {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Extract, chunk and embed every PDF in the folder into the index.
    Ingest {
        /// Folder to ingest; defaults to the configured one.
        #[arg(long, value_name = "PATH")]
        pdf_dir: Option<PathBuf>,
        /// Empty the collection first.
        #[arg(long)]
        rebuild: bool,
    },
    /// Show index size, dimension and embedding model.
    Stats,
    /// Print the chunks retrieved for a question, without asking the model.
    Query {
        question: String,
        #[arg(short, long)]
        k: Option<usize>,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Ask one question and print the answer.
    Ask {
        question: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Interactive tutoring session. `/reset`, `/sources`, `/quit`.
    Chat {
        #[arg(short, long)]
        k: Option<usize>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config(),
    };

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            println!("MathBot backend");
            println!("  core: {}", status());
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => eprintln!("Could not determine app data directory."),
        },
        Commands::Config { pdf_dir } => match pdf_dir {
            Some(dir) => {
                let dir = set_pdf_dir(&dir, cli.config.as_deref())?;
                println!("PDF folder set to {}", dir.display());
            }
            None => print!("{}", config.to_toml()?),
        },
        Commands::Scan { path } => scan(&path)?,
        Commands::Ingest { pdf_dir, rebuild } => {
            let dir = pdf_dir.unwrap_or_else(|| PathBuf::from(&config.pdf_dir));
            ingest(&config, &dir, rebuild).await?;
        }
        Commands::Stats => {
            let services = Services::from_config(&config)?;
            let s = services.store.stats()?;
            println!("Collection: {}", s.collection);
            if let Some(path) = services.store.path() {
                println!("  index:      {}", path.display());
            }
            println!("  chunks:     {}", s.chunks);
            println!("  sources:    {}", s.sources);
            println!(
                "  dimensions: {}",
                s.dimensions.map_or("-".to_string(), |d| d.to_string())
            );
            println!("  model:      {}", s.model.as_deref().unwrap_or("-"));
        }
        Commands::Query { question, k, json } => {
            let services = Services::from_config(&config)?;
            let k = k.unwrap_or(services.top_k);
            let hits = services.retriever().retrieve(&question, k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                println!("Total chunks: {}", services.store.count()?);
                print_sources(&mut io::stdout(), &hits)?;
            }
        }
        Commands::Ask { question, k } => {
            let services = Services::from_config(&config)?;
            let mut session = services.session(k.unwrap_or(services.top_k));
            let outcome = session.ask(&question).await?;
            print_outcome(&mut io::stdout(), &mut io::stderr(), &outcome)?;
        }
        Commands::Chat { k } => {
            let services = Services::from_config(&config)?;
            let mut session = services.session(k.unwrap_or(services.top_k));
            let stdin = io::stdin();
            chat_loop(&mut session, stdin.lock(), &mut io::stdout(), &mut io::stderr()).await?;
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "mathbot=debug,mathbot_core=debug"
    } else {
        "mathbot=info,mathbot_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn scan(path: &Path) -> Result<()> {
    let pdfs = scan_pdfs(path)?;
    println!("{} PDF(s) in {}", pdfs.len(), path.display());
    for pdf in &pdfs {
        let name = pdf.file_name().unwrap_or_default().to_string_lossy();
        match page_count(pdf) {
            Ok(n) => println!("  {name} ({n} pages)"),
            Err(e) => println!("  {name} (unreadable: {e})"),
        }
    }
    Ok(())
}

async fn ingest(config: &Config, dir: &Path, rebuild: bool) -> Result<()> {
    let mut services = Services::from_config(config)?;
    if rebuild {
        services.store.clear()?;
        tracing::info!(collection = services.store.collection(), "collection cleared");
    }
    let report = services
        .ingest(dir)
        .await
        .with_context(|| format!("ingesting {}", dir.display()))?;

    println!(
        "Ingestion complete: {} file(s), {} chunk(s) indexed.",
        report.ingested_files(),
        report.total_chunks()
    );
    for file in report.failed() {
        if let FileOutcome::Failed { reason } = &file.outcome {
            println!("  failed: {} ({reason})", file.source);
        }
    }
    Ok(())
}

fn print_outcome(
    out: &mut impl Write,
    err: &mut impl Write,
    outcome: &AskOutcome,
) -> io::Result<()> {
    match outcome {
        AskOutcome::EmptyQuestion => writeln!(err, "{EMPTY_QUESTION}"),
        AskOutcome::NoContext => writeln!(out, "{NO_CONTEXT}"),
        AskOutcome::RetrievalFailed { reason } => {
            writeln!(out, "{NO_CONTEXT}")?;
            writeln!(err, "retrieval failed: {reason}")
        }
        AskOutcome::Answered { answer } => writeln!(out, "{}", render_answer(answer)),
    }
}

fn print_sources(out: &mut impl Write, hits: &[RetrievedChunk]) -> io::Result<()> {
    if hits.is_empty() {
        return writeln!(out, "{NO_CONTEXT}");
    }
    for (i, hit) in hits.iter().enumerate() {
        writeln!(
            out,
            "Source {} ({}, chunk {}, page {}) distance {:.3}",
            i + 1,
            hit.metadata.source,
            hit.metadata.chunk_index,
            hit.metadata.page,
            hit.distance
        )?;
        writeln!(out, "{}\n", preview(&hit.document, PREVIEW_CHARS))?;
    }
    Ok(())
}

/// One line typed into the chat loop.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Quit,
    Reset,
    Sources,
    Question(&'a str),
}

fn parse_input(line: &str) -> ChatInput<'_> {
    match line.trim() {
        "/quit" | "/exit" => ChatInput::Quit,
        "/reset" => ChatInput::Reset,
        "/sources" => ChatInput::Sources,
        question => ChatInput::Question(question),
    }
}

async fn chat_loop(
    session: &mut ChatSession<'_>,
    input: impl BufRead,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<()> {
    writeln!(out, "MathBot: your AI math tutor. Commands: /reset, /sources, /quit")?;
    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        match parse_input(&line) {
            ChatInput::Quit => break,
            ChatInput::Reset => {
                session.reset();
                writeln!(out, "Conversation cleared.")?;
            }
            ChatInput::Sources => print_sources(out, session.last_retrieved())?,
            ChatInput::Question(question) => match session.ask(question).await {
                Ok(outcome) => print_outcome(out, err, &outcome)?,
                Err(e) => writeln!(err, "error: {e}")?,
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use mathbot_core::{
        Chunk, ChatModel, Embedder, HashEmbedder, LlmError, Message, Retriever, VectorStore,
    };

    use super::*;

    struct FixedModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for FixedModel {
        fn model_id(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("It is $2x$.".to_string())
        }
    }

    async fn calculus_store(embedder: &HashEmbedder) -> VectorStore {
        let text = "The derivative of x^2 is 2x.";
        let chunk = Chunk {
            id: "calculus.pdf___0".into(),
            text: text.into(),
            source: "calculus.pdf".into(),
            chunk_index: 0,
            page: 1,
        };
        let embeddings = embedder.embed_batch(&[text.to_string()]).await.unwrap();
        let mut store = VectorStore::open_in_memory("math_books").unwrap();
        store
            .replace_source("calculus.pdf", &[chunk], &embeddings, embedder.model_id())
            .unwrap();
        store
    }

    fn text(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn empty_question_warns_on_stderr_only() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        print_outcome(&mut out, &mut err, &AskOutcome::EmptyQuestion).unwrap();
        assert!(out.is_empty());
        assert_eq!(text(err), format!("{EMPTY_QUESTION}\n"));
    }

    #[test]
    fn retrieval_failure_shows_no_context_and_reason() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let outcome = AskOutcome::RetrievalFailed {
            reason: "dimension mismatch".into(),
        };
        print_outcome(&mut out, &mut err, &outcome).unwrap();
        assert_eq!(text(out), format!("{NO_CONTEXT}\n"));
        assert!(text(err).contains("dimension mismatch"));
    }

    #[test]
    fn answers_are_rendered() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let outcome = AskOutcome::Answered {
            answer: "It is $2x$.".into(),
        };
        print_outcome(&mut out, &mut err, &outcome).unwrap();
        assert_eq!(text(out), "It is ⟨2x⟩.\n");
        assert!(err.is_empty());
    }

    #[test]
    fn no_sources_prints_no_context() {
        let mut out = Vec::new();
        print_sources(&mut out, &[]).unwrap();
        assert_eq!(text(out), format!("{NO_CONTEXT}\n"));
    }

    #[test]
    fn parses_chat_commands() {
        assert_eq!(parse_input(" /quit "), ChatInput::Quit);
        assert_eq!(parse_input("/exit"), ChatInput::Quit);
        assert_eq!(parse_input("/reset"), ChatInput::Reset);
        assert_eq!(parse_input("/sources"), ChatInput::Sources);
        assert_eq!(parse_input("  what is pi? "), ChatInput::Question("what is pi?"));
        assert_eq!(parse_input("   "), ChatInput::Question(""));
    }

    #[tokio::test]
    async fn chat_loop_dispatches_commands() {
        let embedder = HashEmbedder::new(4096);
        let store = calculus_store(&embedder).await;
        let model = FixedModel {
            calls: AtomicUsize::new(0),
        };
        let mut session = ChatSession::new(Retriever::new(&embedder, &store), &model, 3);

        let input = "   \nWhat is the derivative of x^2?\n/sources\n/reset\n/quit\nnot read\n";
        let (mut out, mut err) = (Vec::new(), Vec::new());
        chat_loop(&mut session, input.as_bytes(), &mut out, &mut err)
            .await
            .unwrap();

        let out = text(out);
        let err = text(err);
        assert!(err.contains(EMPTY_QUESTION), "{err}");
        assert!(out.contains("It is ⟨2x⟩."), "{out}");
        assert!(
            out.contains("Source 1 (calculus.pdf, chunk 0, page 1) distance"),
            "{out}"
        );
        assert!(out.contains("The derivative of x^2 is 2x."), "{out}");
        assert!(out.contains("Conversation cleared."), "{out}");
        assert_eq!(session.conversation().messages().len(), 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }
}
