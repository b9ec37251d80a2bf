use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{self, filter::EnvFilter};

use refactorizer::{
    AvailableRefactoring, Phase, Point, RefactorRequest, RefactorState, RefactorStore,
    RenameRequest, StateStream,
    config::StoreConfig,
    editor::{EditorSession, InMemoryWorkspace, TextBuffer},
    errors::RefactorError,
    provider::{ProviderRegistry, RefactorProvider},
    word_rename::WordRenameProvider,
};
use tokio::sync::broadcast;

/// Refactorizer - run editor refactorings from the command line
#[derive(Parser, Debug)]
#[command(name = "refactorizer")]
#[command(about = "Drive a refactor session against a file")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(
        long = "config",
        help = "Configuration file (default: ~/.refactorizer/config.yaml)",
        value_name = "PATH"
    )]
    config: Option<PathBuf>,

    /// Grammar scope of the file
    #[arg(long = "scope", default_value = "text.plain")]
    scope: String,

    /// Seconds to wait for a provider before closing the session
    #[arg(long = "timeout-secs", default_value = "30")]
    timeout_secs: u64,

    /// Print every state transition as a JSON line
    #[arg(long = "json")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List refactorings available at a position
    List {
        #[arg(long = "file", value_name = "PATH")]
        file: PathBuf,
        /// 1-based line
        #[arg(long = "line")]
        line: usize,
        /// 1-based column
        #[arg(long = "column")]
        column: usize,
    },
    /// Rename the symbol at a position
    Rename {
        #[arg(long = "file", value_name = "PATH")]
        file: PathBuf,
        /// 1-based line
        #[arg(long = "line")]
        line: usize,
        /// 1-based column
        #[arg(long = "column")]
        column: usize,
        #[arg(long = "new-name")]
        new_name: String,
        /// Show the result without writing the file
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
}

/// A running session against one file.
struct Session {
    store: RefactorStore,
    states: StateStream,
    errors: broadcast::Receiver<RefactorError>,
    buffer: Arc<TextBuffer>,
    provider: Arc<dyn RefactorProvider>,
    timeout: Duration,
    json: bool,
}

impl Session {
    fn start(args: &Args, config: StoreConfig, file: &Path, line: usize, column: usize) -> Result<Self> {
        if line == 0 || column == 0 {
            bail!("line and column are 1-based");
        }
        let buffer = Arc::new(TextBuffer::load(file, args.scope.clone())?);
        buffer.set_cursor(Point::new(line - 1, column - 1));

        let workspace = Arc::new(InMemoryWorkspace::new());
        workspace.open(buffer.clone());

        let provider: Arc<dyn RefactorProvider> = Arc::new(WordRenameProvider::new(
            config.word_rename_scopes.clone(),
            config.word_rename_priority,
        ));
        let registry = ProviderRegistry::new();
        registry.add_provider(provider.clone());

        let store = RefactorStore::with_config(registry, workspace, config);
        let states = store.subscribe();
        let errors = store.errors();
        Ok(Self {
            store,
            states,
            errors,
            buffer,
            provider,
            timeout: Duration::from_secs(args.timeout_secs),
            json: args.json,
        })
    }

    /// Next state that is `Closed` or satisfies `predicate`.
    async fn wait_for(&mut self, predicate: impl Fn(&RefactorState) -> bool) -> Result<RefactorState> {
        let json = self.json;
        let next = self.states.wait_for(|state| {
            if json {
                if let Ok(line) = serde_json::to_string(state) {
                    println!("{line}");
                }
            }
            state.is_closed() || predicate(state)
        });
        match tokio::time::timeout(self.timeout, next).await {
            Ok(Some(state)) => Ok(state),
            Ok(None) => bail!("refactor store stopped unexpectedly"),
            Err(_) => {
                self.store.close();
                bail!("timed out after {:?} waiting for the provider", self.timeout)
            }
        }
    }

    /// Open the session and wait for the candidate list.
    async fn candidates(&mut self) -> Result<Vec<AvailableRefactoring>> {
        // Skip the initial closed state.
        self.states.next().await;
        self.store.open();
        match self.wait_for(|s| matches!(s.phase(), Some(Phase::Pick { .. }))).await? {
            RefactorState::Open(Phase::Pick { available_refactorings }) => Ok(available_refactorings),
            _ => {
                self.fail_on_errors()?;
                Ok(vec![])
            }
        }
    }

    fn fail_on_errors(&mut self) -> Result<()> {
        if let Ok(err) = self.errors.try_recv() {
            return Err(err).context("refactoring failed");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config_path = args.config.clone().unwrap_or_else(StoreConfig::default_path);
    let config = StoreConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    tracing::info!("Using config: {:?}", config);

    match &args.command {
        Command::List { file, line, column } => {
            let mut session = Session::start(&args, config, file, *line, *column)?;
            let candidates = session.candidates().await?;
            session.store.close();
            if candidates.is_empty() {
                println!("No refactorings available at {line}:{column}");
            }
            for candidate in candidates {
                match &candidate {
                    AvailableRefactoring::Rename { symbol_at_point } => println!(
                        "{} '{}' at {}",
                        candidate.kind(),
                        symbol_at_point.text,
                        symbol_at_point.range.start
                    ),
                }
            }
        }
        Command::Rename {
            file,
            line,
            column,
            new_name,
            dry_run,
        } => {
            let mut session = Session::start(&args, config, file, *line, *column)?;
            let candidates = session.candidates().await?;
            let Some(AvailableRefactoring::Rename { symbol_at_point }) = candidates.into_iter().next()
            else {
                bail!("nothing to rename at {line}:{column}");
            };

            session.store.picked_refactor(AvailableRefactoring::Rename {
                symbol_at_point: symbol_at_point.clone(),
            });
            session
                .wait_for(|s| matches!(s.phase(), Some(Phase::Rename { .. })))
                .await?;

            let provider = session.provider.clone();
            let before = session.buffer.text();
            session.store.execute(
                provider,
                RefactorRequest::Rename(RenameRequest {
                    symbol_at_point,
                    new_name: new_name.clone(),
                }),
            );
            session.wait_for(|_| false).await?;
            session.store.wait_idle().await;
            session.fail_on_errors()?;

            let after = session.buffer.text();
            let changed = before
                .lines()
                .zip(after.lines())
                .filter(|(old, new)| old != new)
                .count();
            if *dry_run {
                print!("{after}");
            } else if changed > 0 {
                session.buffer.save()?;
            }
            eprintln!("{changed} lines changed in {}", file.display());
        }
    }
    Ok(())
}
