use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use novel_core::{
    chapters::{ChapterIndexer, IndexerConfig},
    position::page_for_chapter,
    session::SessionOptions,
    state::{load_settings, save_settings, JsonFileStore},
    types::{DisplaySettings, RgbColor, Viewport},
    MonospaceMeasure, ReadingSession, SessionEvent, SessionState,
};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod config;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "novel", version, about = "Plain-text novel reader")]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Key-value state file (positions and display settings).
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[arg(long, global = true)]
    width: Option<u32>,

    #[arg(long, global = true)]
    height: Option<u32>,

    #[arg(long, global = true)]
    density: Option<f32>,

    /// Print pages with the saved text and background colors.
    #[arg(long, global = true)]
    color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current page of a novel, optionally moving first.
    Read {
        file: PathBuf,
        /// 1-based page number.
        #[arg(long, conflicts_with_all = ["chapter", "next", "prev"])]
        page: Option<usize>,
        /// Chapter index as listed by `chapters`.
        #[arg(long, conflicts_with_all = ["next", "prev"])]
        chapter: Option<usize>,
        #[arg(long, conflicts_with = "prev")]
        next: bool,
        #[arg(long)]
        prev: bool,
    },
    /// List the table of contents with starting pages.
    Chapters { file: PathBuf },
    /// Show or change the display settings shared by all files.
    Settings {
        #[arg(long)]
        font_size: Option<i64>,
        /// `RRGGBB`, with or without a leading `#`.
        #[arg(long)]
        text_color: Option<String>,
        #[arg(long)]
        bg_color: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = match AppConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&cfg.log_level);

    match run(cli, cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli, cfg: AppConfig) -> Result<()> {
    let store = open_store(cli.state.clone(), &cfg)?;
    debug!(state = %store.path().display(), "using state file");

    match cli.command {
        Command::Read {
            ref file,
            page,
            chapter,
            next,
            prev,
        } => {
            let mut session = open_session(file, &cli, &cfg, store)?;
            let event = if let Some(page) = page {
                Some(SessionEvent::PageChanged(page.saturating_sub(1)))
            } else if let Some(chapter) = chapter {
                Some(SessionEvent::ChapterJumpRequested(chapter))
            } else if next {
                Some(SessionEvent::PageChanged(session.current_page_index() + 1))
            } else if prev {
                Some(SessionEvent::PageChanged(
                    session.current_page_index().saturating_sub(1),
                ))
            } else {
                None
            };
            if let Some(event) = event {
                session.handle(event);
            }
            print_page(&session, cli.color);
            session.close();
        }
        Command::Chapters { ref file } => {
            let session = open_session(file, &cli, &cfg, store)?;
            let toc = session.toc();
            if toc.is_empty() {
                println!("(no chapters)");
            }
            for (index, chapter) in toc {
                let page = page_for_chapter(session.pages(), chapter) + 1;
                println!("{index:>4}  {:<40} p.{page}", chapter.title);
            }
            session.close();
        }
        Command::Settings {
            font_size,
            text_color,
            bg_color,
        } => {
            let mut settings = load_settings(&store);
            let changed = font_size.is_some() || text_color.is_some() || bg_color.is_some();
            if let Some(size) = font_size {
                settings = settings.with_font_size(size);
            }
            if let Some(raw) = text_color {
                settings.text_color = parse_color(&raw)?;
            }
            if let Some(raw) = bg_color {
                settings.background_color = parse_color(&raw)?;
            }
            if changed {
                save_settings(&store, &settings);
            }
            print_settings(&settings);
        }
    }
    Ok(())
}

fn open_store(flag: Option<PathBuf>, cfg: &AppConfig) -> Result<JsonFileStore> {
    match flag.or_else(|| cfg.state_path.clone()) {
        Some(path) => Ok(JsonFileStore::new(path)),
        None => JsonFileStore::open_default().context("locating state file"),
    }
}

fn open_session(
    file: &std::path::Path,
    cli: &Cli,
    cfg: &AppConfig,
    store: JsonFileStore,
) -> Result<ReadingSession<MonospaceMeasure, JsonFileStore>> {
    let mut indexer_config = IndexerConfig::default();
    if let Some(pattern) = &cfg.heading_pattern {
        indexer_config.heading_pattern = pattern.clone();
    }
    let indexer = ChapterIndexer::new(indexer_config).context("compiling heading pattern")?;

    let options = SessionOptions {
        viewport: Viewport::new(
            cli.width.unwrap_or(cfg.viewport_width),
            cli.height.unwrap_or(cfg.viewport_height),
        ),
        density: cli.density.unwrap_or(cfg.density),
        indexer: indexer.into(),
        ..SessionOptions::default()
    };

    let mut session = ReadingSession::open(file, MonospaceMeasure, store, options);
    let timeout = Duration::from_secs(cfg.load_timeout_secs);
    let failure = match session.wait(timeout) {
        SessionState::Ready => None,
        SessionState::Loading => bail!(
            "timed out after {}s loading {}",
            cfg.load_timeout_secs,
            file.display()
        ),
        SessionState::LoadFailed(err) => Some((err.user_message(), err.to_string())),
    };
    match failure {
        None => Ok(session),
        Some((message, detail)) => {
            eprintln!("{message}");
            session.acknowledge_failure();
            Err(anyhow!(detail).context(format!("opening {}", file.display())))
        }
    }
}

fn print_page(session: &ReadingSession<MonospaceMeasure, JsonFileStore>, color: bool) {
    if let Some(chapter) = session.current_chapter() {
        println!("== {} ==", chapter.title);
    }
    let text = session.current_page().map_or("", |p| p.text.as_str());
    if color {
        let s = session.settings();
        let (fg, bg) = (s.text_color, s.background_color);
        print!(
            "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m{text}\x1b[0m",
            fg.r, fg.g, fg.b, bg.r, bg.g, bg.b
        );
    } else {
        print!("{text}");
    }
    if !text.ends_with('\n') {
        println!();
    }
    println!("-- {} --", session.progress_label());
}

fn print_settings(settings: &DisplaySettings) {
    println!("font size:  {}pt", settings.font_size_pt);
    println!("text color: {}", settings.text_color.to_hex());
    println!("background: {}", settings.background_color.to_hex());
}

fn parse_color(raw: &str) -> Result<RgbColor> {
    match RgbColor::parse_hex(raw) {
        Some(color) => Ok(color),
        None => bail!("invalid color {raw:?}, expected RRGGBB"),
    }
}
