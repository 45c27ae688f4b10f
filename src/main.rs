// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use playscribe::app_config::{self, Config, TranslationProvider, WireFormat};
use playscribe::checkpoint::{CheckpointStore, checkpoint_path};
use playscribe::errors::{AppError, PipelineError};
use playscribe::file_utils::FileManager;
use playscribe::language_utils::{EnvLocale, default_preferences, language_name, parse_language_list};
use playscribe::media::{MediaOptions, YtDlpSource};
use playscribe::pipeline::{MediaSource, OrchestratorOptions, PipelineOrchestrator};
use playscribe::providers::{SpeechToText, create_text_generator, openai::OpenAI};
use playscribe::subtitle_processor::SubtitleTrack;
use playscribe::summary::{ConsolidationFormat, StudyMaterialOptions, SummaryGenerator, generate_study_material};
use playscribe::transcription::Transcriber;
use playscribe::translation::{BatchOptions, BatchTranslator};

// @const: Conventional exit status after SIGINT
const INTERRUPTED_EXIT: u8 = 130;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for WireFormat to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliWireFormat {
    Json,
    #[value(alias = "csv")]
    Tabular,
}

impl From<CliWireFormat> for WireFormat {
    fn from(cli_format: CliWireFormat) -> Self {
        match cli_format {
            CliWireFormat::Json => WireFormat::Json,
            CliWireFormat::Tabular => WireFormat::Tabular,
        }
    }
}

/// CLI Wrapper for ConsolidationFormat to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliConsolidationFormat {
    Markdown,
    Json,
}

impl From<CliConsolidationFormat> for ConsolidationFormat {
    fn from(cli_format: CliConsolidationFormat) -> Self {
        match cli_format {
            CliConsolidationFormat::Markdown => ConsolidationFormat::Markdown,
            CliConsolidationFormat::Json => ConsolidationFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download a playlist and produce subtitles for every item, resuming from the checkpoint
    Run(RunArgs),

    /// Translate an SRT file with an AI provider
    Translate(TranslateArgs),

    /// Transcribe an audio file into an SRT file
    Transcribe(TranscribeArgs),

    /// Consolidate a directory of subtitles and generate study material
    Summarize(SummarizeArgs),

    /// Inspect or reset the checkpoint of a source
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// Rename downloaded files from ids to "<index>. <title>" using a checkpoint
    Rename {
        /// Checkpoint file to read titles from
        #[arg(value_name = "CHECKPOINT")]
        checkpoint: PathBuf,

        /// Directories containing files named after item ids
        #[arg(value_name = "DIR", required = true)]
        dirs: Vec<PathBuf>,

        /// Only print what would be renamed
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completions for playscribe
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum CheckpointAction {
    /// Print the job and item table
    Show {
        /// Playlist or video URL
        source: String,
    },
    /// Delete the checkpoint file
    Clear {
        /// Playlist or video URL
        source: String,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Playlist or video URL
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Subtitle language preferences, most wanted first (e.g. "pt-BR,en")
    #[arg(long)]
    languages: Option<String>,

    /// Do not read or write a checkpoint
    #[arg(long)]
    no_checkpoint: bool,

    /// Start over, discarding any existing checkpoint
    #[arg(long, conflicts_with = "no_checkpoint")]
    clear_checkpoint: bool,

    /// Seconds to wait between processed items
    #[arg(long)]
    delay: Option<u64>,

    /// Record items without subtitles instead of transcribing them
    #[arg(long)]
    skip_transcription: bool,

    /// List the items and their subtitles without downloading
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input SRT file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Target language code (e.g. 'en', 'pt-BR')
    #[arg(short, long)]
    target: String,

    /// Output file; defaults to "<input stem>.<target>.srt"
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Structured exchange format
    #[arg(long, value_enum)]
    format: Option<CliWireFormat>,

    /// Subtitle lines per request
    #[arg(long)]
    batch_size: Option<usize>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Print the first request instead of calling the provider
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser, Debug)]
struct TranscribeArgs {
    /// Audio or video file
    #[arg(value_name = "AUDIO")]
    audio: PathBuf,

    /// Spoken language hint
    #[arg(short, long)]
    language: Option<String>,

    /// Output file; defaults to "<input stem>.whisper.srt"
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Empty the transcript cache before starting
    #[arg(long)]
    clear_cache: bool,
}

#[derive(Parser, Debug)]
struct SummarizeArgs {
    /// Directory with "<index>. <title>.<lang>.srt" files
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// Output file for the study material
    #[arg(short, long, default_value = "study_material.md")]
    output: PathBuf,

    /// Language of the generated material
    #[arg(short, long)]
    language: Option<String>,

    /// Format of the consolidated document
    #[arg(long, value_enum, default_value = "markdown")]
    format: CliConsolidationFormat,

    /// Only consolidate subtitles in these languages, most wanted first
    #[arg(long)]
    languages: Option<String>,

    /// Write the consolidated document and stop
    #[arg(long)]
    skip_remote: bool,
}

/// Playscribe - playlist subtitles, transcription and study material
#[derive(Parser, Debug)]
#[command(name = "playscribe")]
#[command(version)]
#[command(about = "Resumable playlist subtitle pipeline")]
#[command(long_about = "Playscribe downloads a playlist, picks the best matching subtitles for each
item, transcribes the ones without subtitles and can translate subtitles or
turn the whole playlist into study material.

EXAMPLES:
    playscribe run https://www.youtube.com/playlist?list=PL123
    playscribe run --languages pt-BR,en --delay 5 <URL>
    playscribe run --clear-checkpoint <URL>         # Start over
    playscribe translate lecture.srt -t es --format tabular
    playscribe transcribe talk.mp3 -l en
    playscribe summarize downloads/ -o notes.md
    playscribe checkpoint show <URL>
    playscribe rename .checkpoint_abc.json downloads/ --dry-run
    playscribe completions bash > playscribe.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created. API keys may also come from OPENAI_API_KEY and
    ANTHROPIC_API_KEY.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config: PathBuf,

    /// Set logging level
    #[arg(long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Root output directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// OpenAI API key
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Anthropic API key
    #[arg(long, global = true, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: Option<String>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and marker for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "✗"),
            Level::Warn => ("\x1B[1;33m", "!"),
            Level::Info => ("\x1B[1;32m", " "),
            Level::Debug => ("\x1B[1;36m", "·"),
            Level::Trace => ("\x1B[1;35m", "»"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, marker) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {} {}\x1B[0m",
                color,
                now,
                marker,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // The configured level is applied with set_max_level once the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "playscribe", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config(&cli)?;

    let work = dispatch(cli.command, config);
    tokio::select! {
        result = work => result,
        _ = tokio::signal::ctrl_c() => {
            // Dropping the work future removes any temporary chunk directory
            warn!("{}; progress so far is kept in the checkpoint", AppError::from(PipelineError::Interrupted));
            Ok(ExitCode::from(INTERRUPTED_EXIT))
        }
    }
}

fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config)?;

    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    if let Some(output_dir) = &cli.output_dir {
        config.output_dir = output_dir.clone();
    }
    if let Some(key) = &cli.openai_api_key {
        config.translation.set_api_key_if_empty(TranslationProvider::OpenAI, key);
    }
    if let Some(key) = &cli.anthropic_api_key {
        config.translation.set_api_key_if_empty(TranslationProvider::Anthropic, key);
    }

    Ok(config)
}

async fn dispatch(command: Commands, config: Config) -> Result<ExitCode> {
    match command {
        Commands::Run(args) => run_pipeline(args, config).await,
        Commands::Translate(args) => run_translate(args, config).await.map(|_| ExitCode::SUCCESS),
        Commands::Transcribe(args) => run_transcribe(args, config).await.map(|_| ExitCode::SUCCESS),
        Commands::Summarize(args) => run_summarize(args, config).await.map(|_| ExitCode::SUCCESS),
        Commands::Checkpoint { action } => run_checkpoint(action, &config).map(|_| ExitCode::SUCCESS),
        Commands::Rename {
            checkpoint,
            dirs,
            dry_run,
        } => run_rename(&checkpoint, &dirs, dry_run).map(|_| ExitCode::SUCCESS),
        Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn build_transcriber(config: &Config) -> Transcriber {
    let provider = config.transcription_provider();
    let stt: Arc<dyn SpeechToText> = Arc::new(
        OpenAI::new(&provider.api_key, &provider.endpoint, &provider.model, provider.timeout_secs)
            .with_transcription_model(config.transcription.model.clone()),
    );
    Transcriber::new(stt, &config.transcription, std::env::temp_dir())
}

async fn run_pipeline(args: RunArgs, mut config: Config) -> Result<ExitCode> {
    if let Some(languages) = &args.languages {
        config.languages.subtitle_preferences = languages.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(delay) = args.delay {
        config.pipeline.inter_item_delay_secs = delay;
    }
    config.pipeline.enable_checkpoint &= !args.no_checkpoint;
    config.pipeline.skip_transcription |= args.skip_transcription;
    config.validate().context("Configuration validation failed")?;

    let mut options = OrchestratorOptions::from_config(&config);
    if config.languages.subtitle_preferences.is_empty() {
        options.preferences = default_preferences(&EnvLocale);
    }
    options.clear_checkpoint = args.clear_checkpoint;
    options.show_progress = true;

    let source = Arc::new(YtDlpSource::new(MediaOptions {
        audio_only: config.pipeline.audio_only,
        keep_original: config.pipeline.keep_original_audio,
        ..MediaOptions::default()
    }));

    if args.dry_run {
        let items = source.enumerate(&args.source).await?;
        for item in &items {
            let chosen = item
                .subtitles
                .select_preferred(&options.preferences)
                .map(|s| format!("{} ({:?})", s.reported, s.origin))
                .unwrap_or_else(|| "transcribe".to_string());
            println!("{:>3}. {} [{}] -> {}", item.index, item.title, item.id, chosen);
        }
        return Ok(ExitCode::SUCCESS);
    }

    if !config.pipeline.skip_transcription && config.transcription_provider().api_key.is_empty() {
        warn!("No OpenAI API key configured; items without subtitles will fail to transcribe");
    }

    let orchestrator = PipelineOrchestrator::new(source, Arc::new(build_transcriber(&config)), options);
    let report = orchestrator.run(&args.source).await?;
    for (id, message) in &report.failures {
        error!("{}: {}", id, message);
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_translate(args: TranslateArgs, mut config: Config) -> Result<()> {
    if let Some(provider) = args.provider {
        config.translation.provider = provider.into();
    }
    if let Some(model) = &args.model {
        config.translation.set_model(model);
    }
    if let Some(format) = args.format {
        config.translation.common.wire_format = format.into();
    }
    if let Some(batch_size) = args.batch_size {
        config.translation.common.batch_size = batch_size;
    }
    config.validate().context("Configuration validation failed")?;
    info!(
        "Translating with {} ({})",
        config.translation.provider.display_name(),
        config.translation.get_model()
    );

    let target = language_name(&args.target).unwrap_or_else(|_| args.target.clone());
    let track = SubtitleTrack::read_from_file(&args.input)?;
    if track.is_empty() {
        return Err(anyhow!("No subtitles found in {}", args.input.display()));
    }

    let options = BatchOptions::from_config(&config.translation).show_progress(true);
    let translator = BatchTranslator::new(create_text_generator(&config.translation), options);

    if args.dry_run {
        let first = track.batches(translator.options().batch_size).next().unwrap_or(&[]);
        let request = translator.build_request(first, &target)?;
        println!("--- system ---\n{}\n--- user ---\n{}", request.system, request.user);
        return Ok(());
    }
    config.validate_remote()?;

    let translated = translator.translate_track(&track, &target).await?;
    let output = args
        .output
        .unwrap_or_else(|| default_translation_path(&args.input, &args.target));
    translated.track.write_to_file(&output)?;
    info!("Translated subtitles saved: {}", output.display());
    Ok(())
}

fn default_translation_path(input: &Path, target: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "subtitles".to_string());
    input.with_file_name(format!("{}.{}.srt", stem, target))
}

async fn run_transcribe(args: TranscribeArgs, config: Config) -> Result<()> {
    if !FileManager::file_exists(&args.audio) {
        return Err(anyhow!("Input file not found: {}", args.audio.display()));
    }
    if config.transcription_provider().api_key.is_empty() {
        return Err(anyhow!("An OpenAI API key is required for transcription"));
    }

    let transcriber = build_transcriber(&config);
    if args.clear_cache {
        if let Some(cache) = transcriber.cache() {
            let removed = cache.clear()?;
            info!("Removed {} cached transcript(s)", removed);
        }
    }

    let language = args.language.or(config.languages.transcription_language.clone());
    let track = transcriber.transcribe_file(&args.audio, language.as_deref()).await?;
    let output = args
        .output
        .unwrap_or_else(|| args.audio.with_extension("whisper.srt"));
    track.write_to_file(&output)?;
    info!("Transcript saved: {} ({} lines)", output.display(), track.len());
    Ok(())
}

async fn run_summarize(args: SummarizeArgs, config: Config) -> Result<()> {
    if !FileManager::dir_exists(&args.dir) {
        return Err(anyhow!("Directory not found: {}", args.dir.display()));
    }

    let options = StudyMaterialOptions {
        language: args.language.unwrap_or_else(|| config.languages.summary_language.clone()),
        format: args.format.into(),
        preferences: args.languages.as_deref().map(parse_language_list),
        skip_remote: args.skip_remote,
    };

    let generator = if options.skip_remote {
        None
    } else {
        config.validate_remote()?;
        Some(SummaryGenerator::new(
            create_text_generator(&config.translation),
            config.summary.clone(),
        ))
    };

    let written = generate_study_material(&args.dir, &args.output, &options, generator.as_ref()).await?;
    println!("{}", written.display());
    Ok(())
}

fn run_checkpoint(action: CheckpointAction, config: &Config) -> Result<()> {
    match action {
        CheckpointAction::Show { source } => {
            let store = CheckpointStore::for_source(&config.output_dir, &source);
            let Some(job) = store.job() else {
                println!("No checkpoint at {}", store.path().display());
                return Ok(());
            };
            println!("Job:     {}", job.job_id);
            println!("Source:  {}", job.source_reference);
            println!("Created: {}", job.created_at);
            println!("Updated: {}", job.last_updated);
            let summary = store.summary();
            println!("Status:  {} ({:.1}% complete)", summary, summary.completion_percentage());
            for item in store.items() {
                let detail = item.error.as_deref().unwrap_or_default();
                println!("{:>3}. {:<10} {} {}", item.index, item.status.to_string(), item.title, detail);
            }
        }
        CheckpointAction::Clear { source } => {
            let path = checkpoint_path(&config.output_dir, &source);
            if FileManager::file_exists(&path) {
                CheckpointStore::open(&path).clear();
                info!("Checkpoint removed: {}", path.display());
            } else {
                info!("No checkpoint at {}", path.display());
            }
        }
    }
    Ok(())
}

fn run_rename(checkpoint: &Path, dirs: &[PathBuf], dry_run: bool) -> Result<()> {
    if !FileManager::file_exists(checkpoint) {
        return Err(anyhow!("Checkpoint file not found: {}", checkpoint.display()));
    }
    let store = CheckpointStore::open(checkpoint);
    let mapping = store.rename_map();
    if mapping.is_empty() {
        return Err(anyhow!("Checkpoint has no items: {}", checkpoint.display()));
    }

    let renamed = FileManager::rename_from_mapping(dirs, &mapping, dry_run)?;
    if dry_run {
        info!("{} file(s) would be renamed", renamed);
    } else {
        info!("{} file(s) renamed", renamed);
    }
    Ok(())
}
