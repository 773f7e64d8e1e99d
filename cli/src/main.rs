//! bifold CLI - bilingual document formatter

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use bifold::{
    AlignMethod, Bifold, CleanupPreset, FormatConfig, ImagePlacement, ImageQuality, InputFile,
    JobStage, JsonFormat, Language, LayoutMode, Margins, OutputFormat, PageSize,
};

#[derive(Parser)]
#[command(name = "bifold")]
#[command(version)]
#[command(about = "Align two documents and lay them out as one bilingual document", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce a bilingual document from two inputs
    Format {
        /// First-language document
        #[arg(value_name = "FILE1")]
        first: PathBuf,

        /// Second-language document
        #[arg(value_name = "FILE2")]
        second: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "docx")]
        to: Target,

        /// Output file (defaults to bilingual_output.<ext>)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// JSON configuration file; flags below override it
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Text cleanup preset
        #[arg(long, value_enum)]
        cleanup: Option<CleanupLevel>,

        /// Skip unreadable parts of the inputs
        #[arg(long)]
        lenient: bool,

        /// Give up after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Show the first aligned pairs
    Preview {
        #[arg(value_name = "FILE1")]
        first: PathBuf,

        #[arg(value_name = "FILE2")]
        second: PathBuf,

        /// Number of pairs to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Align two documents and print the alignment as JSON
    Align {
        #[arg(value_name = "FILE1")]
        first: PathBuf,

        #[arg(value_name = "FILE2")]
        second: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Show document information
    Info {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(clap::Args)]
struct LayoutArgs {
    /// Layout of aligned pairs
    #[arg(long, value_enum)]
    layout: Option<Layout>,

    /// Language shown first (1 or 2)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    primary: Option<u8>,

    /// Font for the first language
    #[arg(long)]
    font1: Option<String>,

    /// Font for the second language
    #[arg(long)]
    font2: Option<String>,

    /// Base font size in points
    #[arg(long)]
    font_size: Option<f32>,

    /// Uniform page margin in centimetres
    #[arg(long, value_name = "CM")]
    margin: Option<f32>,

    #[arg(long, value_enum)]
    page_size: Option<Paper>,

    #[arg(long, value_enum)]
    image_placement: Option<Placement>,

    #[arg(long, value_enum)]
    image_quality: Option<Quality>,

    /// Document title
    #[arg(long)]
    title: Option<String>,
}

impl LayoutArgs {
    fn apply(self, mut config: FormatConfig) -> FormatConfig {
        if let Some(layout) = self.layout {
            config = config.with_layout_mode(layout.into());
        }
        if let Some(primary) = self.primary {
            let language = if primary == 2 {
                Language::Second
            } else {
                Language::First
            };
            config = config.with_primary_language(language);
        }
        if self.font1.is_some() || self.font2.is_some() {
            let font1 = self.font1.unwrap_or_else(|| config.font_lang1.clone());
            let font2 = self.font2.unwrap_or_else(|| config.font_lang2.clone());
            config = config.with_fonts(font1, font2);
        }
        if let Some(size) = self.font_size {
            config = config.with_font_size(size);
        }
        if let Some(cm) = self.margin {
            config = config.with_margins(Margins::uniform(cm));
        }
        if let Some(paper) = self.page_size {
            config = config.with_page_size(paper.into());
        }
        if let Some(placement) = self.image_placement {
            config = config.with_image_placement(placement.into());
        }
        if let Some(quality) = self.image_quality {
            config = config.with_image_quality(quality.into());
        }
        if let Some(title) = self.title {
            config = config.with_title(title);
        }
        config
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Target {
    Docx,
    Epub,
    Pdf,
    Html,
}

impl From<Target> for OutputFormat {
    fn from(target: Target) -> Self {
        match target {
            Target::Docx => OutputFormat::Docx,
            Target::Epub => OutputFormat::Epub,
            Target::Pdf => OutputFormat::Pdf,
            Target::Html => OutputFormat::Html,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Layout {
    /// Two columns per aligned pair
    SideBySide,
    /// Pairs stacked, primary language first
    Interleaved,
}

impl From<Layout> for LayoutMode {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::SideBySide => LayoutMode::SideBySide,
            Layout::Interleaved => LayoutMode::Interleaved,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Paper {
    A4,
    Letter,
}

impl From<Paper> for PageSize {
    fn from(paper: Paper) -> Self {
        match paper {
            Paper::A4 => PageSize::A4,
            Paper::Letter => PageSize::Letter,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Placement {
    Center,
    Left,
    Right,
}

impl From<Placement> for ImagePlacement {
    fn from(placement: Placement) -> Self {
        match placement {
            Placement::Center => ImagePlacement::Center,
            Placement::Left => ImagePlacement::Left,
            Placement::Right => ImagePlacement::Right,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Quality {
    Low,
    Medium,
    High,
}

impl From<Quality> for ImageQuality {
    fn from(quality: Quality) -> Self {
        match quality {
            Quality::Low => ImageQuality::Low,
            Quality::Medium => ImageQuality::Medium,
            Quality::High => ImageQuality::High,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum CleanupLevel {
    /// Unicode normalization and whitespace only
    Minimal,
    /// Standard cleanup (default)
    Standard,
    /// Also strip private-use characters
    Aggressive,
}

impl From<CleanupLevel> for CleanupPreset {
    fn from(level: CleanupLevel) -> Self {
        match level {
            CleanupLevel::Minimal => CleanupPreset::Minimal,
            CleanupLevel::Standard => CleanupPreset::Standard,
            CleanupLevel::Aggressive => CleanupPreset::Aggressive,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Format {
            first,
            second,
            to,
            output,
            config,
            layout,
            cleanup,
            lenient,
            timeout,
        } => cmd_format(FormatArgs {
            first,
            second,
            format: to.into(),
            output,
            config,
            layout,
            cleanup,
            lenient,
            timeout: timeout.map(Duration::from_secs),
        }),
        Commands::Preview {
            first,
            second,
            count,
        } => cmd_preview(&first, &second, count),
        Commands::Align {
            first,
            second,
            output,
            compact,
        } => cmd_align(&first, &second, output.as_deref(), compact),
        Commands::Info { input } => cmd_info(&input),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

struct FormatArgs {
    first: PathBuf,
    second: PathBuf,
    format: OutputFormat,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    layout: LayoutArgs,
    cleanup: Option<CleanupLevel>,
    lenient: bool,
    timeout: Option<Duration>,
}

fn cmd_format(args: FormatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let base = match &args.config {
        Some(path) => FormatConfig::from_json_file(path)?,
        None => FormatConfig::default(),
    };
    let config = args.layout.apply(base);

    let mut builder = Bifold::new();
    if args.lenient {
        builder = builder.lenient();
    }
    if let Some(level) = args.cleanup {
        builder = builder.with_cleanup(level.into());
    }
    if let Some(timeout) = args.timeout {
        builder = builder.with_deadline(timeout);
    }
    let orchestrator = builder.orchestrator();

    let id = orchestrator.submit_job(
        InputFile::from_path(&args.first)?,
        InputFile::from_path(&args.second)?,
        args.format,
        config,
    )?;

    log::debug!("Submitted job {}", id);

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let status = loop {
        let status = orchestrator.wait(id, Some(Duration::from_millis(100)))?;
        pb.set_position(status.progress_percent as u64);
        pb.set_message(format!("{}...", status.stage));
        if status.is_terminal() {
            break status;
        }
    };

    if status.stage == JobStage::Failed {
        pb.abandon_with_message("Failed");
    } else {
        pb.finish_with_message("Done!");
    }
    let result = orchestrator.get_result(id)?;

    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(&result.filename));
    fs::write(&path, &result.data)?;

    println!("\n{}", "Output:".green().bold());
    println!("  {} {}", "├─".dimmed(), path.display());
    println!("  {} {} bytes", "├─".dimmed(), result.size_bytes);
    println!("  {} {} pages", "└─".dimmed(), result.page_count);

    Ok(())
}

fn cmd_preview(first: &Path, second: &Path, count: usize) -> Result<(), Box<dyn std::error::Error>> {
    let aligned = Bifold::new()
        .lenient()
        .with_preview_limit(count)
        .align(first, second)?;

    for (i, pair) in aligned.preview().iter().enumerate() {
        let method = match pair.method {
            AlignMethod::Exact => "exact".green(),
            AlignMethod::Structural => "structural".cyan(),
            AlignMethod::Unmatched => "unmatched".yellow(),
        };
        println!(
            "{} {} ({:.2})",
            format!("#{}", i + 1).bold(),
            method,
            pair.confidence
        );
        println!("  1: {}", pair.text1.as_deref().unwrap_or("—").dimmed());
        println!("  2: {}", pair.text2.as_deref().unwrap_or("—").dimmed());
    }

    let stats = aligned.stats();
    println!();
    println!(
        "{}: {} units, {} pairs, {} unmatched",
        "Total".bold(),
        stats.unit_count,
        stats.pair_count(),
        stats.unmatched_count()
    );

    Ok(())
}

fn cmd_align(
    first: &Path,
    second: &Path,
    output: Option<&Path>,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let aligned = Bifold::new().lenient().align(first, second)?;

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };
    let json = aligned.to_json(format)?;

    if let Some(path) = output {
        fs::write(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let doc = Bifold::new().lenient().load(input)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    if let Some(format) = doc.metadata.format {
        println!("{}: {}", "Format".bold(), format);
    }
    if let Some(pages) = doc.metadata.page_count {
        println!("{}: {}", "Pages".bold(), pages);
    }
    if let Some(ref title) = doc.metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref language) = doc.metadata.language {
        println!("{}: {}", "Language".bold(), language);
    }
    println!("{}: {}", "Direction".bold(), doc.direction.as_str());
    if doc.order_uncertain {
        println!("{}", "Reading order is uncertain".yellow());
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "Blocks".bold(), doc.len());
    for (kind, count) in doc.kind_counts() {
        println!("  {} {}: {}", "·".dimmed(), kind, count);
    }
    println!("{}: {}", "Characters".bold(), doc.total_chars());
    println!("{}: {}", "Images".bold(), doc.resources.len());

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "bifold".cyan().bold(), bifold::VERSION);
    println!("Bilingual document formatter");
    println!();
    println!("License: MIT");
}
