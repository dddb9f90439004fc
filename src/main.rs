use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tryon_studio::capture::{
    FacingMode, ImageSequenceCamera, IntervalTicker, InversionMode, RqrrDecoder, ScanOptions,
    scan_for_tag,
};
use tryon_studio::catalog::{self, GarmentCategory};
use tryon_studio::config::StudioConfig;
use tryon_studio::generation::ImagePayload;
use tryon_studio::logging::init_logging;
use tryon_studio::studio::{
    CURATION_MESSAGE, FailedStep, Selection, SelectionMode, Studio, TryOnResult, user_message,
};

/// Virtual try-on studio from the command line:
/// - render catalog or uploaded garments onto a photo
/// - describe a garment in words and render it
/// - orbit a finished render in a 360° video
/// - read garment QR tags from camera frames
#[derive(Parser, Debug)]
#[command(name = "tryon")]
#[command(about = "👗 Virtual try-on studio: renders, 360° videos and QR garment tags")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API key, overriding the config file and environment
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit catalog or uploaded garments onto a subject photo
    TryOn(TryOnArgs),
    /// Synthesize a garment from a description and fit it
    Custom(CustomArgs),
    /// Render a 360° video from a finished try-on image
    Video(VideoArgs),
    /// Read a garment QR tag from camera frames (an image or a directory of images)
    Scan(ScanArgs),
    /// List catalog garments, backdrops and palette colours
    Catalog(CatalogArgs),
}

#[derive(Args, Debug)]
struct SceneArgs {
    /// Subject photo
    #[arg(short, long)]
    person: PathBuf,

    /// Catalog backdrop id (b1..b5)
    #[arg(long, conflicts_with = "background_file")]
    background: Option<String>,

    /// Backdrop photo, takes precedence over catalog backdrops
    #[arg(long)]
    background_file: Option<PathBuf>,

    /// Palette colour name, e.g. "Cobalt Blue"
    #[arg(long)]
    palette: Option<String>,

    /// Where to write the rendered image
    #[arg(short, long, default_value = "tryon.png")]
    output: PathBuf,

    /// Also render a 360° video to this path
    #[arg(long)]
    video: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TryOnArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Catalog garment id or scanned tag payload (repeatable)
    #[arg(short, long = "garment")]
    garments: Vec<String>,

    /// Garment photo to upload instead of catalog garments (repeatable)
    #[arg(short, long = "upload", conflicts_with = "garments")]
    uploads: Vec<PathBuf>,

    /// Let the stylist pick a top, a bottom and shoes from the catalog
    #[arg(long, conflicts_with_all = ["garments", "uploads"])]
    curate: bool,
}

#[derive(Args, Debug)]
struct CustomArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Description of the garment to synthesize
    #[arg(long)]
    prompt: String,

    /// Catalog garment used as a style reference (repeatable)
    #[arg(short, long = "reference")]
    references: Vec<String>,
}

#[derive(Args, Debug)]
struct VideoArgs {
    /// Rendered try-on image
    #[arg(short, long)]
    image: PathBuf,

    #[arg(short, long, default_value = "tryon-360.mp4")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Frame source: an image file or a directory of images
    frames: PathBuf,

    /// Give up after this long: 30s, 2m, 1h
    #[arg(short, long, default_value = "30s")]
    timeout: String,

    /// Prefer the front camera
    #[arg(long)]
    user_facing: bool,

    /// Also look for light-on-dark codes
    #[arg(long)]
    attempt_both: bool,
}

#[derive(Args, Debug)]
struct CatalogArgs {
    /// Only list garments of this category
    #[arg(long)]
    category: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    let mut config = match &cli.config {
        Some(path) => StudioConfig::from_file(path)?,
        None => StudioConfig::default(),
    };
    if cli.api_key.is_some() {
        config.api_key = cli.api_key.clone();
    }
    let config = config.apply_env();
    config.validate()?;

    match cli.command {
        Command::TryOn(args) => run_try_on(&config, args).await,
        Command::Custom(args) => run_custom(&config, args).await,
        Command::Video(args) => run_video(&config, args).await,
        Command::Scan(args) => run_scan(&config, args).await,
        Command::Catalog(args) => run_catalog(args),
    }
}

async fn run_try_on(config: &StudioConfig, args: TryOnArgs) -> Result<()> {
    let mut selection = scene_selection(&args.scene)?;
    if args.curate {
        selection = selection.curated(&mut rand::rng());
        println!("{CURATION_MESSAGE}");
        for garment in selection.garments() {
            println!("  {} ({})", garment.name, garment.id);
        }
    } else if args.uploads.is_empty() {
        for tag in &args.garments {
            let (next, scan) = selection.with_scanned_tag(tag);
            println!("{}", scan.message());
            selection = next;
        }
    } else {
        selection = selection.with_mode(SelectionMode::Upload);
        for path in &args.uploads {
            selection = selection.with_uploaded_garment(load_image(path)?);
        }
    }
    render(config, &selection, &args.scene).await
}

async fn run_custom(config: &StudioConfig, args: CustomArgs) -> Result<()> {
    let mut selection = scene_selection(&args.scene)?
        .with_mode(SelectionMode::Custom)
        .with_custom_prompt(args.prompt);
    for tag in &args.references {
        let (next, scan) = selection.with_scanned_tag(tag);
        println!("{}", scan.message());
        selection = next;
    }
    render(config, &selection, &args.scene).await
}

async fn run_video(config: &StudioConfig, args: VideoArgs) -> Result<()> {
    let studio = Studio::connect(config)?;
    let result = TryOnResult {
        id: "cli".to_string(),
        image: load_image(&args.image)?,
        advice: String::new(),
        custom_prompt: None,
        garment_ids: Vec::new(),
        background_id: None,
        created_at: 0,
        video: None,
    };
    render_video(&studio, &result, &args.output).await
}

async fn run_scan(config: &StudioConfig, args: ScanArgs) -> Result<()> {
    let timeout = Duration::from_secs(u64::from(parse_duration(&args.timeout)?));
    let camera = ImageSequenceCamera::from_path(&args.frames)?;
    let mut options = ScanOptions {
        facing: config.scanner.facing,
        decode: config.decode_options(),
    };
    if args.user_facing {
        options.facing = FacingMode::User;
    }
    if args.attempt_both {
        options.decode.inversion = InversionMode::AttemptBoth;
    }

    let payload = scan_for_tag(
        camera,
        RqrrDecoder::new(),
        IntervalTicker::with_rate(config.scanner.tick_hz),
        options,
        Some(timeout),
    )
    .await?;

    println!("{payload}");
    match catalog::resolve_tag(&payload) {
        Some(garment) => println!("Tag Recognized: {} ({})", garment.name, garment.id),
        None => println!("Unrecognized tag."),
    }
    Ok(())
}

fn run_catalog(args: CatalogArgs) -> Result<()> {
    let category = args
        .category
        .as_deref()
        .map(str::parse::<GarmentCategory>)
        .transpose()?;
    let garments = catalog::garments_in(category);

    if args.json {
        let listing = serde_json::json!({
            "garments": garments,
            "backgrounds": catalog::sample_backgrounds(),
            "palette": catalog::palette(),
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("Garments:");
    for garment in &garments {
        println!("  {:<5} {:<12} {}", garment.id, garment.category.as_str(), garment.name);
    }
    println!("Backdrops:");
    for background in catalog::sample_backgrounds() {
        println!("  {:<5} {}", background.id, background.name);
    }
    println!("Palette:");
    for color in catalog::palette() {
        println!("  {:<16} {}", color.name, color.hex.as_deref().unwrap_or("-"));
    }
    Ok(())
}

fn scene_selection(scene: &SceneArgs) -> Result<Selection> {
    let mut selection = Selection::new(load_image(&scene.person)?);
    if let Some(path) = &scene.background_file {
        selection = selection.with_uploaded_background(load_image(path)?);
    } else if let Some(id) = &scene.background {
        let background =
            catalog::find_background(id).ok_or_else(|| anyhow!("Unknown backdrop: {}", id))?;
        selection = selection.with_background(background);
    }
    if let Some(palette) = &scene.palette {
        selection = selection.with_palette(palette);
    }
    Ok(selection)
}

async fn render(config: &StudioConfig, selection: &Selection, scene: &SceneArgs) -> Result<()> {
    let studio = Studio::connect(config)?;
    println!("{}", selection.stylist_insight());

    let result = match studio.try_on(selection).await {
        Ok(result) => result,
        Err(e) => {
            let shown = user_message(FailedStep::TryOn, &e);
            return Err(anyhow!(e).context(shown.message));
        }
    };

    write_image(&result.image, &scene.output)?;
    info!(id = %result.id, path = %scene.output.display(), "render saved");
    println!("Saved {}", scene.output.display());
    if !result.advice.is_empty() {
        println!("Stylist: {}", result.advice);
    }

    if let Some(video_path) = &scene.video {
        render_video(&studio, &result, video_path).await?;
    }
    Ok(())
}

async fn render_video<G, V, F, S>(
    studio: &Studio<G, V, F, S>,
    result: &TryOnResult,
    output: &Path,
) -> Result<()>
where
    G: tryon_studio::generation::ImageGenerator,
    V: tryon_studio::generation::VideoGenerator,
    F: tryon_studio::studio::ImageFetcher,
    S: tryon_studio::Sleeper,
{
    println!("Rendering 360° video, this can take a few minutes...");
    let rendered = match studio.render_video(result).await {
        Ok(rendered) => rendered,
        Err(e) => {
            let shown = user_message(FailedStep::Video, &e);
            if shown.requires_key_reselection {
                eprintln!("The API key was rejected; select a different key and retry.");
            }
            return Err(anyhow!(e).context(shown.message));
        }
    };

    let video = rendered
        .video
        .ok_or_else(|| anyhow!("video missing from result"))?;
    std::fs::write(output, &video.bytes)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Saved {} ({})", output.display(), video.mime_type);
    Ok(())
}

fn load_image(path: &Path) -> Result<ImagePayload> {
    Ok(ImagePayload::from_file(path)?)
}

fn write_image(image: &ImagePayload, path: &Path) -> Result<()> {
    let bytes = image.decode_bytes()?;
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

/// Parse a duration string into seconds: plain seconds, or 30s / 2m / 1h.
fn parse_duration(duration: &str) -> Result<u32> {
    if let Ok(seconds) = duration.parse::<u32>() {
        return Ok(seconds);
    }

    let Some((split, unit)) = duration.char_indices().next_back() else {
        return Err(anyhow!("Invalid duration format: {}", duration));
    };
    let num_str = &duration[..split];
    if num_str.is_empty() {
        return Err(anyhow!("Invalid duration format: {}", duration));
    }
    let num: u32 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", num_str))?;

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        _ => {
            return Err(anyhow!(
                "Invalid duration unit: {}. Use 's' for seconds, 'm' for minutes, 'h' for hours",
                unit
            ));
        }
    };
    num.checked_mul(multiplier)
        .ok_or_else(|| anyhow!("Duration too long: {}", duration))
}
