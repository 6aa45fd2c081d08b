use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use crate::app::{App, UploadStart, ACTION_RESULT_POLL_INTERVAL};
use crate::config::{load_app_config, AppConfig};
use crate::error::{AppError, AppResult};
use crate::ingest::{CompressionChoice, EncodedImage, ImageFile};
use crate::notification;
use crate::resolver::{BackgroundStyle, BackgroundSurface};
use crate::settings::Field;
use crate::store::{FileStore, KeyValueStore};
use crate::theme::{self, ThemeStyle};

#[derive(Debug, Parser)]
#[command(name = "backdrop", version, about = "Resolve and edit the page background")]
pub struct Cli {
    /// Location query naming a theme for this run only, e.g. `?serika-dark`.
    #[arg(long, global = true)]
    query: Option<String>,
    /// Store file to use instead of the configured one.
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the resolved background.
    Show,
    /// List available themes.
    Themes,
    /// Select a theme, replacing any custom image.
    Theme { name: String },
    /// Set a custom background image.
    Image(ImageArgs),
    /// Remove the custom background.
    Clear,
}

#[derive(Debug, Args)]
struct ImageArgs {
    /// Remote URL, data URI or local file path.
    source: String,
    /// Re-encode files over 30 MiB at 1920px.
    #[arg(long, conflicts_with = "as_is")]
    compress: bool,
    /// Keep files over 30 MiB at their size tier.
    #[arg(long)]
    as_is: bool,
    #[arg(long, allow_negative_numbers = true)]
    blur: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    opacity: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    x: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    y: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    scale: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    rotate: Option<f64>,
}

impl ImageArgs {
    fn choice(&self) -> Option<CompressionChoice> {
        if self.compress {
            Some(CompressionChoice::Compress)
        } else if self.as_is {
            Some(CompressionChoice::AsIs)
        } else {
            None
        }
    }

    fn field_values(&self) -> [(Field, Option<f64>); 6] {
        [
            (Field::Blur, self.blur),
            (Field::Opacity, self.opacity),
            (Field::PositionX, self.x),
            (Field::PositionY, self.y),
            (Field::Scale, self.scale),
            (Field::Rotation, self.rotate),
        ]
    }
}

/// The terminal has no page; styles are printed once the command settles.
struct LoggedSurface;

impl BackgroundSurface for LoggedSurface {
    fn apply_background(&mut self, style: &BackgroundStyle) {
        tracing::debug!(source = ?style.source, "background applied");
    }
}

pub fn run(cli: Cli) -> AppResult<()> {
    let config = load_app_config();
    let store = open_store(&config, cli.store)?;
    let mut app = App::new(&config, store, Box::new(LoggedSurface));
    app.start(cli.query.as_deref());

    let outcome = match cli.command.unwrap_or(Command::Show) {
        Command::Show => Ok(()),
        Command::Themes => {
            print!("{}", render_theme_list(&app.selection().theme_name));
            return Ok(());
        }
        Command::Theme { name } => app.select_theme(&name).map(drop),
        Command::Image(args) => set_image(&mut app, &args),
        Command::Clear => app.clear_background().map(drop),
    };

    match outcome {
        Err(err) if err.is_storage_failure() => notification::storage_warning(&err.to_string()),
        other => other?,
    }
    if let Some(style) = app.current_style() {
        print!("{}", render_css(&app.theme_style(), style));
    }
    Ok(())
}

fn open_store(config: &AppConfig, path: Option<PathBuf>) -> AppResult<Box<dyn KeyValueStore>> {
    let quota = config.store_quota_bytes;
    let store = match path.or_else(|| config.store_file.clone()) {
        Some(path) => FileStore::open(path, quota),
        None => FileStore::open_default(quota)?,
    };
    tracing::debug!(path = %store.path().display(), "using store");
    Ok(Box::new(store))
}

fn set_image(app: &mut App, args: &ImageArgs) -> AppResult<()> {
    app.open_background_editor();
    if is_remote_ref(&args.source) {
        app.set_draft_url(&args.source)?;
    } else {
        let bytes = std::fs::read(&args.source).map_err(|err| {
            AppError::Usage(format!("cannot read {}: {err}", args.source))
        })?;
        match app.begin_upload(ImageFile::sniffed(bytes), args.choice())? {
            UploadStart::Started => {
                let encoded = wait_for_upload(app)?;
                tracing::info!(
                    bytes = encoded.byte_len,
                    plan = ?encoded.plan,
                    dimensions = ?encoded.dimensions,
                    "image ingested"
                );
            }
            UploadStart::NeedsChoice { size } => {
                app.cancel_background_editor();
                return Err(AppError::Usage(format!(
                    "file is {} MiB; pass --compress or --as-is",
                    size / (1024 * 1024)
                )));
            }
            UploadStart::Busy => return Err(AppError::UploadInProgress),
        }
    }

    let now = Instant::now();
    for (field, value) in args.field_values() {
        if let Some(value) = value {
            app.update_draft_field(field, value, now)?;
        }
    }
    app.confirm_background().map(drop)
}

fn wait_for_upload(app: &mut App) -> AppResult<EncodedImage> {
    loop {
        if let Some(result) = app.poll_upload() {
            return result;
        }
        std::thread::sleep(ACTION_RESULT_POLL_INTERVAL);
    }
}

fn is_remote_ref(source: &str) -> bool {
    ["http://", "https://", "data:", "blob:"]
        .iter()
        .any(|scheme| source.trim_start().starts_with(scheme))
}

/// Theme stylesheet import, then the page-root declarations.
pub fn render_css(theme: &ThemeStyle, style: &BackgroundStyle) -> String {
    let mut css = format!("@import url(\"{}\");\n", theme.stylesheet_href);
    css.push_str(&format!("color: {};\n", theme.text_color));
    for (property, value) in style.css_declarations() {
        css.push_str(&format!("{property}: {value};\n"));
    }
    css
}

fn render_theme_list(current: &str) -> String {
    theme::all()
        .iter()
        .map(|theme| {
            let marker = if theme.name == current { '*' } else { ' ' };
            format!("{marker} {:<14} {}\n", theme.name, theme.background_color)
        })
        .collect()
}
