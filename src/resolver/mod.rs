use crate::config::AppConfig;
use crate::settings::BackgroundSettings;
use crate::theme::{self, ThemeRecord, ThemeSelection};

/// Which of the three candidates won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundSource {
    CustomImage,
    ThemeColor,
    DefaultWallpaper,
}

/// Full page-root background, applied as a single value.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundStyle {
    pub source: BackgroundSource,
    pub theme_name: Option<String>,
    pub background_image: Option<String>,
    pub background_color: Option<String>,
    pub filter: Option<String>,
    pub opacity: Option<f64>,
    pub object_position: Option<String>,
    pub transform: Option<String>,
}

impl BackgroundStyle {
    fn custom_image(url: String, settings: &BackgroundSettings) -> Self {
        Self {
            source: BackgroundSource::CustomImage,
            theme_name: None,
            background_image: Some(url),
            background_color: None,
            filter: Some(blur_filter(settings.blur_px)),
            opacity: Some(settings.opacity),
            object_position: Some(object_position(
                settings.position_x_pct,
                settings.position_y_pct,
            )),
            transform: Some(transform(settings.scale_pct, settings.rotation_deg)),
        }
    }

    fn theme_color(theme: &ThemeRecord) -> Self {
        Self {
            source: BackgroundSource::ThemeColor,
            theme_name: Some(theme.name.to_string()),
            background_image: None,
            background_color: Some(theme.background_color.to_string()),
            filter: None,
            opacity: None,
            object_position: None,
            transform: None,
        }
    }

    fn wallpaper(url: String) -> Self {
        Self {
            source: BackgroundSource::DefaultWallpaper,
            theme_name: None,
            background_image: Some(url),
            background_color: None,
            filter: None,
            opacity: None,
            object_position: None,
            transform: None,
        }
    }

    /// CSS declarations for the page root, in a stable order.
    ///
    /// Unset properties are emitted with an empty value so a previous style is cleared.
    pub fn css_declarations(&self) -> Vec<(&'static str, String)> {
        let image = self
            .background_image
            .as_ref()
            .map_or_else(|| "none".to_string(), |url| format!("url(\"{url}\")"));
        vec![
            ("background-image", image),
            (
                "background-color",
                self.background_color.clone().unwrap_or_default(),
            ),
            ("filter", self.filter.clone().unwrap_or_default()),
            (
                "opacity",
                self.opacity.map(format_number).unwrap_or_default(),
            ),
            (
                "object-position",
                self.object_position.clone().unwrap_or_default(),
            ),
            ("transform", self.transform.clone().unwrap_or_default()),
        ]
    }
}

pub fn blur_filter(blur_px: f64) -> String {
    format!("blur({}px)", format_number(blur_px))
}

pub fn object_position(x_pct: f64, y_pct: f64) -> String {
    format!("{}% {}%", format_number(x_pct), format_number(y_pct))
}

pub fn transform(scale_pct: f64, rotation_deg: f64) -> String {
    format!(
        "scale({}) rotate({}deg)",
        format_number(scale_pct / 100.0),
        format_number(rotation_deg)
    )
}

fn format_number(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    rounded.to_string()
}

/// Receives the resolved background. The only writer of page-root styling.
pub trait BackgroundSurface {
    fn apply_background(&mut self, style: &BackgroundStyle);

    /// Style the page carries right now, if the surface can tell.
    ///
    /// Read on initial load in place of the resolver's own memory; `None` forces a write.
    fn current_background(&self) -> Option<BackgroundStyle> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub default_wallpaper: String,
    pub asset_base: String,
}

impl ResolverConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            default_wallpaper: config.default_wallpaper.clone(),
            asset_base: config.asset_base.clone(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

/// Snapshot of everything resolution reads.
#[derive(Debug, Clone, Copy)]
pub struct ResolverInputs<'a> {
    pub settings: &'a BackgroundSettings,
    pub selection: &'a ThemeSelection,
    /// Theme named by the location query; styles this load without being persisted.
    pub query_theme: Option<&'static ThemeRecord>,
    pub is_initial_load: bool,
}

/// Absolute and data refs pass through; anything else is an asset path under `asset_base`.
pub fn resolve_image_url(asset_base: &str, image_ref: &str) -> String {
    const PASSTHROUGH_SCHEMES: [&str; 4] = ["http://", "https://", "data:", "blob:"];
    if PASSTHROUGH_SCHEMES
        .iter()
        .any(|scheme| image_ref.starts_with(scheme))
    {
        return image_ref.to_string();
    }
    let base = if asset_base.ends_with('/') {
        asset_base.to_string()
    } else {
        format!("{asset_base}/")
    };
    format!("{base}{}", image_ref.trim_start_matches('/'))
}

/// Picks the authoritative background. First match wins:
/// custom image, explicit non-default theme, explicitly chosen default theme, wallpaper.
pub fn resolve(inputs: &ResolverInputs<'_>, config: &ResolverConfig) -> BackgroundStyle {
    if let Some(image) = inputs.settings.image() {
        return BackgroundStyle::custom_image(
            resolve_image_url(&config.asset_base, image),
            inputs.settings,
        );
    }

    let theme = inputs
        .query_theme
        .or_else(|| theme::find(&inputs.selection.theme_name));
    match theme {
        Some(theme) if !theme.is_default() => BackgroundStyle::theme_color(theme),
        Some(theme) if inputs.selection.ever_activated_by_user => {
            BackgroundStyle::theme_color(theme)
        }
        _ => BackgroundStyle::wallpaper(resolve_image_url(
            &config.asset_base,
            &config.default_wallpaper,
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub style: BackgroundStyle,
    pub applied: bool,
}

/// Runs [`resolve`] and forwards changes to the surface, skipping unchanged results.
#[derive(Debug, Clone, Default)]
pub struct BackgroundResolver {
    config: ResolverConfig,
    last_applied: Option<BackgroundStyle>,
}

impl BackgroundResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            last_applied: None,
        }
    }

    pub fn last_applied(&self) -> Option<&BackgroundStyle> {
        self.last_applied.as_ref()
    }

    pub fn run(
        &mut self,
        inputs: &ResolverInputs<'_>,
        surface: &mut dyn BackgroundSurface,
    ) -> Resolution {
        if inputs.is_initial_load {
            self.last_applied = surface.current_background();
        }

        let style = resolve(inputs, &self.config);
        if self.last_applied.as_ref() == Some(&style) {
            tracing::trace!(source = ?style.source, "background unchanged");
            return Resolution {
                style,
                applied: false,
            };
        }

        tracing::debug!(
            source = ?style.source,
            theme = ?style.theme_name,
            initial_load = inputs.is_initial_load,
            "applying background"
        );
        surface.apply_background(&style);
        self.last_applied = Some(style.clone());
        Resolution {
            style,
            applied: true,
        }
    }
}
