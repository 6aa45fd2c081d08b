use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{keys, load, KeyValueStore, StoreResult};

/// One of the six continuous presentation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Blur,
    Opacity,
    PositionX,
    PositionY,
    Scale,
    Rotation,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Blur,
        Field::Opacity,
        Field::PositionX,
        Field::PositionY,
        Field::Scale,
        Field::Rotation,
    ];

    /// Inclusive bounds as `(min, max)`.
    pub const fn range(self) -> (f64, f64) {
        match self {
            Field::Blur => (0.0, 20.0),
            Field::Opacity => (0.10, 1.00),
            Field::PositionX => (0.0, 300.0),
            Field::PositionY => (-300.0, 300.0),
            Field::Scale => (50.0, 200.0),
            Field::Rotation => (-180.0, 180.0),
        }
    }

    pub const fn default_value(self) -> f64 {
        match self {
            Field::Blur => 0.0,
            Field::Opacity => 1.0,
            Field::PositionX | Field::PositionY => 50.0,
            Field::Scale => 100.0,
            Field::Rotation => 0.0,
        }
    }

    /// Clamps to the declared range; NaN reads as the default.
    pub fn clamp(self, value: f64) -> f64 {
        if value.is_nan() {
            return self.default_value();
        }
        let (min, max) = self.range();
        value.clamp(min, max)
    }

    pub const fn store_key(self) -> &'static str {
        match self {
            Field::Blur => keys::BACK_IMG_BLUR,
            Field::Opacity => keys::BACK_IMG_OPACITY,
            Field::PositionX => keys::BACK_IMG_POSITION_X,
            Field::PositionY => keys::BACK_IMG_POSITION_Y,
            Field::Scale => keys::BACK_IMG_SCALE,
            Field::Rotation => keys::BACK_IMG_ROTATION,
        }
    }

    /// Action name the host store mirrors this field under.
    pub const fn action_name(self) -> &'static str {
        match self {
            Field::Blur => "setBackImgBlur",
            Field::Opacity => "setBackImgOpacity",
            Field::PositionX => "setBackImgPositionX",
            Field::PositionY => "setBackImgPositionY",
            Field::Scale => "setBackImgScale",
            Field::Rotation => "setBackImgRotation",
        }
    }

    /// Fields mirrored onto the live page background while a draft is open.
    pub const fn propagates_live(self) -> bool {
        matches!(self, Field::Blur | Field::Opacity)
    }
}

pub const IMAGE_URL_ACTION: &str = "setBackImgUrl";

/// The persisted custom background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSettings {
    pub image_ref: Option<String>,
    pub blur_px: f64,
    pub opacity: f64,
    pub position_x_pct: f64,
    pub position_y_pct: f64,
    pub scale_pct: f64,
    pub rotation_deg: f64,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            image_ref: None,
            blur_px: Field::Blur.default_value(),
            opacity: Field::Opacity.default_value(),
            position_x_pct: Field::PositionX.default_value(),
            position_y_pct: Field::PositionY.default_value(),
            scale_pct: Field::Scale.default_value(),
            rotation_deg: Field::Rotation.default_value(),
        }
    }
}

impl BackgroundSettings {
    pub fn with_image(image_ref: impl Into<String>) -> Self {
        Self {
            image_ref: Some(image_ref.into()),
            ..Self::default()
        }
    }

    pub fn has_image(&self) -> bool {
        self.image().is_some()
    }

    /// The image ref, if non-empty after trimming.
    pub fn image(&self) -> Option<&str> {
        self.image_ref
            .as_deref()
            .map(str::trim)
            .filter(|image| !image.is_empty())
    }

    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Blur => self.blur_px,
            Field::Opacity => self.opacity,
            Field::PositionX => self.position_x_pct,
            Field::PositionY => self.position_y_pct,
            Field::Scale => self.scale_pct,
            Field::Rotation => self.rotation_deg,
        }
    }

    /// Stores `value` clamped into the field's range and returns what was stored.
    pub fn set(&mut self, field: Field, value: f64) -> f64 {
        let value = field.clamp(value);
        let slot = match field {
            Field::Blur => &mut self.blur_px,
            Field::Opacity => &mut self.opacity,
            Field::PositionX => &mut self.position_x_pct,
            Field::PositionY => &mut self.position_y_pct,
            Field::Scale => &mut self.scale_pct,
            Field::Rotation => &mut self.rotation_deg,
        };
        *slot = value;
        value
    }

    /// Clamps every field and resets transforms when there is no image.
    pub fn normalized(mut self) -> Self {
        if !self.has_image() {
            return Self::default();
        }
        for field in Field::ALL {
            let value = self.get(field);
            self.set(field, value);
        }
        self
    }

    /// Reads every key independently; missing or malformed keys fall back to defaults.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        let mut settings = Self {
            image_ref: load::<String, _>(store, keys::BACK_IMG_URL),
            ..Self::default()
        };
        for field in Field::ALL {
            if let Some(value) = load::<f64, _>(store, field.store_key()) {
                settings.set(field, value);
            }
        }
        settings.normalized()
    }

    /// Writes all seven keys as one batch, stopping at the first rejected write.
    pub fn persist<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> StoreResult<()> {
        let mut entries = vec![(keys::BACK_IMG_URL, Value::from(self.image().unwrap_or("")))];
        entries.extend(
            Field::ALL
                .into_iter()
                .map(|field| (field.store_key(), Value::from(self.get(field)))),
        );
        store.set_many(entries)
    }

    /// Removes all seven keys as one batch.
    pub fn remove_persisted<S: KeyValueStore + ?Sized>(store: &mut S) -> StoreResult<()> {
        let mut names = vec![keys::BACK_IMG_URL];
        names.extend(Field::ALL.map(Field::store_key));
        store.remove_many(&names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn set_clamps_to_declared_ranges() {
        let mut settings = BackgroundSettings::with_image("https://a.test/bg.jpg");
        assert_eq!(settings.set(Field::Blur, 25.0), 20.0);
        assert_eq!(settings.set(Field::Opacity, 0.0), 0.10);
        assert_eq!(settings.set(Field::PositionX, -4.0), 0.0);
        assert_eq!(settings.set(Field::PositionY, -400.0), -300.0);
        assert_eq!(settings.set(Field::Scale, 250.0), 200.0);
        assert_eq!(settings.set(Field::Rotation, 270.0), 180.0);
        assert_eq!(settings.set(Field::Rotation, f64::NAN), 0.0);
        assert_eq!(settings.blur_px, 20.0);
    }

    #[test]
    fn imageless_settings_never_carry_transforms() {
        let mut settings = BackgroundSettings::with_image("   ");
        settings.set(Field::Scale, 150.0);
        settings.set(Field::Blur, 6.0);
        assert_eq!(settings.normalized(), BackgroundSettings::default());
    }

    #[test]
    fn persist_then_load_round_trips() {
        let mut store = MemoryStore::new();
        let mut settings = BackgroundSettings::with_image("data:image/png;base64,AAAA");
        settings.set(Field::Blur, 7.0);
        settings.set(Field::Opacity, 0.4);
        settings.set(Field::PositionY, -120.0);
        settings.set(Field::Rotation, 45.0);
        settings.persist(&mut store).unwrap();

        assert_eq!(BackgroundSettings::load(&store), settings);
    }

    #[test]
    fn partial_write_loads_missing_fields_as_defaults() {
        let mut store = MemoryStore::new();
        store.set(keys::BACK_IMG_URL, json!("https://a.test/bg.jpg")).unwrap();
        store.set(keys::BACK_IMG_BLUR, json!(4)).unwrap();
        store.set(keys::BACK_IMG_SCALE, json!("big")).unwrap();

        let loaded = BackgroundSettings::load(&store);
        assert_eq!(loaded.image(), Some("https://a.test/bg.jpg"));
        assert_eq!(loaded.blur_px, 4.0);
        assert_eq!(loaded.scale_pct, 100.0);
        assert_eq!(loaded.opacity, 1.0);
    }

    #[test]
    fn load_clamps_out_of_range_values_and_resets_without_image() {
        let mut store = MemoryStore::new();
        store.set(keys::BACK_IMG_OPACITY, json!(0.02)).unwrap();
        assert_eq!(BackgroundSettings::load(&store), BackgroundSettings::default());

        store.set(keys::BACK_IMG_URL, json!("bg.png")).unwrap();
        assert_eq!(BackgroundSettings::load(&store).opacity, 0.10);
    }

    #[derive(Default)]
    struct BatchCountingStore {
        inner: MemoryStore,
        batches: usize,
    }

    impl KeyValueStore for BatchCountingStore {
        fn get(&self, key: &str) -> Option<Value> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: Value) -> StoreResult<()> {
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> StoreResult<()> {
            self.inner.remove(key)
        }

        fn set_many(&mut self, entries: Vec<(&str, Value)>) -> StoreResult<()> {
            self.batches += 1;
            self.inner.set_many(entries)
        }

        fn remove_many(&mut self, keys: &[&str]) -> StoreResult<()> {
            self.batches += 1;
            self.inner.remove_many(keys)
        }
    }

    #[test]
    fn persist_and_remove_each_write_one_batch() {
        let mut store = BatchCountingStore::default();
        BackgroundSettings::with_image("data:image/jpeg;base64,AAAA")
            .persist(&mut store)
            .unwrap();
        assert_eq!(store.batches, 1);
        assert_eq!(store.inner.len(), 7);

        BackgroundSettings::remove_persisted(&mut store).unwrap();
        assert_eq!(store.batches, 2);
        assert!(store.inner.is_empty());
    }

    #[test]
    fn remove_persisted_clears_every_key() {
        let mut store = MemoryStore::new();
        BackgroundSettings::with_image("bg.png")
            .persist(&mut store)
            .unwrap();
        assert_eq!(store.len(), 7);
        BackgroundSettings::remove_persisted(&mut store).unwrap();
        assert!(store.is_empty());
    }
}
