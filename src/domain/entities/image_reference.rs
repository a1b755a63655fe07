//! `ImageReference` — idempotent upsert target for image-generator result
//! messages (§3, §6 `CharacterImageResultPayload`).

#[derive(Debug, Clone)]
pub struct ImageReference {
    pub reference_key: String,
    pub image_url: String,
}

impl ImageReference {
    pub fn new(reference_key: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            reference_key: reference_key.into(),
            image_url: image_url.into(),
        }
    }
}
