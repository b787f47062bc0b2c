use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum stored length of the filename base, in characters.
pub const MAX_FILENAME_LEN: usize = 255;

/// Maximum stored length of the file extension, in characters.
pub const MAX_EXTENSION_LEN: usize = 50;

/// Extensions the view page is willing to render inline.
const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "ico"];

/// One uploaded media resource, as stored in the metadata store.
///
/// The row never holds plaintext: the payload lives in the blob store as
/// ciphertext, and `salt` is the only key-derivation input kept server-side.
/// `viewed` is the one-shot flag; it starts `false` and is flipped exactly
/// once by a successful consuming download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaResource {
    /// Internal row identity.
    pub id: Uuid,

    /// Unguessable URL-safe identifier; appears in the share URL path.
    pub resource_key: String,

    /// bcrypt verifier, present iff the uploader supplied a password.
    pub password_hash: Option<String>,

    /// Expiration instant; `None` means the resource never expires.
    pub expires_at: Option<DateTime<Utc>>,

    /// One-shot flag. Set under the row lock by the consuming download.
    pub viewed: bool,

    /// Insert timestamp.
    pub created_at: DateTime<Utc>,

    /// Random salt fed to key derivation alongside the client-held secret.
    pub salt: Vec<u8>,

    /// Original base name without extension.
    pub filename: Option<String>,

    /// Lowercased extension without the leading dot.
    pub file_extension: Option<String>,

    /// Hint to the renderer to blur the inline preview.
    pub blur_enabled: bool,
}

impl MediaResource {
    /// Whether `expires_at` lies at or before `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }

    /// Whether the stored extension is one the view page renders inline.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.file_extension
            .as_deref()
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    }

    /// Reassemble a user-facing filename from the stored base and extension.
    ///
    /// Falls back to `"file"` (plus the extension, if any) when no base name
    /// was stored.
    #[must_use]
    pub fn display_filename(&self) -> String {
        let base = self.filename.as_deref().filter(|f| !f.is_empty());
        match (base, self.file_extension.as_deref()) {
            (Some(name), Some(ext)) => format!("{name}.{ext}"),
            (Some(name), None) => name.to_owned(),
            (None, Some(ext)) => format!("file.{ext}"),
            (None, None) => "file".to_owned(),
        }
    }
}

/// Parameters for inserting a new [`MediaResource`] row.
///
/// `id`, `viewed`, and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMediaResource {
    pub resource_key: String,
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub salt: Vec<u8>,
    pub filename: Option<String>,
    pub file_extension: Option<String>,
    pub blur_enabled: bool,
}

/// Split an uploaded filename into a base name and a lowercased extension.
///
/// The leading dot is stripped from the extension. A name without an
/// extension (or a dotfile like `.env`) keeps its full name and gets no
/// extension. Both parts are truncated to their storage limits on a char
/// boundary. Empty input yields `(None, None)`.
#[must_use]
pub fn split_filename(raw: &str) -> (Option<String>, Option<String>) {
    if raw.is_empty() {
        return (None, None);
    }

    let (base, extension) = match raw.rsplit_once('.') {
        // A leading-dot name or trailing dot has no usable extension.
        Some((base, ext)) if !base.is_empty() && !ext.is_empty() => {
            (base.to_owned(), Some(ext.to_ascii_lowercase()))
        }
        _ => (raw.to_owned(), None),
    };

    (
        Some(truncate_chars(&base, MAX_FILENAME_LEN)),
        extension.map(|ext| truncate_chars(&ext, MAX_EXTENSION_LEN)),
    )
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
