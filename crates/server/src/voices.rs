//! Voice and language resolution
//!
//! Kokoro-style voice names and single-letter language codes are mapped
//! onto engine voice names and BCP-47 locales.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Serialize;

const FALLBACK_LOCALE: &str = "en-US";
const FALLBACK_VOICE: &str = "en-US-JennyNeural";

/// Kokoro voice name -> engine voice
pub static VOICE_MAPPING: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        // American English, female
        ("af_heart", "en-US-JennyNeural"),
        ("af_soul", "en-US-AriaNeural"),
        ("af_grace", "en-US-SaraNeural"),
        ("af_bella", "en-US-AnaNeural"),
        ("af_nicole", "en-US-MichelleNeural"),
        // American English, male
        ("am_adam", "en-US-GuyNeural"),
        ("am_michael", "en-US-ChristopherNeural"),
        ("am_eric", "en-US-EricNeural"),
        // British English
        ("bf_emma", "en-GB-SoniaNeural"),
        ("bf_isabella", "en-GB-LibbyNeural"),
        ("bm_george", "en-GB-RyanNeural"),
        ("bm_lewis", "en-GB-ThomasNeural"),
        // Spanish
        ("es_male", "es-MX-JorgeNeural"),
        ("es_female", "es-MX-DaliaNeural"),
        ("es_spain_male", "es-ES-AlvaroNeural"),
        ("es_spain_female", "es-ES-ElviraNeural"),
    ])
});

/// Kokoro language code -> locale
pub static LANG_MAPPING: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        ("a", "en-US"),
        ("b", "en-GB"),
        ("e", "es-MX"),
        ("f", "fr-FR"),
        ("h", "hi-IN"),
        ("i", "it-IT"),
        ("j", "ja-JP"),
        ("p", "pt-BR"),
        ("z", "zh-CN"),
    ])
});

/// Locale -> default engine voice
pub static DEFAULT_VOICES: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        ("en-US", "en-US-JennyNeural"),
        ("en-GB", "en-GB-SoniaNeural"),
        ("es-MX", "es-MX-DaliaNeural"),
        ("es-ES", "es-ES-ElviraNeural"),
        ("fr-FR", "fr-FR-DeniseNeural"),
        ("hi-IN", "hi-IN-SwaraNeural"),
        ("it-IT", "it-IT-ElsaNeural"),
        ("ja-JP", "ja-JP-NanamiNeural"),
        ("pt-BR", "pt-BR-FranciscaNeural"),
        ("zh-CN", "zh-CN-XiaoxiaoNeural"),
    ])
});

/// Engine voice and the locale it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVoice {
    pub locale: String,
    pub voice: String,
}

/// Resolve a requested voice and language.
///
/// A known voice name wins and carries its own locale. Otherwise the
/// language's default voice is used; unknown languages fall back to en-US.
pub fn resolve(voice: &str, lang: &str) -> ResolvedVoice {
    if let Some(engine_voice) = VOICE_MAPPING.get(voice) {
        return ResolvedVoice {
            locale: locale_of(engine_voice).to_string(),
            voice: engine_voice.to_string(),
        };
    }

    let locale = LANG_MAPPING.get(lang).copied().unwrap_or(FALLBACK_LOCALE);
    let voice = DEFAULT_VOICES.get(locale).copied().unwrap_or(FALLBACK_VOICE);

    ResolvedVoice {
        locale: locale.to_string(),
        voice: voice.to_string(),
    }
}

/// `en-US-JennyNeural` -> `en-US`
fn locale_of(engine_voice: &str) -> &str {
    let mut dashes = engine_voice.match_indices('-').map(|(i, _)| i);
    match (dashes.next(), dashes.next()) {
        (Some(_), Some(second)) => &engine_voice[..second],
        _ => FALLBACK_LOCALE,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceEntry {
    pub name: &'static str,
    pub aliases: Vec<&'static str>,
    pub is_default: bool,
}

/// Every known engine voice grouped by locale
pub fn voices_by_locale() -> BTreeMap<String, Vec<VoiceEntry>> {
    let mut names: BTreeMap<&'static str, Vec<&'static str>> = BTreeMap::new();
    for (&alias, &voice) in VOICE_MAPPING.iter() {
        names.entry(voice).or_default().push(alias);
    }
    for &voice in DEFAULT_VOICES.values() {
        names.entry(voice).or_default();
    }

    let mut by_locale: BTreeMap<String, Vec<VoiceEntry>> = BTreeMap::new();
    for (name, aliases) in names {
        let locale = locale_of(name);
        by_locale.entry(locale.to_string()).or_default().push(VoiceEntry {
            name,
            aliases,
            is_default: DEFAULT_VOICES.get(locale) == Some(&name),
        });
    }
    by_locale
}
