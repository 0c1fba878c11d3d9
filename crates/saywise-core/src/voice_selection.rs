//! Choosing the best installed device voice.

use crate::domain::{DeviceVoice, VoiceGender};

/// Known high-quality voices, best first. Matched as a substring of the
/// voice name.
pub const PREFERRED_VOICE_NAMES: &[&str] = &[
    "Google UK English Female",
    "Google US English",
    "Samantha",
    "Karen",
    "Moira",
    "Tessa",
    "Microsoft Aria",
    "Microsoft Jenny",
    "Microsoft Zira",
    "Fiona",
    "Victoria",
];

/// Name fragments that usually indicate a female-sounding voice.
const FEMALE_NAME_HINTS: &[&str] = &[
    "female", "woman", "samantha", "karen", "victoria", "zira", "aria", "jenny", "susan",
    "hazel", "fiona", "moira", "tessa", "serena",
];

fn matches_language(voice: &DeviceVoice, language: &str) -> bool {
    voice
        .language
        .to_ascii_lowercase()
        .replace('_', "-")
        .starts_with(&language.to_ascii_lowercase())
}

fn sounds_female(voice: &DeviceVoice) -> bool {
    if voice.gender == Some(VoiceGender::Female) {
        return true;
    }
    let name = voice.name.to_lowercase();
    FEMALE_NAME_HINTS.iter().any(|hint| name.contains(hint))
}

/// Pick the best voice for `language` (a locale prefix such as `en`).
///
/// Tried in order:
/// 1. a preferred voice (in [`PREFERRED_VOICE_NAMES`] order) in the language
/// 2. a female-sounding voice in the language
/// 3. any voice in the language
///
/// Returns `None` when nothing matches; the runtime default voice is used then.
pub fn select_optimal_voice<'a>(voices: &'a [DeviceVoice], language: &str) -> Option<&'a DeviceVoice> {
    let in_language: Vec<&DeviceVoice> = voices
        .iter()
        .filter(|v| matches_language(v, language))
        .collect();

    PREFERRED_VOICE_NAMES
        .iter()
        .find_map(|preferred| {
            in_language
                .iter()
                .copied()
                .find(|v| v.name.contains(preferred))
        })
        .or_else(|| in_language.iter().copied().find(|v| sounds_female(v)))
        .or_else(|| in_language.first().copied())
}

/// Find a voice by exact id or case-insensitive name.
pub fn find_voice<'a>(voices: &'a [DeviceVoice], wanted: &str) -> Option<&'a DeviceVoice> {
    voices
        .iter()
        .find(|v| v.id == wanted)
        .or_else(|| voices.iter().find(|v| v.name.eq_ignore_ascii_case(wanted)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, lang: &str) -> DeviceVoice {
        DeviceVoice::new(name.to_lowercase().replace(' ', "-"), name, lang)
    }

    #[test]
    fn preferred_order_wins_over_list_order() {
        let voices = vec![
            voice("Alex", "en-US"),
            voice("Karen", "en-AU"),
            voice("Samantha", "en-US"),
        ];
        let chosen = select_optimal_voice(&voices, "en").unwrap();
        assert_eq!(chosen.name, "Samantha");
    }

    #[test]
    fn preferred_voice_in_wrong_locale_is_skipped() {
        let voices = vec![voice("Samantha", "fr-FR"), voice("Daniel", "en-GB")];
        let chosen = select_optimal_voice(&voices, "en").unwrap();
        assert_eq!(chosen.name, "Daniel");
    }

    #[test]
    fn falls_back_to_female_sounding_voice() {
        let voices = vec![
            voice("Daniel", "en-GB"),
            voice("Hazel Desktop", "en-GB"),
            DeviceVoice::new("x", "Voice 3", "en-IE").with_gender(VoiceGender::Female),
        ];
        let chosen = select_optimal_voice(&voices, "en").unwrap();
        assert_eq!(chosen.name, "Hazel Desktop");
    }

    #[test]
    fn reported_gender_counts_as_female() {
        let voices = vec![
            voice("Daniel", "en-GB"),
            DeviceVoice::new("x", "Voice 3", "en_IE").with_gender(VoiceGender::Female),
        ];
        assert_eq!(select_optimal_voice(&voices, "en").unwrap().id, "x");
    }

    #[test]
    fn falls_back_to_first_locale_match() {
        let voices = vec![voice("Thomas", "fr-FR"), voice("Daniel", "en-GB"), voice("Fred", "en-US")];
        assert_eq!(select_optimal_voice(&voices, "en").unwrap().name, "Daniel");
    }

    #[test]
    fn none_when_no_locale_matches() {
        let voices = vec![voice("Thomas", "fr-FR")];
        assert!(select_optimal_voice(&voices, "en").is_none());
        assert!(select_optimal_voice(&[], "en").is_none());
    }

    #[test]
    fn find_voice_by_id_or_name() {
        let voices = vec![voice("Daniel", "en-GB"), voice("Fred", "en-US")];
        assert_eq!(find_voice(&voices, "fred").unwrap().name, "Fred");
        assert_eq!(find_voice(&voices, "DANIEL").unwrap().id, "daniel");
        assert!(find_voice(&voices, "nobody").is_none());
    }
}
