//! Fixed confidence thresholds and the secondary name check for
//! medium-confidence candidates.
//!
//! | confidence          | status                                  |
//! |---------------------|-----------------------------------------|
//! | `>= 0.8`            | `Applied`                               |
//! | `0.5 <= c < 0.8`    | `Validated` if [`validate_candidate`] passes, else `Skipped` |
//! | `< 0.5`             | `Skipped`                               |
//!
//! Non-finite or out-of-range confidences are `Skipped`.

use std::fmt;

use crate::enrichment::{EnrichmentCandidate, EnrichmentStatus};

pub const APPLY_THRESHOLD: f64 = 0.8;
pub const VALIDATE_THRESHOLD: f64 = 0.5;
pub const MAX_NAME_CHARS: usize = 100;

/// Reason a candidate name failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    Blank,
    TooLong,
    NoLetters,
    ControlCharacter,
    NotLatinScript,
    EchoesRegionId,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Blank => "name is blank",
            Self::TooLong => "name exceeds maximum length",
            Self::NoLetters => "name has no letters",
            Self::ControlCharacter => "name contains control characters",
            Self::NotLatinScript => "English name is not in Latin script",
            Self::EchoesRegionId => "name repeats the region id",
        };
        f.write_str(msg)
    }
}

/// Classify a candidate by confidence, validating medium-band names.
pub fn evaluate(candidate: &EnrichmentCandidate) -> EnrichmentStatus {
    let c = candidate.confidence;
    if !c.is_finite() || !(0.0..=1.0).contains(&c) {
        return EnrichmentStatus::Skipped;
    }
    if c >= APPLY_THRESHOLD {
        EnrichmentStatus::Applied
    } else if c >= VALIDATE_THRESHOLD {
        match validate_candidate(candidate) {
            Ok(()) => EnrichmentStatus::Validated,
            Err(_) => EnrichmentStatus::Skipped,
        }
    } else {
        EnrichmentStatus::Skipped
    }
}

/// Heuristic check that both proposed names look like real place names.
pub fn validate_candidate(candidate: &EnrichmentCandidate) -> Result<(), ValidationIssue> {
    check_common(&candidate.name_en)?;
    check_common(&candidate.name_local)?;

    if !candidate.name_en.trim().chars().all(is_latin_name_char) {
        return Err(ValidationIssue::NotLatinScript);
    }

    let id = candidate.region_id.trim();
    if candidate.name_local.trim().eq_ignore_ascii_case(id)
        || candidate.name_en.trim().eq_ignore_ascii_case(id)
    {
        return Err(ValidationIssue::EchoesRegionId);
    }
    Ok(())
}

fn check_common(name: &str) -> Result<(), ValidationIssue> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationIssue::Blank);
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationIssue::TooLong);
    }
    if name.chars().any(char::is_control) {
        return Err(ValidationIssue::ControlCharacter);
    }
    if !name.chars().any(char::is_alphabetic) {
        return Err(ValidationIssue::NoLetters);
    }
    Ok(())
}

fn is_latin_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, ' ' | '-' | '\'' | '.' | ',' | '(' | ')' | '/' | '\u{2019}')
        || (('\u{00C0}'..='\u{024F}').contains(&c) && c != '\u{00D7}' && c != '\u{00F7}')
        || ('\u{1E00}'..='\u{1EFF}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(confidence: f64) -> EnrichmentCandidate {
        EnrichmentCandidate {
            region_id: "KOR-ADM2-123".into(),
            name_en: "Jongno-gu".into(),
            name_local: "종로구".into(),
            confidence,
            reasoning: None,
        }
    }

    #[test]
    fn threshold_boundaries() {
        assert_eq!(evaluate(&candidate(0.8)), EnrichmentStatus::Applied);
        assert_eq!(evaluate(&candidate(1.0)), EnrichmentStatus::Applied);
        assert_eq!(evaluate(&candidate(0.79999)), EnrichmentStatus::Validated);
        assert_eq!(evaluate(&candidate(0.5)), EnrichmentStatus::Validated);
        assert_eq!(evaluate(&candidate(0.49999)), EnrichmentStatus::Skipped);
        assert_eq!(evaluate(&candidate(0.0)), EnrichmentStatus::Skipped);
    }

    #[test]
    fn decoded_confidence_just_below_threshold_keeps_its_band() {
        let decode = |confidence: &str| -> EnrichmentCandidate {
            serde_json::from_str(&format!(
                r#"{{"region_id":"KOR-ADM2-123","name_en":"Jongno-gu","name_local":"종로구","confidence":{confidence}}}"#
            ))
            .unwrap()
        };
        assert_eq!(evaluate(&decode("0.49999999")), EnrichmentStatus::Skipped);
        assert_eq!(evaluate(&decode("0.79999999")), EnrichmentStatus::Validated);
        assert_eq!(evaluate(&decode("0.5")), EnrichmentStatus::Validated);
        assert_eq!(evaluate(&decode("0.8")), EnrichmentStatus::Applied);
    }

    #[test]
    fn invalid_confidence_is_skipped() {
        assert_eq!(evaluate(&candidate(f64::NAN)), EnrichmentStatus::Skipped);
        assert_eq!(evaluate(&candidate(1.5)), EnrichmentStatus::Skipped);
        assert_eq!(evaluate(&candidate(-0.1)), EnrichmentStatus::Skipped);
    }

    #[test]
    fn medium_band_failing_validation_is_downgraded() {
        let mut c = candidate(0.6);
        c.name_en = "종로구".into();
        assert_eq!(evaluate(&c), EnrichmentStatus::Skipped);
    }

    #[test]
    fn high_band_skips_validation() {
        let mut c = candidate(0.9);
        c.name_en = "".into();
        assert_eq!(evaluate(&c), EnrichmentStatus::Applied);
    }

    #[test]
    fn validation_rules() {
        let ok = candidate(0.6);
        assert_eq!(validate_candidate(&ok), Ok(()));

        let mut c = ok.clone();
        c.name_local = "   ".into();
        assert_eq!(validate_candidate(&c), Err(ValidationIssue::Blank));

        let mut c = ok.clone();
        c.name_en = "12345".into();
        assert_eq!(validate_candidate(&c), Err(ValidationIssue::NoLetters));

        let mut c = ok.clone();
        c.name_en = "a".repeat(MAX_NAME_CHARS + 1);
        assert_eq!(validate_candidate(&c), Err(ValidationIssue::TooLong));

        let mut c = ok.clone();
        c.name_local = "종로\n구".into();
        assert_eq!(validate_candidate(&c), Err(ValidationIssue::ControlCharacter));

        let mut c = ok.clone();
        c.name_local = "kor-adm2-123".into();
        assert_eq!(validate_candidate(&c), Err(ValidationIssue::EchoesRegionId));
    }

    #[test]
    fn latin_script_accepts_diacritics() {
        let mut c = candidate(0.6);
        c.name_en = "Île-de-France".into();
        assert_eq!(validate_candidate(&c), Ok(()));
        c.name_en = "Ciudad Juárez (Chihuahua)".into();
        assert_eq!(validate_candidate(&c), Ok(()));
        c.name_en = "Москва".into();
        assert_eq!(validate_candidate(&c), Err(ValidationIssue::NotLatinScript));
    }
}
