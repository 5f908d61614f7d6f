//! Cookie/consent dialog handling.
//!
//! Google shows a regulatory consent overlay in some jurisdictions before the
//! results are usable. [`ConsentResolver`] looks for a button whose label
//! matches one of the known phrases for the page language and clicks it,
//! preferring "accept" over "reject".

use serde::Serialize;
use tokio::time::Instant;

use crate::config::ConsentConfig;
use crate::page::{bounded, Element, PageSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentAction {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentOutcome {
    Accepted,
    Rejected,
    NotPresent,
}

impl From<ConsentAction> for ConsentOutcome {
    fn from(action: ConsentAction) -> Self {
        match action {
            ConsentAction::Accept => Self::Accepted,
            ConsentAction::Reject => Self::Rejected,
        }
    }
}

/// One row of the consent phrase table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentVariant {
    /// Primary language subtag, lowercase.
    pub lang: &'static str,
    pub phrases: &'static [&'static str],
    pub action: ConsentAction,
}

/// Known consent button labels. Accept rows come first so that, once the
/// table is filtered, acceptance is always preferred.
pub const CONSENT_VARIANTS: &[ConsentVariant] = &[
    ConsentVariant {
        lang: "en",
        phrases: &["Accept all", "I agree"],
        action: ConsentAction::Accept,
    },
    ConsentVariant {
        lang: "de",
        phrases: &["Alle akzeptieren", "Ich stimme zu", "Akzeptieren"],
        action: ConsentAction::Accept,
    },
    ConsentVariant {
        lang: "fr",
        phrases: &["Tout accepter", "J'accepte"],
        action: ConsentAction::Accept,
    },
    ConsentVariant {
        lang: "es",
        phrases: &["Aceptar todo", "Acepto"],
        action: ConsentAction::Accept,
    },
    ConsentVariant {
        lang: "it",
        phrases: &["Accetta tutto", "Accetto"],
        action: ConsentAction::Accept,
    },
    ConsentVariant {
        lang: "nl",
        phrases: &["Alles accepteren", "Ik ga akkoord"],
        action: ConsentAction::Accept,
    },
    ConsentVariant {
        lang: "en",
        phrases: &["Reject all"],
        action: ConsentAction::Reject,
    },
    ConsentVariant {
        lang: "de",
        phrases: &["Alle ablehnen", "Ablehnen"],
        action: ConsentAction::Reject,
    },
    ConsentVariant {
        lang: "fr",
        phrases: &["Tout refuser"],
        action: ConsentAction::Reject,
    },
    ConsentVariant {
        lang: "es",
        phrases: &["Rechazar todo"],
        action: ConsentAction::Reject,
    },
    ConsentVariant {
        lang: "it",
        phrases: &["Rifiuta tutto"],
        action: ConsentAction::Reject,
    },
    ConsentVariant {
        lang: "nl",
        phrases: &["Alles afwijzen"],
        action: ConsentAction::Reject,
    },
];

/// Languages with at least one row in [`CONSENT_VARIANTS`].
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "de", "fr", "es", "it", "nl"];

/// Rows to try for a language hint, in table order.
///
/// `"de-AT"` is treated as `"de"`. A missing or unknown hint returns the
/// whole table.
#[must_use]
pub fn variants_for(lang: Option<&str>) -> Vec<&'static ConsentVariant> {
    let primary = lang
        .and_then(|l| l.trim().split(['-', '_']).next())
        .map(str::to_ascii_lowercase)
        .filter(|l| !l.is_empty());

    let filtered: Vec<_> = match primary {
        Some(ref primary) => CONSENT_VARIANTS
            .iter()
            .filter(|v| v.lang == primary)
            .collect(),
        None => Vec::new(),
    };

    if filtered.is_empty() {
        CONSENT_VARIANTS.iter().collect()
    } else {
        filtered
    }
}

#[derive(Debug, Clone)]
pub struct ConsentResolver {
    config: ConsentConfig,
}

impl ConsentResolver {
    #[must_use]
    pub fn new(config: ConsentConfig) -> Self {
        Self { config }
    }

    /// Find and dismiss a consent dialog.
    ///
    /// Probes the page's buttons until `config.timeout` expires, always
    /// probing at least once. Never fails: a page without a dialog, a click
    /// that errors, or a page that never goes quiet after the click are all
    /// logged and absorbed.
    pub async fn resolve(&self, page: &dyn PageSurface, lang: Option<&str>) -> ConsentOutcome {
        let candidates = variants_for(lang);
        let deadline = Instant::now() + self.config.timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let probe_limit = remaining.max(self.config.poll_interval);

            match bounded("consent probe", probe_limit, page.query_by_role("button")).await {
                Ok(buttons) => {
                    if let Some(outcome) = self.try_candidates(page, &candidates, &buttons).await {
                        return outcome;
                    }
                }
                Err(e) => tracing::debug!(error = %e, "consent button probe failed"),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(remaining.min(self.config.poll_interval)).await;
        }

        tracing::debug!(lang = ?lang, "no consent dialog found");
        ConsentOutcome::NotPresent
    }

    async fn try_candidates(
        &self,
        page: &dyn PageSurface,
        candidates: &[&'static ConsentVariant],
        buttons: &[Element],
    ) -> Option<ConsentOutcome> {
        let text_match = self.config.text_match;

        for variant in candidates {
            for phrase in variant.phrases {
                let matching = buttons.iter().filter(|b| {
                    text_match.matches(&b.text, phrase)
                        || b.aria_label
                            .as_deref()
                            .is_some_and(|label| text_match.matches(label, phrase))
                });

                for button in matching {
                    let clicked = bounded(
                        "consent click",
                        self.config.click_timeout,
                        page.click(&button.handle),
                    )
                    .await;

                    if let Err(e) = clicked {
                        tracing::warn!(phrase, error = %e, "consent click failed, trying next candidate");
                        continue;
                    }

                    tracing::info!(
                        lang = variant.lang,
                        phrase,
                        action = ?variant.action,
                        "consent dialog dismissed"
                    );
                    self.settle(page).await;
                    return Some(variant.action.into());
                }
            }
        }
        None
    }

    async fn settle(&self, page: &dyn PageSurface) {
        let limit = self.config.network_idle_timeout;
        if let Err(e) = bounded("network idle", limit, page.wait_for_network_idle(limit)).await {
            tracing::warn!(error = %e, "page did not go quiet after consent click, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_language_has_accept_and_reject_rows() {
        for lang in SUPPORTED_LANGUAGES {
            let rows = variants_for(Some(lang));
            assert!(rows.iter().all(|v| v.lang == *lang), "leaked rows for {lang}");
            assert!(rows.iter().any(|v| v.action == ConsentAction::Accept));
            assert!(rows.iter().any(|v| v.action == ConsentAction::Reject));
            assert!(rows.iter().all(|v| !v.phrases.is_empty()));
        }
    }

    #[test]
    fn accept_rows_precede_reject_rows() {
        let rows = variants_for(None);
        let first_reject = rows
            .iter()
            .position(|v| v.action == ConsentAction::Reject)
            .unwrap();
        assert!(rows[first_reject..]
            .iter()
            .all(|v| v.action == ConsentAction::Reject));
    }

    #[test]
    fn region_subtag_is_ignored() {
        let rows = variants_for(Some("DE-at"));
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|v| v.lang == "de"));
    }

    #[test]
    fn unknown_or_missing_language_uses_whole_table() {
        assert_eq!(variants_for(Some("ja")).len(), CONSENT_VARIANTS.len());
        assert_eq!(variants_for(None).len(), CONSENT_VARIANTS.len());
        assert_eq!(variants_for(Some("")).len(), CONSENT_VARIANTS.len());
    }

    #[test]
    fn supported_languages_match_table() {
        for variant in CONSENT_VARIANTS {
            assert!(SUPPORTED_LANGUAGES.contains(&variant.lang));
        }
    }
}
