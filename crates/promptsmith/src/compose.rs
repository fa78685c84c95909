//! Prompt composition: the fixed form catalogs and the instruction template.
//!
//! [`compose`] is pure. It embeds the three form values verbatim into a
//! fixed template, so identical inputs always produce byte-identical
//! instructions. The catalogs ([`PromptStyle`], [`UseCase`]) describe what
//! the form offers; `compose` itself accepts any label.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ComposeError;

/// Build the instruction sent to the generation endpoint.
///
/// # Example
///
/// ```
/// use promptsmith::compose::compose;
///
/// let text = compose("A cat cafe launch", "Creative", "Marketing");
/// assert!(text.contains("Topic/Context: A cat cafe launch\n"));
/// assert!(text.ends_with("The result should be a ready-to-use AI prompt."));
/// ```
pub fn compose(topic: &str, style: &str, use_case: &str) -> String {
    format!(
        "Generate a high-quality AI prompt based on the following details:\n\n\
         Topic/Context: {topic}\n\
         Prompt Style: {style}\n\
         Target Use-case: {use_case}\n\n\
         The result should be a ready-to-use AI prompt."
    )
}

/// Whether a topic is blank once surrounding whitespace is removed.
pub fn is_blank(topic: &str) -> bool {
    topic.trim().is_empty()
}

// ── Catalogs ───────────────────────────────────────────────────────

/// Generates the label table, `Display`, `FromStr` and serde impls for a
/// fixed catalog enum. Serde uses the human label on the wire.
macro_rules! catalog {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Every entry, in the order the form presents them.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Label shown in the form and embedded in the instruction.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// All labels in catalog order.
            pub fn labels() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.label()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label() == s)
                    .ok_or_else(|| format!("unknown {}: {s}", $kind))
            }
        }
    };
}

catalog! {
    /// Prompt style offered by the form.
    PromptStyle, "prompt style" {
        Creative => "Creative",
        Instructional => "Instructional",
        Descriptive => "Descriptive",
        Conversational => "Conversational",
        Storytelling => "Storytelling",
        Analytical => "Analytical",
    }
}

catalog! {
    /// Target use-case offered by the form.
    UseCase, "use-case" {
        ImageGeneration => "Image Generation",
        EmailWriting => "Email Writing",
        Coding => "Coding",
        Marketing => "Marketing",
        Education => "Education",
        SocialMedia => "Social Media",
        BusinessAnalysis => "Business Analysis",
        CustomerSupport => "Customer Support",
        Gaming => "Gaming",
        Other => "Other",
    }
}

impl Default for PromptStyle {
    fn default() -> Self {
        PromptStyle::Creative
    }
}

impl Default for UseCase {
    fn default() -> Self {
        UseCase::ImageGeneration
    }
}

// ── Request ────────────────────────────────────────────────────────

/// The three form values captured at the moment of a Generate/Regenerate.
///
/// Immutable once built. The topic is kept exactly as typed; only the
/// blank check trims it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    topic: String,
    style: String,
    use_case: String,
}

impl GenerationRequest {
    pub fn new(
        topic: impl Into<String>,
        style: impl Into<String>,
        use_case: impl Into<String>,
    ) -> Result<Self, ComposeError> {
        let topic = topic.into();
        if is_blank(&topic) {
            return Err(ComposeError::EmptyTopic);
        }
        Ok(Self {
            topic,
            style: style.into(),
            use_case: use_case.into(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn use_case(&self) -> &str {
        &self.use_case
    }

    /// The composed instruction for this request.
    pub fn instruction(&self) -> String {
        compose(&self.topic, &self.style, &self.use_case)
    }
}
