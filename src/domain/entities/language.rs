use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ar")]
    Arabic,
    #[default]
    Unknown,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Arabic => "ar",
            Self::Unknown => "unknown",
        }
    }

    /// Script-based detection over letters only.
    ///
    /// Text with fewer than three letters is `Unknown`; any other text is
    /// Arabic when Arabic letters dominate and English otherwise.
    pub fn detect(text: &str) -> Self {
        let (arabic, total) = text
            .chars()
            .filter(|c| c.is_alphabetic())
            .fold((0usize, 0usize), |(arabic, total), c| {
                (arabic + usize::from(is_arabic(c)), total + 1)
            });

        if total < 3 {
            Self::Unknown
        } else if arabic * 2 > total {
            Self::Arabic
        } else {
            Self::English
        }
    }
}

fn is_arabic(c: char) -> bool {
    matches!(c as u32, 0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF)
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
