/// Dialect of the native language a header is written in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LanguageVariant {
    C,
    #[default]
    Cxx,
}

impl LanguageVariant {
    /// Whether namespaces, classes and templates are available.
    pub fn is_cxx(self) -> bool {
        matches!(self, LanguageVariant::Cxx)
    }

    /// File extension used for the synthetic wrapper unit.
    pub fn unit_extension(self) -> &'static str {
        match self {
            LanguageVariant::C => "c",
            LanguageVariant::Cxx => "cc",
        }
    }
}

impl std::str::FromStr for LanguageVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" | "C" => Ok(LanguageVariant::C),
            "c++" | "cxx" | "C++" | "cpp" => Ok(LanguageVariant::Cxx),
            other => Err(format!("unknown language variant: {other}")),
        }
    }
}
