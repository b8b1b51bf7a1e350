use std::fmt::Display;

use anyhow::{Result, bail};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Local,
    Staging,
    Production,
}

impl Stage {
    pub fn is_production(&self) -> bool {
        matches!(self, Stage::Production)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            Stage::Local => "Local",
            Stage::Staging => "Staging",
            Stage::Production => "Production",
        };

        write!(f, "{}", stage)
    }
}

impl TryFrom<&String> for Stage {
    type Error = anyhow::Error;

    fn try_from(value: &String) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "" => Ok(Stage::Local),
            "staging" => Ok(Stage::Staging),
            "production" | "prod" => Ok(Stage::Production),
            _ => bail!("Invalid stage: {value}"),
        }
    }
}
