use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    OpenAi,
    Azure,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub enabled: bool,
    pub provider: LlmProviderKind,
    pub api_key: String,
    pub api_host: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: LlmProviderKind::OpenAi,
            api_key: String::new(),
            api_host: "https://api.openai.com/v1".to_owned(),
            model: "gpt-3.5-turbo".to_owned(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

impl LlmSettings {
    pub fn is_configured(&self) -> bool {
        self.enabled
            && !self.api_key.trim().is_empty()
            && !self.api_host.trim().is_empty()
            && !self.model.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_not_configured() {
        let settings = LlmSettings::default();
        assert!(!settings.is_configured());

        let configured = LlmSettings {
            enabled: true,
            api_key: "sk-test".to_owned(),
            ..LlmSettings::default()
        };
        assert!(configured.is_configured());

        let blank_key = LlmSettings {
            enabled: true,
            api_key: "   ".to_owned(),
            ..LlmSettings::default()
        };
        assert!(!blank_key.is_configured());
    }
}
