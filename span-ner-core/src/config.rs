//! # Configuração
//!
//! A configuração é um conjunto de structs `serde` com valores padrão sensatos,
//! que podem ser lidas de JSON:
//!
//! ```rust
//! use span_ner_core::config::NlpConfiguration;
//!
//! let config = NlpConfiguration::from_json(r#"{
//!     "tokenizer": { "language": "en_US", "separators": "-,/" }
//! }"#).unwrap();
//! assert_eq!(config.tokenizer.separator_list(), vec!["-", "/"]);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Separadores padrão: hífen, apóstrofo, barra e underscore.
pub const DEFAULT_SEPARATORS: &str = "-,',/,_";

/// Idioma padrão das aplicações.
pub const DEFAULT_LANGUAGE: &str = "fr";

/// Configuração do tokenizador.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenizerConfig {
    /// Código de idioma ou locale (`"fr"`, `"en_US"`, `"es-ES"`).
    pub language: String,
    /// Separadores de sub-tokens, separados por vírgula (`\,` para uma vírgula literal).
    pub separators: String,
}

impl TokenizerConfig {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }

    pub fn with_separators(mut self, separators: impl Into<String>) -> Self {
        self.separators = separators.into();
        self
    }

    /// Separadores já decodificados, na ordem em que foram declarados.
    pub fn separator_list(&self) -> Vec<String> {
        parse_separators(&self.separators)
    }
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            separators: DEFAULT_SEPARATORS.to_string(),
        }
    }
}

/// O que fazer quando duas entidades anotadas cobrem o mesmo token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Descarta a expressão inteira com um aviso.
    #[default]
    Reject,
    /// A última entidade processada fica com o token (com aviso).
    LastWins,
}

/// Configuração do codificador de rótulos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    pub overlap_policy: OverlapPolicy,
}

/// Configuração completa de uma aplicação NLP.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NlpConfiguration {
    pub tokenizer: TokenizerConfig,
    pub encoder: EncoderConfig,
}

impl NlpConfiguration {
    /// Lê a configuração de um documento JSON. Campos ausentes assumem o padrão.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn for_language(language: impl Into<String>) -> Self {
        Self {
            tokenizer: TokenizerConfig::new(language),
            ..Self::default()
        }
    }
}

/// Decodifica a lista de separadores.
///
/// As entradas são separadas por vírgulas; `\,` representa uma vírgula literal.
/// Entradas vazias são ignoradas.
pub fn parse_separators(raw: &str) -> Vec<String> {
    let mut separators = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&',') => {
                chars.next();
                current.push(',');
            }
            ',' => {
                if !current.is_empty() {
                    separators.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        separators.push(current);
    }
    separators
}
