//! # Erros do Reconhecedor
//!
//! Dois níveis de falha convivem no sistema:
//!
//! - **Falhas por item** ([`SkipReason`]): uma expressão malformada é descartada
//!   do corpus com um aviso e o lote continua.
//! - **Falhas fatais** ([`NerError`]): propagadas ao chamador. Na prática só o
//!   treinamento do rotulador falha de forma ruidosa.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Alias de resultado usado em todo o crate.
pub type Result<T, E = NerError> = std::result::Result<T, E>;

/// Erro principal do crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NerError {
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// O rotulador externo falhou durante a predição.
    #[error("Tagger error: {0}")]
    Tagger(String),

    /// O rotulador externo falhou durante o treinamento.
    #[error("Training error: {0}")]
    Training(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Linha do formato `token<TAB>rótulo` inválida.
    #[error("Wire format error at line {line}: {message}")]
    WireFormat { line: usize, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NerError {
    pub fn tagger(msg: impl Into<String>) -> Self {
        NerError::Tagger(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        NerError::Training(msg.into())
    }

    pub fn decoding(msg: impl Into<String>) -> Self {
        NerError::Decoding(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        NerError::Configuration(msg.into())
    }
}

/// Motivo pelo qual uma expressão de treino foi descartada do corpus.
///
/// Nenhum desses casos interrompe o lote: a expressão simplesmente não aparece
/// no texto de treino.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// O texto contém `\t` ou `\n`, que o formato de linhas não representa.
    BannedCharacter,
    /// O intervalo de tokens calculado para uma entidade sai dos limites.
    EntityMismatch { start: usize, end: usize },
    /// Offsets de caracteres inválidos (fim antes do início ou além do texto).
    InvalidSpan { start: usize, end: usize },
    /// Duas entidades anotadas reivindicam o mesmo token.
    OverlappingEntities { token: usize },
    /// O texto não produziu nenhum token.
    EmptyTokenization,
    /// Papel vazio, reservado (`O`, prefixo `<ADJ>`) ou com `\t` / `\n`.
    InvalidRole { role: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::BannedCharacter => write!(f, "contains \\n or \\t"),
            SkipReason::EntityMismatch { start, end } => {
                write!(f, "entity mismatch for span {start}..{end}")
            }
            SkipReason::InvalidSpan { start, end } => {
                write!(f, "invalid character span {start}..{end}")
            }
            SkipReason::OverlappingEntities { token } => {
                write!(f, "overlapping entities on token {token}")
            }
            SkipReason::EmptyTokenization => write!(f, "no token"),
            SkipReason::InvalidRole { role } => write!(f, "invalid role {role:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::BannedCharacter.to_string(), "contains \\n or \\t");
        assert_eq!(
            SkipReason::EntityMismatch { start: 2, end: 9 }.to_string(),
            "entity mismatch for span 2..9"
        );
        assert_eq!(
            SkipReason::InvalidRole { role: "O".to_string() }.to_string(),
            "invalid role \"O\""
        );
    }

    #[test]
    fn test_skip_reason_serializes_with_tag() {
        let json = serde_json::to_string(&SkipReason::OverlappingEntities { token: 3 }).unwrap();
        assert_eq!(json, r#"{"reason":"overlapping_entities","token":3}"#);
    }
}
