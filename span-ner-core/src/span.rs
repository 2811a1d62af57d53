//! # Alinhamento Caractere -> Token
//!
//! Converte o intervalo de caracteres de uma entidade anotada em um intervalo de
//! **índices de token**.
//!
//! ## Algoritmo
//!
//! Em vez de procurar o token que contém cada offset, o alinhador re-tokeniza
//! pedaços do próprio texto:
//!
//! 1. `start_token` = número de tokens do prefixo `text[0..start]` (0 se `start == 0`).
//! 2. `end_token` = `start_token` + número de tokens de `text[start..end]`.
//!
//! Assim o alinhamento é exatamente consistente com a tokenização do texto
//! completo, ao custo de tokenizar uma vez por entidade. Isso só acontece no
//! treino; a inferência tokeniza uma única vez.
//!
//! Offsets de entidade são sempre contados em **caracteres** (code points), nunca
//! em bytes.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::SkipReason;
use crate::tokenizer::Tokenizer;

/// Intervalo de tokens `[start, end)` coberto por uma entidade.
///
/// # Exemplo
/// Em "Cap d'Agde" -> `["Cap", "d", "'", "Agde"]`, a entidade "d'Agde"
/// (caracteres 4..10) cobre `TokenSpan { start: 1, end: 4 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
    /// Índice do token inicial (inclusivo)
    pub start: usize,
    /// Índice do token final (exclusivo)
    pub end: usize,
}

impl TokenSpan {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Converte um offset de caractere em offset de byte.
///
/// `char_offset == número de caracteres` é aceito (fim do texto).
pub fn char_to_byte(text: &str, char_offset: usize) -> Option<usize> {
    text.char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .nth(char_offset)
}

/// Converte um offset de byte (em fronteira de caractere) em offset de caractere.
pub fn byte_to_char(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset.min(text.len())].chars().count()
}

/// Alinha spans de caracteres com a tokenização de um [`Tokenizer`].
#[derive(Debug, Clone, Copy)]
pub struct SpanAligner<'a> {
    tokenizer: &'a Tokenizer,
}

impl<'a> SpanAligner<'a> {
    pub fn new(tokenizer: &'a Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Calcula o intervalo de tokens da entidade `[start, end)` (em caracteres).
    ///
    /// `tokens` é a tokenização completa de `text`. Retorna um [`SkipReason`]
    /// quando os offsets não cabem no texto ou quando o intervalo calculado sai
    /// dos limites `0 <= start < end <= tokens.len()`.
    pub fn align(
        &self,
        text: &str,
        tokens: &[String],
        start: usize,
        end: usize,
    ) -> Result<TokenSpan, SkipReason> {
        let invalid = SkipReason::InvalidSpan { start, end };
        if start >= end {
            return Err(invalid);
        }
        let (Some(start_byte), Some(end_byte)) = (char_to_byte(text, start), char_to_byte(text, end))
        else {
            return Err(invalid);
        };

        let start_token = if start == 0 {
            0
        } else {
            self.tokenizer.tokenize(&text[..start_byte]).len()
        };
        let end_token = start_token + self.tokenizer.tokenize(&text[start_byte..end_byte]).len();

        if start_token < end_token && end_token <= tokens.len() {
            Ok(TokenSpan {
                start: start_token,
                end: end_token,
            })
        } else {
            Err(SkipReason::EntityMismatch { start, end })
        }
    }
}
