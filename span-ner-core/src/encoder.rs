//! # Codificador de Rótulos
//!
//! Converte expressões anotadas (entidades como intervalos de caracteres) em
//! uma sequência de rótulos, um por token, pronta para treinar o rotulador.
//!
//! ## Política de Rótulos
//!
//! Para cada token `i`:
//!
//! 1. Nenhuma entidade reivindica o token: `O`.
//! 2. A entidade `E` já recebeu um rótulo nesta expressão: reutiliza o rótulo.
//! 3. Primeiro token de `E`: se o token `i-1` pertence a **outra** entidade e
//!    seu rótulo é exatamente `E.role`, o rótulo é `<ADJ>role`; senão `role`.
//!
//! Uma entidade é sempre rotulada de forma uniforme. Três entidades coladas de
//! mesmo papel alternam `role`, `<ADJ>role`, `role`: a fronteira continua
//! visível para o decodificador.
//!
//! ## Falhas
//!
//! Uma expressão inválida vira [`ExpressionOutcome::Skipped`] com o motivo e
//! um aviso no log; o lote nunca é interrompido.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::config::{EncoderConfig, NlpConfiguration, OverlapPolicy};
use crate::corpus;
use crate::error::SkipReason;
use crate::model::SampleExpression;
use crate::span::SpanAligner;
use crate::tagger::{is_valid_role, Label};
use crate::tokenizer::Tokenizer;

/// Uma expressão codificada: tokens e rótulos de mesmo comprimento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedExpression {
    pub tokens: Vec<String>,
    pub labels: Vec<Label>,
}

impl EncodedExpression {
    /// Pares `(token, rótulo)` no formato textual.
    pub fn lines(&self) -> Vec<(String, String)> {
        self.tokens
            .iter()
            .zip(&self.labels)
            .map(|(token, label)| (token.clone(), label.label()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Resultado da codificação de uma expressão.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionOutcome {
    Encoded(EncodedExpression),
    Skipped(SkipReason),
}

/// Expressão descartada de um lote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedExpression {
    /// Posição da expressão no lote de entrada.
    pub index: usize,
    pub text: String,
    pub reason: SkipReason,
}

/// Corpus de treino: blocos emitidos, na ordem de entrada, e descartes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingCorpus {
    pub blocks: Vec<EncodedExpression>,
    pub skipped: Vec<SkippedExpression>,
}

impl TrainingCorpus {
    /// Texto de treino no formato de linhas.
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            let lines = block.lines();
            corpus::write_block(&mut out, lines.iter().map(|(t, l)| (t.as_str(), l.as_str())));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Atribui um rótulo a cada token.
///
/// `claims[i]` é o índice da entidade que reivindica o token `i`, e
/// `roles[e]` o papel da entidade `e`.
pub fn assign_labels(claims: &[Option<usize>], roles: &[&str]) -> Vec<Label> {
    let mut assigned: Vec<Option<Label>> = vec![None; roles.len()];
    let mut labels: Vec<Label> = Vec::with_capacity(claims.len());

    for (i, claim) in claims.iter().enumerate() {
        let label = match *claim {
            None => Label::Outside,
            Some(entity) => match &assigned[entity] {
                Some(label) => label.clone(),
                None => {
                    let role = roles[entity];
                    let follows_same_role = i > 0
                        && claims[i - 1].is_some_and(|previous| previous != entity)
                        && matches!(&labels[i - 1], Label::Role(previous) if previous == role);
                    let label = if follows_same_role {
                        Label::Adjacent(role.to_string())
                    } else {
                        Label::Role(role.to_string())
                    };
                    assigned[entity] = Some(label.clone());
                    label
                }
            },
        };
        labels.push(label);
    }
    labels
}

/// Codificador de expressões de treino.
#[derive(Debug, Clone, Default)]
pub struct LabelEncoder {
    tokenizer: Tokenizer,
    config: EncoderConfig,
}

impl LabelEncoder {
    pub fn new(tokenizer: Tokenizer, config: EncoderConfig) -> Self {
        Self { tokenizer, config }
    }

    pub fn from_configuration(configuration: &NlpConfiguration) -> Self {
        Self::new(Tokenizer::new(&configuration.tokenizer), configuration.encoder)
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Codifica uma expressão.
    pub fn encode_expression(&self, expression: &SampleExpression) -> ExpressionOutcome {
        match self.try_encode(expression) {
            Ok(encoded) => {
                trace!(block = ?encoded.lines(), "encoded expression");
                ExpressionOutcome::Encoded(encoded)
            }
            Err(reason) => {
                warn!(text = %expression.text, %reason, "expression skipped");
                ExpressionOutcome::Skipped(reason)
            }
        }
    }

    /// Codifica um lote em paralelo, preservando a ordem de entrada.
    pub fn encode_batch(&self, expressions: &[SampleExpression]) -> TrainingCorpus {
        let outcomes: Vec<ExpressionOutcome> = expressions
            .par_iter()
            .map(|expression| self.encode_expression(expression))
            .collect();

        let mut corpus = TrainingCorpus::default();
        for (index, (expression, outcome)) in expressions.iter().zip(outcomes).enumerate() {
            match outcome {
                ExpressionOutcome::Encoded(block) => corpus.blocks.push(block),
                ExpressionOutcome::Skipped(reason) => corpus.skipped.push(SkippedExpression {
                    index,
                    text: expression.text.clone(),
                    reason,
                }),
            }
        }
        corpus
    }

    fn try_encode(&self, expression: &SampleExpression) -> Result<EncodedExpression, SkipReason> {
        let text = expression.text.as_str();
        if text.contains(['\n', '\t']) {
            return Err(SkipReason::BannedCharacter);
        }

        if let Some(sample) = expression.entities.iter().find(|e| !is_valid_role(e.role())) {
            return Err(SkipReason::InvalidRole {
                role: sample.role().to_string(),
            });
        }

        let tokens = self.tokenizer.tokenize(text);
        if tokens.is_empty() {
            return Err(SkipReason::EmptyTokenization);
        }

        let aligner = SpanAligner::new(&self.tokenizer);
        let mut claims: Vec<Option<usize>> = vec![None; tokens.len()];
        for (entity, sample) in expression.entities.iter().enumerate() {
            let span = aligner.align(text, &tokens, sample.start, sample.end)?;
            for token in span.range() {
                if claims[token].is_some() {
                    match self.config.overlap_policy {
                        OverlapPolicy::Reject => {
                            return Err(SkipReason::OverlappingEntities { token });
                        }
                        OverlapPolicy::LastWins => {
                            warn!(text, token, role = sample.role(), "overlapping entities, last one wins");
                        }
                    }
                }
                claims[token] = Some(entity);
            }
        }

        let roles: Vec<&str> = expression.entities.iter().map(|e| e.role()).collect();
        let labels = assign_labels(&claims, &roles);
        Ok(EncodedExpression { tokens, labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, SampleEntity};

    fn entity(role: &str, start: usize, end: usize) -> SampleEntity {
        SampleEntity::new(Entity::new("datetime", role), start, end)
    }

    fn wire(expressions: Vec<SampleExpression>) -> Vec<String> {
        let corpus = LabelEncoder::default().encode_batch(&expressions);
        corpus.to_wire().split('\n').map(str::to_string).collect()
    }

    #[test]
    fn test_two_roles() {
        let lines = wire(vec![SampleExpression::new(
            "11/11 au 12/11",
            vec![entity("a", 0, 5), entity("b", 9, 14)],
        )]);
        assert_eq!(
            lines,
            vec!["11\ta", "/\ta", "11\ta", "au\tO", "12\tb", "/\tb", "11\tb", "", ""]
        );
    }

    #[test]
    fn test_second_expression_block() {
        let lines = wire(vec![
            SampleExpression::new("11/11 au 12/11", vec![entity("a", 0, 5), entity("b", 9, 14)]),
            SampleExpression::new("ok", vec![]),
        ]);
        assert_eq!(lines[7..], ["", "ok\tO", "", ""]);
    }

    #[test]
    fn test_adjacent_same_role_is_marked() {
        let lines = wire(vec![SampleExpression::new(
            "11/11 12/11",
            vec![entity("date", 0, 5), entity("date", 6, 11)],
        )]);
        assert_eq!(
            lines,
            vec![
                "11\tdate",
                "/\tdate",
                "11\tdate",
                "12\t<ADJ>date",
                "/\t<ADJ>date",
                "11\t<ADJ>date",
                "",
                ""
            ]
        );
    }

    #[test]
    fn test_separated_same_role_is_not_marked() {
        let lines = wire(vec![SampleExpression::new(
            "11/11 au 12/11",
            vec![entity("date", 0, 5), entity("date", 9, 14)],
        )]);
        assert_eq!(lines[4], "12\tdate");
    }

    #[test]
    fn test_marker_alternates_for_three_entities() {
        let claims = [Some(0), Some(1), Some(1), Some(2)];
        let labels = assign_labels(&claims, &["d", "d", "d"]);
        assert_eq!(
            labels,
            vec![
                Label::Role("d".into()),
                Label::Adjacent("d".into()),
                Label::Adjacent("d".into()),
                Label::Role("d".into()),
            ]
        );
    }

    #[test]
    fn test_different_roles_are_never_marked() {
        let labels = assign_labels(&[Some(0), Some(1)], &["from", "to"]);
        assert_eq!(labels, vec![Label::Role("from".into()), Label::Role("to".into())]);
    }

    #[test]
    fn test_banned_characters() {
        let encoder = LabelEncoder::default();
        let outcome = encoder.encode_expression(&SampleExpression::new("a\tb", vec![]));
        assert_eq!(outcome, ExpressionOutcome::Skipped(SkipReason::BannedCharacter));
        let outcome = encoder.encode_expression(&SampleExpression::new("a\nb", vec![]));
        assert_eq!(outcome, ExpressionOutcome::Skipped(SkipReason::BannedCharacter));
    }

    #[test]
    fn test_reserved_or_malformed_roles_are_skipped() {
        let encoder = LabelEncoder::default();
        for role in ["O", "<ADJ>city", "ci\nty", "ci\tty", ""] {
            let expression = SampleExpression::new("à Lyon", vec![entity(role, 2, 6)]);
            assert_eq!(
                encoder.encode_expression(&expression),
                ExpressionOutcome::Skipped(SkipReason::InvalidRole {
                    role: role.to_string()
                }),
                "role {role:?}"
            );
        }
    }

    #[test]
    fn test_invalid_role_does_not_break_training_data() {
        let expressions = vec![
            SampleExpression::new("à Lyon", vec![entity("ci\nty", 2, 6)]),
            SampleExpression::new("à Nice", vec![entity("city", 2, 6)]),
        ];
        let corpus = LabelEncoder::default().encode_batch(&expressions);
        assert_eq!(corpus.to_wire(), "à\tO\nNice\tcity\n\n");
        assert_eq!(corpus.skipped[0].index, 0);
        let blocks = crate::corpus::parse_blocks(&corpus.to_wire()).unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_blank_expression_is_skipped() {
        let outcome = LabelEncoder::default().encode_expression(&SampleExpression::new("  ", vec![]));
        assert_eq!(outcome, ExpressionOutcome::Skipped(SkipReason::EmptyTokenization));
    }

    #[test]
    fn test_bad_span_is_skipped_and_siblings_survive() {
        let expressions = vec![
            SampleExpression::new("Paris", vec![entity("city", 0, 40)]),
            SampleExpression::new("a\tb", vec![]),
            SampleExpression::new("Lyon", vec![entity("city", 0, 4)]),
        ];
        let corpus = LabelEncoder::default().encode_batch(&expressions);
        assert_eq!(corpus.blocks.len(), 1);
        assert_eq!(corpus.to_wire(), "Lyon\tcity\n\n");
        let skipped: Vec<usize> = corpus.skipped.iter().map(|s| s.index).collect();
        assert_eq!(skipped, vec![0, 1]);
        assert_eq!(corpus.skipped[0].reason, SkipReason::InvalidSpan { start: 0, end: 40 });
    }

    #[test]
    fn test_overlap_rejected_by_default() {
        let expression = SampleExpression::new("Cap d'Agde", vec![entity("city", 0, 10), entity("town", 4, 10)]);
        let outcome = LabelEncoder::default().encode_expression(&expression);
        assert_eq!(outcome, ExpressionOutcome::Skipped(SkipReason::OverlappingEntities { token: 1 }));
    }

    #[test]
    fn test_overlap_last_wins() {
        let expression = SampleExpression::new("Cap d'Agde", vec![entity("city", 0, 10), entity("town", 4, 10)]);
        let encoder = LabelEncoder::new(
            Tokenizer::default(),
            EncoderConfig {
                overlap_policy: OverlapPolicy::LastWins,
            },
        );
        let ExpressionOutcome::Encoded(encoded) = encoder.encode_expression(&expression) else {
            panic!("expression should be encoded");
        };
        let labels: Vec<String> = encoded.labels.iter().map(Label::label).collect();
        assert_eq!(labels, vec!["city", "town", "town", "town"]);
    }

    #[test]
    fn test_encoder_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LabelEncoder>();
        assert_send_sync::<crate::decoder::LabelDecoder>();
    }

    #[test]
    fn test_batch_preserves_order() {
        let expressions: Vec<SampleExpression> = (0..50)
            .map(|i| SampleExpression::new(format!("ville{i}"), vec![]))
            .collect();
        let corpus = LabelEncoder::default().encode_batch(&expressions);
        assert_eq!(corpus.blocks.len(), 50);
        assert_eq!(corpus.blocks[7].tokens, vec!["ville", "7"]);
    }
}
