//! # Decodificador de Rótulos
//!
//! Caminho inverso do [`crate::encoder`]: a partir dos rótulos previstos pelo
//! rotulador, reconstrói as entidades como intervalos de caracteres do texto
//! original.
//!
//! ## Agrupamento
//!
//! Os tokens são percorridos da esquerda para a direita:
//!
//! - `O` fecha a entidade aberta;
//! - um rótulo **idêntico** ao da entidade aberta (marcador incluído) a estende;
//! - qualquer outro rótulo fecha a entidade aberta e abre uma nova.
//!
//! Assim `date date <ADJ>date` produz duas entidades: a passagem de `date`
//! para `<ADJ>date` é a fronteira que o codificador introduziu.
//!
//! ## Offsets
//!
//! Tokens não são únicos no texto ("11/11" tem dois "11"). Cada token é
//! procurado a partir de um cursor que avança a cada token encontrado, nunca
//! do início do texto.
//!
//! ## Confiança
//!
//! Um único valor por chamada: `round(1000 * (1 - média das marginais)) / 1000`.
//! Se o cálculo falhar, vale [`FALLBACK_CONFIDENCE`].

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{NerError, Result};
use crate::model::{EntityCallContext, EntityRecognition, EntityValue};
use crate::span::byte_to_char;
use crate::tagger::{Label, Marginals, OUTSIDE};

/// Confiança reportada quando as marginais não podem ser usadas.
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

/// Entidade decodificada: intervalo de caracteres `[start, end)` e papel (sem marcador).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodedEntity {
    pub start: usize,
    pub end: usize,
    pub role: String,
}

/// Calcula a confiança de uma sequência de rótulos.
///
/// Sequência vazia: média 1.0, confiança 0.0.
pub fn confidence(labels: &[String], marginals: &dyn Marginals) -> f64 {
    match average_marginal(labels, marginals) {
        Ok(average) => ((1000.0 * (1.0 - average)).round() / 1000.0).clamp(0.0, 1.0),
        Err(e) => {
            error!("unable to compute confidence: {e}");
            FALLBACK_CONFIDENCE
        }
    }
}

fn average_marginal(labels: &[String], marginals: &dyn Marginals) -> Result<f64> {
    if labels.is_empty() {
        return Ok(1.0);
    }
    let mut sum = 0.0;
    for (position, label) in labels.iter().enumerate() {
        let p = marginals.probability(position, label)?;
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(NerError::decoding(format!(
                "marginal {p} at position {position} is not a probability"
            )));
        }
        sum += p;
    }
    Ok(sum / labels.len() as f64)
}

/// Posição de cada token no texto, em caracteres. `None` se o token não foi
/// encontrado depois do cursor.
fn locate_tokens(text: &str, tokens: &[String]) -> Vec<Option<(usize, usize)>> {
    let mut cursor = 0;
    tokens
        .iter()
        .map(|token| {
            let start = cursor + text[cursor..].find(token.as_str())?;
            cursor = start + token.len();
            Some((byte_to_char(text, start), byte_to_char(text, cursor)))
        })
        .collect()
}

/// Decodificador de rótulos previstos.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelDecoder;

impl LabelDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Reconstrói as entidades e calcula a confiança da sequência.
    ///
    /// `labels[i]` é o rótulo previsto para `tokens[i]`.
    pub fn decode(
        &self,
        text: &str,
        tokens: &[String],
        labels: &[String],
        marginals: &dyn Marginals,
    ) -> (Vec<DecodedEntity>, f64) {
        if tokens.len() != labels.len() {
            warn!(
                tokens = tokens.len(),
                labels = labels.len(),
                "token and label counts differ, extra positions ignored"
            );
        }
        let positions = locate_tokens(text, tokens);
        let mut entities = Vec::new();
        // (primeiro token, último token, rótulo com marcador)
        let mut open: Option<(usize, usize, &str)> = None;

        for (i, label) in labels.iter().enumerate().take(tokens.len()) {
            let label = label.as_str();
            if label == OUTSIDE {
                if let Some(run) = open.take() {
                    self.emit(text, &positions, run, &mut entities);
                }
                continue;
            }
            match open.as_mut() {
                Some((_, last, current)) if *current == label => *last = i,
                _ => {
                    if let Some(run) = open.replace((i, i, label)) {
                        self.emit(text, &positions, run, &mut entities);
                    }
                }
            }
        }
        if let Some(run) = open {
            self.emit(text, &positions, run, &mut entities);
        }

        (entities, confidence(labels, marginals))
    }

    fn emit(
        &self,
        text: &str,
        positions: &[Option<(usize, usize)>],
        (first, last, label): (usize, usize, &str),
        entities: &mut Vec<DecodedEntity>,
    ) {
        let (Some((start, _)), Some((_, end))) = (positions[first], positions[last]) else {
            warn!(text, first, last, "tokens not found in text, entity dropped");
            return;
        };
        let role = Label::from_label(label).role().unwrap_or_default().to_string();
        entities.push(DecodedEntity { start, end, role });
    }

    /// Converte entidades decodificadas em reconhecimentos do contexto.
    ///
    /// Papéis desconhecidos no contexto são descartados com um aviso.
    pub fn resolve(
        &self,
        context: &EntityCallContext,
        entities: Vec<DecodedEntity>,
        probability: f64,
    ) -> Vec<EntityRecognition> {
        entities
            .into_iter()
            .filter_map(|decoded| match context.find_entity(&decoded.role) {
                Some(entity) => Some(EntityRecognition {
                    value: EntityValue {
                        start: decoded.start,
                        end: decoded.end,
                        entity,
                    },
                    probability,
                }),
                None => {
                    warn!(role = %decoded.role, "unknown role, entity dropped");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Intent};
    use crate::tokenizer::Language;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn decode(text: &str, tokens: &[&str], labels: &[&str]) -> Vec<DecodedEntity> {
        let marginals = vec![1.0f64; labels.len()];
        LabelDecoder::new()
            .decode(text, &strings(tokens), &strings(labels), &marginals)
            .0
    }

    fn entity(start: usize, end: usize, role: &str) -> DecodedEntity {
        DecodedEntity {
            start,
            end,
            role: role.to_string(),
        }
    }

    #[test]
    fn test_decode_two_roles() {
        let entities = decode(
            "11/11 au 12/11",
            &["11", "/", "11", "au", "12", "/", "11"],
            &["a", "a", "a", "O", "b", "b", "b"],
        );
        assert_eq!(entities, vec![entity(0, 5, "a"), entity(9, 14, "b")]);
    }

    #[test]
    fn test_adjacency_marker_splits_run() {
        let entities = decode(
            "11/11 12/11",
            &["11", "/", "11", "12", "/", "11"],
            &["date", "date", "date", "<ADJ>date", "<ADJ>date", "<ADJ>date"],
        );
        assert_eq!(entities, vec![entity(0, 5, "date"), entity(6, 11, "date")]);
    }

    #[test]
    fn test_same_label_merges() {
        let entities = decode("11/11 12/11", &["11", "/", "11", "12", "/", "11"], &["date"; 6]);
        assert_eq!(entities, vec![entity(0, 11, "date")]);
    }

    #[test]
    fn test_role_change_splits_run() {
        let entities = decode("Paris Lyon", &["Paris", "Lyon"], &["from", "to"]);
        assert_eq!(entities, vec![entity(0, 5, "from"), entity(6, 10, "to")]);
    }

    #[test]
    fn test_cursor_skips_earlier_duplicates() {
        let entities = decode("11 au 11", &["11", "au", "11"], &["O", "O", "day"]);
        assert_eq!(entities, vec![entity(6, 8, "day")]);
    }

    #[test]
    fn test_offsets_are_chars() {
        let entities = decode("été à Lyon", &["été", "à", "Lyon"], &["O", "O", "city"]);
        assert_eq!(entities, vec![entity(6, 10, "city")]);
    }

    #[test]
    fn test_missing_token_drops_entity() {
        let entities = decode("Paris", &["Lyon", "Paris"], &["city", "O"]);
        assert!(entities.is_empty());
    }

    #[test]
    fn test_confidence_rounding() {
        let labels = strings(&["a", "b", "c"]);
        assert_eq!(confidence(&labels, &vec![0.9f64, 0.8, 0.7]), 0.2);
        assert_eq!(confidence(&labels, &vec![1.0f64; 3]), 0.0);
        assert_eq!(confidence(&strings(&["a"]), &vec![0.1234f64]), 0.877);
    }

    #[test]
    fn test_confidence_empty_sequence() {
        assert_eq!(confidence(&[], &Vec::<f64>::new()), 0.0);
    }

    #[test]
    fn test_confidence_fallback() {
        let labels = strings(&["a", "b"]);
        assert_eq!(confidence(&labels, &vec![0.5f64]), FALLBACK_CONFIDENCE);
        assert_eq!(confidence(&labels, &vec![0.5f64, f64::NAN]), FALLBACK_CONFIDENCE);
        assert_eq!(confidence(&labels, &vec![0.5f64, 1.5]), FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_resolve_drops_unknown_roles() {
        let context = EntityCallContext::ForIntent {
            intent: Intent::new("travel", vec![Entity::new("location", "from")]),
            language: Language::French,
        };
        let recognitions = LabelDecoder::new().resolve(
            &context,
            vec![entity(0, 5, "from"), entity(6, 10, "to")],
            0.3,
        );
        assert_eq!(recognitions.len(), 1);
        assert_eq!(recognitions[0].value.entity, Entity::new("location", "from"));
        assert_eq!(recognitions[0].probability, 0.3);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn confidence_is_bounded(marginals in prop::collection::vec(0.0f64..=1.0, 0..40)) {
                let labels = vec!["O".to_string(); marginals.len()];
                let value = confidence(&labels, &marginals);
                prop_assert!((0.0..=1.0).contains(&value));
                prop_assert_eq!((value * 1000.0).round() / 1000.0, value);
            }
        }
    }
}
