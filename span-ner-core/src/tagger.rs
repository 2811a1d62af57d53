//! # Alfabeto de Rótulos e Contrato do Rotulador
//!
//! O rotulador de sequências (ex: um CRF) é um colaborador **externo**: este crate
//! só produz os dados de treino e consome as predições. Este módulo define:
//!
//! - o alfabeto de rótulos ([`Label`]) trocado com o rotulador;
//! - os traits [`TaggerTrainer`] e [`SequenceTagger`] que um adaptador implementa;
//! - o trait [`Marginals`], fonte das probabilidades marginais usadas na confiança.
//!
//! ## Alfabeto
//!
//! | Rótulo          | Significado                                                 |
//! |-----------------|-------------------------------------------------------------|
//! | `O`             | Fora de entidade                                            |
//! | `role`          | Token de uma entidade com este papel                        |
//! | `<ADJ>role`     | Entidade colada a uma anterior de mesmo papel (sem `O` entre elas) |
//!
//! Diferente do BIO, não há prefixo de início: um único rótulo por papel basta,
//! e o marcador `<ADJ>` só aparece quando duas entidades de mesmo papel se tocam.

use serde::{Deserialize, Serialize};

use crate::error::{NerError, Result};

/// Rótulo de token fora de entidade.
pub const OUTSIDE: &str = "O";

/// Prefixo que marca a segunda de duas entidades adjacentes de mesmo papel.
pub const ADJACENT_MARKER: &str = "<ADJ>";

/// Rótulo de um token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// **Outside**: o token não pertence a nenhuma entidade.
    Outside,
    /// Token de uma entidade com este papel.
    Role(String),
    /// Token de uma entidade que começa colada a outra de mesmo papel.
    Adjacent(String),
}

impl Label {
    /// Representação textual (ex: `"O"`, `"date"`, `"<ADJ>date"`).
    pub fn label(&self) -> String {
        match self {
            Label::Outside => OUTSIDE.to_string(),
            Label::Role(role) => role.clone(),
            Label::Adjacent(role) => format!("{ADJACENT_MARKER}{role}"),
        }
    }

    /// Interpreta um rótulo textual. Nunca falha: qualquer texto diferente de
    /// `"O"` é um papel.
    pub fn from_label(s: &str) -> Self {
        if s == OUTSIDE {
            Label::Outside
        } else if let Some(role) = s.strip_prefix(ADJACENT_MARKER) {
            Label::Adjacent(role.to_string())
        } else {
            Label::Role(s.to_string())
        }
    }

    /// Papel sem o marcador de adjacência.
    pub fn role(&self) -> Option<&str> {
        match self {
            Label::Outside => None,
            Label::Role(role) | Label::Adjacent(role) => Some(role),
        }
    }
}

/// Indica se `role` pode ser usado como papel de entidade.
///
/// O papel vira rótulo e linha do formato de treino: não pode ser vazio, nem
/// `O`, nem começar com o marcador de adjacência, nem conter `\t` ou `\n`.
pub fn is_valid_role(role: &str) -> bool {
    !role.is_empty()
        && role != OUTSIDE
        && !role.starts_with(ADJACENT_MARKER)
        && !role.contains(['\t', '\n'])
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Fonte das probabilidades marginais do rotulador.
///
/// `probability(i, label)` é a probabilidade estimada de que `label` seja o
/// rótulo correto na posição `i`, dada a sequência inteira.
pub trait Marginals {
    fn probability(&self, position: usize, label: &str) -> Result<f64>;
}

/// Marginais já extraídas, uma por posição (a do rótulo previsto).
impl Marginals for [f64] {
    fn probability(&self, position: usize, _label: &str) -> Result<f64> {
        self.get(position)
            .copied()
            .ok_or_else(|| NerError::tagger(format!("no marginal for position {position}")))
    }
}

impl Marginals for Vec<f64> {
    fn probability(&self, position: usize, label: &str) -> Result<f64> {
        self.as_slice().probability(position, label)
    }
}

/// Resultado de uma predição: um rótulo por token e as marginais.
pub struct Prediction {
    pub labels: Vec<String>,
    pub marginals: Box<dyn Marginals + Send + Sync>,
}

impl Prediction {
    pub fn new(labels: Vec<String>, marginals: impl Marginals + Send + Sync + 'static) -> Self {
        Self {
            labels,
            marginals: Box::new(marginals),
        }
    }
}

impl std::fmt::Debug for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prediction")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

/// Rotulador treinado.
///
/// Recebe os dados de avaliação no formato de linhas (`token<TAB>O`, ver
/// [`crate::corpus`]) e devolve um rótulo por token.
pub trait SequenceTagger: Send + Sync {
    fn predict(&self, evaluation_data: &str) -> Result<Prediction>;
}

/// Treinador de um rotulador a partir dos dados de treino (`token<TAB>rótulo`).
pub trait TaggerTrainer {
    type Tagger: SequenceTagger;

    fn train(&self, training_data: &str) -> Result<Self::Tagger>;
}
