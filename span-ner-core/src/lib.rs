//! # span-ner-core: Reconhecimento de Entidades por Intervalos
//!
//! Este crate treina e executa um reconhecedor de entidades sobre um rotulador de
//! sequências genérico (ex: um CRF), que consome um rótulo por token. O rotulador
//! em si é externo: aqui ficam as duas traduções entre o mundo das anotações
//! (intervalos de caracteres) e o mundo do rotulador (um rótulo por token).
//!
//! ## Arquitetura do Sistema
//!
//! 1.  **Tokenização** ([`tokenizer`]): segmentação por idioma + separadores configuráveis.
//! 2.  **Alinhamento** ([`span`]): intervalo de caracteres -> intervalo de tokens.
//! 3.  **Codificação** ([`encoder`]): entidades anotadas -> rótulos (`O`, `role`, `<ADJ>role`).
//! 4.  **Rotulador externo** ([`tagger`]): treino e predição sobre o formato de linhas ([`corpus`]).
//! 5.  **Decodificação** ([`decoder`]): rótulos previstos -> entidades + confiança.
//!
//! O [`pipeline`] conecta tudo: [`EntityModelBuilder`] no treino e
//! [`EntityClassifier`] na inferência.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use span_ner_core::encoder::LabelEncoder;
//! use span_ner_core::model::{Entity, SampleEntity, SampleExpression};
//!
//! let encoder = LabelEncoder::default();
//! let date = |start, end| SampleEntity::new(Entity::new("datetime", "date"), start, end);
//!
//! // Duas datas coladas: a segunda recebe o marcador de adjacência
//! let corpus = encoder.encode_batch(&[SampleExpression::new(
//!     "11/11 12/11",
//!     vec![date(0, 5), date(6, 11)],
//! )]);
//! assert!(corpus.to_wire().contains("12\t<ADJ>date"));
//! ```

pub mod config;
pub mod corpus;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod span;
pub mod tagger;
pub mod tokenizer;

pub use config::{EncoderConfig, NlpConfiguration, OverlapPolicy, TokenizerConfig};
pub use decoder::{DecodedEntity, LabelDecoder};
pub use encoder::{ExpressionOutcome, LabelEncoder, TrainingCorpus};
pub use error::{NerError, Result, SkipReason};
pub use pipeline::{EntityClassifier, EntityModel, EntityModelBuilder, TokenizerModel};
pub use span::{SpanAligner, TokenSpan};
pub use tagger::{Label, Marginals, Prediction, SequenceTagger, TaggerTrainer};
pub use tokenizer::{Language, SeparatorSet, Token, Tokenizer};
