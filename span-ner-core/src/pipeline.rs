//! # Pipeline: Treino e Classificação de Entidades
//!
//! Conecta os módulos nos dois sentidos:
//!
//! ```text
//! treino:     expressões -> Tokenizer -> SpanAligner -> LabelEncoder -> TaggerTrainer
//! inferência: texto -> Tokenizer -> SequenceTagger -> LabelDecoder -> EntityRecognition
//! ```
//!
//! O treinamento é o único ponto que falha de forma ruidosa: se o rotulador não
//! consegue treinar, o corpus completo vai para o log e o erro sobe ao chamador.
//! Na classificação, qualquer falha do rotulador resulta em lista vazia.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::NlpConfiguration;
use crate::corpus::evaluation_data;
use crate::decoder::LabelDecoder;
use crate::encoder::{LabelEncoder, TrainingCorpus};
use crate::error::{NerError, Result};
use crate::model::{EntityBuildContext, EntityCallContext, EntityRecognition, SampleExpression};
use crate::tagger::{SequenceTagger, TaggerTrainer};
use crate::tokenizer::{Language, SeparatorSet, Tokenizer};

/// Modelo de tokenização: idioma + configuração.
///
/// Guardado junto do modelo de entidades para que treino e inferência
/// tokenizem exatamente da mesma forma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerModel {
    pub language: Language,
    pub configuration: NlpConfiguration,
}

impl TokenizerModel {
    pub fn tokenizer(&self) -> Tokenizer {
        Tokenizer::with_separators(
            self.language,
            SeparatorSet::shared(&self.configuration.tokenizer.separators),
        )
    }
}

/// Modelo de entidades treinado.
#[derive(Debug)]
pub struct EntityModel<T> {
    pub context: EntityBuildContext,
    pub tokenizer_model: TokenizerModel,
    pub tagger: T,
    /// Corpus usado no treino (blocos emitidos e expressões descartadas).
    pub corpus: TrainingCorpus,
}

/// Constrói modelos de tokenização e de entidades.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityModelBuilder;

impl EntityModelBuilder {
    pub fn build_tokenizer_model(
        &self,
        language: Language,
        configuration: &NlpConfiguration,
    ) -> TokenizerModel {
        TokenizerModel {
            language,
            configuration: configuration.clone(),
        }
    }

    /// Codifica as expressões e treina o rotulador.
    ///
    /// Expressões inválidas são descartadas com aviso. Se o treino falhar, o
    /// corpus é registrado com `error!` e [`NerError::Training`] é retornado.
    pub fn build_entity_model<T: TaggerTrainer>(
        &self,
        context: &EntityBuildContext,
        configuration: &NlpConfiguration,
        expressions: &[SampleExpression],
        trainer: &T,
    ) -> Result<EntityModel<T::Tagger>> {
        let tokenizer_model = self.build_tokenizer_model(context.language(), configuration);
        let encoder = LabelEncoder::new(tokenizer_model.tokenizer(), configuration.encoder);

        let corpus = encoder.encode_batch(expressions);
        info!(
            expressions = expressions.len(),
            encoded = corpus.blocks.len(),
            skipped = corpus.skipped.len(),
            "training entity model"
        );
        let training_data = corpus.to_wire();

        match trainer.train(&training_data) {
            Ok(tagger) => Ok(EntityModel {
                context: context.clone(),
                tokenizer_model,
                tagger,
                corpus,
            }),
            Err(e) => {
                error!("unable to train entity model: {e}\ntraining data:\n{training_data}");
                Err(NerError::training(e.to_string()))
            }
        }
    }
}

/// Classificador de entidades sobre um modelo treinado.
#[derive(Debug)]
pub struct EntityClassifier<T> {
    model: EntityModel<T>,
    tokenizer: Tokenizer,
    decoder: LabelDecoder,
}

impl<T: SequenceTagger> EntityClassifier<T> {
    pub fn new(model: EntityModel<T>) -> Self {
        let tokenizer = model.tokenizer_model.tokenizer();
        Self {
            model,
            tokenizer,
            decoder: LabelDecoder::new(),
        }
    }

    pub fn model(&self) -> &EntityModel<T> {
        &self.model
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Reconhece as entidades de um texto já tokenizado.
    ///
    /// Todas as entidades retornadas compartilham a confiança da chamada.
    /// Falhas do rotulador são registradas e resultam em lista vazia.
    pub fn classify_entities(
        &self,
        context: &EntityCallContext,
        text: &str,
        tokens: &[String],
    ) -> Vec<EntityRecognition> {
        if tokens.is_empty() {
            return Vec::new();
        }
        let prediction = match self.model.tagger.predict(&evaluation_data(tokens)) {
            Ok(prediction) => prediction,
            Err(e) => {
                error!("entity classification failed for {text:?}: {e}");
                return Vec::new();
            }
        };

        let (entities, confidence) =
            self.decoder
                .decode(text, tokens, &prediction.labels, &*prediction.marginals);
        debug!(?entities, confidence, "decoded entities");
        self.decoder.resolve(context, entities, confidence)
    }

    /// Tokeniza com o tokenizador do modelo e reconhece as entidades.
    pub fn classify_text(&self, context: &EntityCallContext, text: &str) -> Vec<EntityRecognition> {
        let tokens = self.tokenizer.tokenize(text);
        self.classify_entities(context, text, &tokens)
    }
}
