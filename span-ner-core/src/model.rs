//! # Modelo de Dados
//!
//! Tipos que descrevem **o que** está sendo reconhecido:
//!
//! - [`EntityType`]: um tipo de entidade (ex: "datetime", "location"), com possíveis sub-entidades.
//! - [`Entity`]: um tipo de entidade com um **papel** (role) dentro de uma intenção
//!   (ex: `departure_date` do tipo `datetime`).
//! - [`Intent`]: uma intenção e as entidades que ela aceita.
//! - [`SampleExpression`] / [`SampleEntity`]: frases de treino anotadas.
//! - [`EntityValue`] / [`EntityRecognition`]: o resultado da decodificação.
//!
//! E **em qual contexto**: [`EntityBuildContext`] (treino) e [`EntityCallContext`]
//! (inferência). O contexto de chamada decide como um papel previsto pelo
//! rotulador é convertido de volta em uma [`Entity`].
//!
//! Todos os offsets são contados em caracteres, semiabertos `[start, end)`.

use serde::{Deserialize, Serialize};

use crate::tokenizer::Language;

/// Tipo de entidade, identificado pelo nome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    /// Entidades que compõem este tipo (ex: `datetime` -> `day`, `month`).
    #[serde(default)]
    pub sub_entities: Vec<Entity>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sub_entities: Vec::new(),
        }
    }

    pub fn with_sub_entities(mut self, sub_entities: Vec<Entity>) -> Self {
        self.sub_entities = sub_entities;
        self
    }

    /// Procura uma sub-entidade pelo papel.
    pub fn find_sub_entity(&self, role: &str) -> Option<&Entity> {
        self.sub_entities.iter().find(|e| e.role == role)
    }
}

/// Um tipo de entidade com um papel. O papel é o rótulo usado pelo rotulador.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: String,
    pub role: String,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            role: role.into(),
        }
    }
}

/// Uma intenção e as entidades que ela pode conter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Intent {
    pub fn new(name: impl Into<String>, entities: Vec<Entity>) -> Self {
        Self {
            name: name.into(),
            entities,
        }
    }

    /// Procura a entidade da intenção com este papel.
    pub fn get_entity(&self, role: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.role == role)
    }
}

/// Entidade anotada em uma frase de treino.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleEntity {
    pub definition: Entity,
    /// Offset inicial em caracteres (inclusivo).
    pub start: usize,
    /// Offset final em caracteres (exclusivo).
    pub end: usize,
}

impl SampleEntity {
    pub fn new(definition: Entity, start: usize, end: usize) -> Self {
        Self {
            definition,
            start,
            end,
        }
    }

    pub fn role(&self) -> &str {
        &self.definition.role
    }
}

/// Frase de treino: texto bruto + entidades anotadas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleExpression {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<SampleEntity>,
}

impl SampleExpression {
    pub fn new(text: impl Into<String>, entities: Vec<SampleEntity>) -> Self {
        Self {
            text: text.into(),
            entities,
        }
    }
}

/// Uma entidade reconhecida no texto original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityValue {
    pub start: usize,
    pub end: usize,
    pub entity: Entity,
}

/// Uma entidade reconhecida e a confiança da chamada que a produziu.
///
/// A confiança é calculada uma vez para a sequência inteira: todas as
/// entidades de uma mesma chamada compartilham o mesmo valor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecognition {
    pub value: EntityValue,
    pub probability: f64,
}

/// Contexto de treino de um modelo de entidades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityBuildContext {
    /// Entidades de uma intenção.
    ForIntent { intent: Intent, language: Language },
    /// Sub-entidades de um tipo de entidade.
    ForSubEntities { entity_type: EntityType, language: Language },
    /// Um único tipo de entidade.
    ForEntity { entity_type: EntityType, language: Language },
}

impl EntityBuildContext {
    pub fn language(&self) -> Language {
        match self {
            EntityBuildContext::ForIntent { language, .. }
            | EntityBuildContext::ForSubEntities { language, .. }
            | EntityBuildContext::ForEntity { language, .. } => *language,
        }
    }
}

/// Contexto de uma chamada de reconhecimento.
///
/// Cada variante define como um papel decodificado vira uma [`Entity`]; o
/// algoritmo de decodificação é o mesmo para todas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityCallContext {
    /// Papéis das entidades de uma intenção.
    ForIntent { intent: Intent, language: Language },
    /// Papéis das sub-entidades de um tipo.
    ForSubEntities { entity_type: EntityType, language: Language },
    /// O papel é o próprio nome do tipo de entidade.
    ForEntity { entity_type: EntityType, language: Language },
}

impl EntityCallContext {
    pub fn language(&self) -> Language {
        match self {
            EntityCallContext::ForIntent { language, .. }
            | EntityCallContext::ForSubEntities { language, .. }
            | EntityCallContext::ForEntity { language, .. } => *language,
        }
    }

    /// Resolve o papel (já sem marcador de adjacência) para uma entidade conhecida.
    pub fn find_entity(&self, role: &str) -> Option<Entity> {
        match self {
            EntityCallContext::ForIntent { intent, .. } => intent.get_entity(role).cloned(),
            EntityCallContext::ForSubEntities { entity_type, .. } => {
                entity_type.find_sub_entity(role).cloned()
            }
            EntityCallContext::ForEntity { entity_type, .. } => (entity_type.name == role)
                .then(|| Entity::new(entity_type.name.clone(), role)),
        }
    }
}
