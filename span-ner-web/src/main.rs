//! Servidor web Axum para tokenização, geração de dados de treino e decodificação

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use span_ner_core::{
    config::NlpConfiguration,
    decoder::{DecodedEntity, LabelDecoder},
    encoder::{LabelEncoder, SkippedExpression},
    model::{Entity, EntityCallContext, Intent, SampleExpression},
    tokenizer::{Language, SeparatorSet, Tokenizer},
    NerError,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Variável de ambiente com o caminho de um arquivo JSON de configuração.
const CONFIG_ENV: &str = "SPAN_NER_CONFIG";

/// Estado compartilhado da aplicação
struct AppState {
    configuration: NlpConfiguration,
}

impl AppState {
    /// Tokenizador da configuração, com os campos da requisição sobrepostos.
    ///
    /// Separadores enviados pelo cliente são compilados só para esta requisição,
    /// fora do cache compartilhado.
    fn tokenizer(&self, language: Option<String>, separators: Option<String>) -> Tokenizer {
        let config = &self.configuration.tokenizer;
        let language = Language::from_code(language.as_deref().unwrap_or(&config.language));
        let separators = match separators {
            Some(raw) => Arc::new(SeparatorSet::parse(&raw)),
            None => SeparatorSet::shared(&config.separators),
        };
        Tokenizer::with_separators(language, separators)
    }
}

#[derive(Deserialize)]
struct TokenizeRequest {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    separators: Option<String>,
}

#[derive(Serialize)]
struct TokenizeResponse {
    language: &'static str,
    tokens: Vec<String>,
}

#[derive(Deserialize)]
struct TrainDataRequest {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    separators: Option<String>,
    expressions: Vec<SampleExpression>,
}

#[derive(Serialize)]
struct TrainDataResponse {
    /// Texto no formato `token<TAB>rótulo`
    data: String,
    encoded: usize,
    skipped: Vec<SkippedExpression>,
}

#[derive(Deserialize)]
struct DecodeRequest {
    text: String,
    tokens: Vec<String>,
    labels: Vec<String>,
    marginals: Vec<f64>,
    /// Papéis conhecidos. Se ausente, todos os papéis decodificados são aceitos.
    #[serde(default)]
    roles: Option<Vec<String>>,
}

#[derive(Serialize)]
struct DecodeResponse {
    entities: Vec<DecodedEntity>,
    confidence: f64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let configuration = match load_configuration() {
        Ok(configuration) => configuration,
        Err(e) => {
            error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let app = build_router(configuration);

    let listener = match tokio::net::TcpListener::bind("0.0.0.0:3000").await {
        Ok(listener) => listener,
        Err(e) => {
            error!("unable to bind 0.0.0.0:3000: {e}");
            std::process::exit(1);
        }
    };
    info!("servidor span-ner iniciado em http://localhost:3000");
    if let Err(e) = axum::serve(listener, app).await {
        error!("server error: {e}");
    }
}

/// Lê a configuração do arquivo apontado por `SPAN_NER_CONFIG`, ou usa o padrão.
fn load_configuration() -> Result<NlpConfiguration, NerError> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| NerError::configuration(format!("{path}: {e}")))?;
            info!("configuração lida de {path}");
            NlpConfiguration::from_json(&json)
        }
        Err(_) => Ok(NlpConfiguration::default()),
    }
}

fn build_router(configuration: NlpConfiguration) -> Router {
    let state = Arc::new(AppState { configuration });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/tokenize", post(tokenize_handler))
        .route("/train-data", post(train_data_handler))
        .route("/decode", post(decode_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Tokenização de um texto
async fn tokenize_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenizeRequest>,
) -> impl IntoResponse {
    let tokenizer = state.tokenizer(req.language, req.separators);
    Json(TokenizeResponse {
        language: tokenizer.language().code(),
        tokens: tokenizer.tokenize(&req.text),
    })
}

/// Dados de treino para um lote de expressões anotadas
async fn train_data_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrainDataRequest>,
) -> impl IntoResponse {
    let tokenizer = state.tokenizer(req.language, req.separators);
    let encoder = LabelEncoder::new(tokenizer, state.configuration.encoder);
    let expressions = req.expressions;

    // O lote é codificado com rayon: fora do runtime assíncrono
    let corpus = match tokio::task::spawn_blocking(move || encoder.encode_batch(&expressions)).await {
        Ok(corpus) => corpus,
        Err(e) => {
            error!("encoding task failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "encoding failed"})),
            )
                .into_response();
        }
    };

    Json(TrainDataResponse {
        data: corpus.to_wire(),
        encoded: corpus.blocks.len(),
        skipped: corpus.skipped,
    })
    .into_response()
}

/// Decodificação de rótulos previstos por um rotulador externo
async fn decode_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DecodeRequest>,
) -> impl IntoResponse {
    let decoder = LabelDecoder::new();
    let (mut entities, confidence) = decoder.decode(&req.text, &req.tokens, &req.labels, &req.marginals);

    if let Some(roles) = req.roles {
        let context = EntityCallContext::ForIntent {
            intent: Intent::new("decode", roles.iter().map(|r| Entity::new(r.as_str(), r.as_str())).collect()),
            language: Language::from_code(&state.configuration.tokenizer.language),
        };
        entities = decoder
            .resolve(&context, entities, confidence)
            .into_iter()
            .map(|recognition| DecodedEntity {
                start: recognition.value.start,
                end: recognition.value.end,
                role: recognition.value.entity.role,
            })
            .collect();
    }

    Json(DecodeResponse { entities, confidence })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn post_json(uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = build_router(NlpConfiguration::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let response = build_router(NlpConfiguration::default())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_tokenize() {
        let (status, json) = post_json("/tokenize", serde_json::json!({"text": "Cap d'Agde"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["language"], "fr");
        assert_eq!(json["tokens"], serde_json::json!(["Cap", "d", "'", "Agde"]));
    }

    #[tokio::test]
    async fn test_tokenize_blank_text() {
        let (status, json) = post_json("/tokenize", serde_json::json!({"text": " "})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["tokens"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_tokenize_with_separators() {
        let (_, json) = post_json(
            "/tokenize",
            serde_json::json!({"text": "A-l'l#e", "language": "fr_FR", "separators": "-"}),
        )
        .await;
        assert_eq!(json["tokens"], serde_json::json!(["A", "-", "l'l", "#", "e"]));
    }

    #[tokio::test]
    async fn test_request_separators_are_not_cached() {
        let separators = "-,%,+,;";
        let (_, json) = post_json(
            "/tokenize",
            serde_json::json!({"text": "a%b", "separators": separators}),
        )
        .await;
        assert_eq!(json["tokens"], serde_json::json!(["a", "%", "b"]));
        assert!(SeparatorSet::cached(separators).is_none());
    }

    #[tokio::test]
    async fn test_train_data() {
        let entity = |role: &str, start: usize, end: usize| {
            serde_json::json!({"definition": {"entity_type": "datetime", "role": role}, "start": start, "end": end})
        };
        let (status, json) = post_json(
            "/train-data",
            serde_json::json!({
                "expressions": [
                    {"text": "11/11 au 12/11", "entities": [entity("a", 0, 5), entity("b", 9, 14)]},
                    {"text": "bad\ttext"},
                ]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], "11\ta\n/\ta\n11\ta\nau\tO\n12\tb\n/\tb\n11\tb\n\n");
        assert_eq!(json["encoded"], 1);
        assert_eq!(json["skipped"][0]["index"], 1);
        assert_eq!(json["skipped"][0]["reason"]["reason"], "banned_character");
    }

    #[tokio::test]
    async fn test_decode_with_roles() {
        let (status, json) = post_json(
            "/decode",
            serde_json::json!({
                "text": "de Paris à Lyon",
                "tokens": ["de", "Paris", "à", "Lyon"],
                "labels": ["O", "from", "O", "to"],
                "marginals": [0.5, 0.5, 0.5, 0.5],
                "roles": ["from"],
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["confidence"], 0.5);
        assert_eq!(json["entities"], serde_json::json!([{"start": 3, "end": 8, "role": "from"}]));
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let (status, _) = post_json("/decode", serde_json::json!({"text": "x"})).await;
        assert!(status.is_client_error());
    }
}
