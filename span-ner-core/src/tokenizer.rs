//! # Tokenizador Multilíngue com Separadores Configuráveis
//!
//! Divide o texto bruto em tokens. O mesmo texto precisa ser tokenizado de forma
//! **idêntica** no treino e na inferência: o codificador re-tokeniza prefixos do
//! texto para alinhar entidades, e o decodificador procura os tokens no texto
//! original para recuperar offsets.
//!
//! ## Duas etapas
//!
//! 1. **Segmentação base** (por idioma): separa espaços, pontuação, símbolos e
//!    emojis (cada cluster de grafemas vira um token), separa letras de dígitos e
//!    preserva números decimais e abreviações.
//!    - **Francês**: mantém elisões ("d'Agde") e quebra mudanças de caixa ("ParisNimes" -> "Paris", "Nimes").
//!    - **Inglês / padrão**: separa clíticos ao estilo PTB ("don't" -> "do", "n't").
//!    - **Espanhol**: apóstrofo é pontuação comum; ordinais ficam colados ao número ("1º").
//! 2. **Separadores**: cada token base é quebrado nas ocorrências dos separadores
//!    configurados (hífen, apóstrofo, barra...). O separador vira um token próprio.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use span_ner_core::config::TokenizerConfig;
//! use span_ner_core::tokenizer::Tokenizer;
//!
//! let tokenizer = Tokenizer::new(&TokenizerConfig::new("fr"));
//!
//! // "Cap", "d", "'", "Agde"
//! let tokens = tokenizer.tokenize("Cap d'Agde");
//! assert_eq!(tokens, vec!["Cap", "d", "'", "Agde"]);
//! ```
//!
//! Todo token é uma fatia do texto original (espaços e caracteres de controle são
//! descartados), o que permite recuperar offsets com [`Tokenizer::tokenize_spans`].

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{parse_separators, TokenizerConfig, DEFAULT_SEPARATORS};

/// Um token extraído do texto original.
///
/// `start` e `end` são offsets de **byte** no texto tokenizado, de forma que
/// `&text[token.start..token.end] == token.text`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub text: String,
    /// Índice de byte inicial (inclusivo).
    pub start: usize,
    /// Índice de byte final (exclusivo).
    pub end: usize,
    /// Posição do token na sequência (0, 1, 2...).
    pub index: usize,
}

/// Estratégia de segmentação base, escolhida pelo código de idioma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    French,
    English,
    Spanish,
    /// Idioma não reconhecido: segmentação ao estilo PTB (igual ao inglês).
    Other,
}

/// Abreviações cujo ponto pertence ao token.
const FRENCH_ABBREVIATIONS: &[&str] = &[
    "M", "MM", "Mme", "Mmes", "Mlle", "Mlles", "Dr", "Pr", "Me", "St", "Ste", "av", "bd", "etc",
];
const ENGLISH_ABBREVIATIONS: &[&str] = &[
    "Mr", "Mrs", "Ms", "Dr", "Prof", "St", "Jr", "Sr", "Mt", "vs", "etc", "Inc", "Ltd",
];
const SPANISH_ABBREVIATIONS: &[&str] = &[
    "Sr", "Sra", "Srta", "Dr", "Dra", "Ud", "Uds", "Av", "Avda", "etc",
];

/// Pontuação cujas repetições consecutivas ficam em um só token.
const REPEATABLE_PUNCTUATION: &[&str] = &[".", "!", "?"];

/// Clíticos separados ao estilo PTB (comparados em minúsculas, apóstrofo normalizado).
const ENGLISH_CLITICS: &[&str] = &["'s", "'re", "'ve", "'ll", "'d", "'m"];

impl Language {
    /// Resolve um código de idioma ou locale (`"fr"`, `"fr_FR"`, `"en-US"`).
    pub fn from_code(code: &str) -> Self {
        let language = code
            .split(|c| c == '_' || c == '-')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match language.as_str() {
            "fr" => Language::French,
            "en" => Language::English,
            "es" => Language::Spanish,
            _ => Language::Other,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::French => "fr",
            Language::English => "en",
            Language::Spanish => "es",
            Language::Other => "und",
        }
    }

    fn abbreviations(&self) -> &'static [&'static str] {
        match self {
            Language::French => FRENCH_ABBREVIATIONS,
            Language::Spanish => SPANISH_ABBREVIATIONS,
            Language::English | Language::Other => ENGLISH_ABBREVIATIONS,
        }
    }

    fn keeps_inner_apostrophe(&self) -> bool {
        !matches!(self, Language::Spanish)
    }

    fn splits_clitics(&self) -> bool {
        matches!(self, Language::English | Language::Other)
    }

    /// Indica se um novo token começa entre dois grafemas de palavra consecutivos.
    fn breaks_between(&self, prev: Glyph, next: Glyph) -> bool {
        match (prev, next) {
            (Glyph::Digit, Glyph::Ordinal) => !matches!(self, Language::Spanish),
            (Glyph::Digit, n) => n.is_letter(),
            (p, Glyph::Digit) => p.is_letter(),
            (Glyph::Lower, Glyph::Upper) => matches!(self, Language::French),
            _ => false,
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::French
    }
}

/// Classe de um cluster de grafemas, determinada pelo seu primeiro caractere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Glyph {
    Space,
    Control,
    Upper,
    Lower,
    /// Letra sem caixa (CJK, árabe...).
    Letter,
    Digit,
    /// Indicadores ordinais `º` e `ª`.
    Ordinal,
    /// Hífen e underscore.
    Joiner,
    Apostrophe,
    Period,
    Comma,
    /// Pontuação, símbolos e emojis.
    Symbol,
}

impl Glyph {
    fn of(grapheme: &str) -> Self {
        let Some(first) = grapheme.chars().next() else {
            return Glyph::Control;
        };
        if grapheme.chars().all(char::is_whitespace) {
            return Glyph::Space;
        }
        if first.is_control() {
            return Glyph::Control;
        }
        match first {
            '\'' | '\u{2019}' => Glyph::Apostrophe,
            '-' | '_' => Glyph::Joiner,
            '.' => Glyph::Period,
            ',' => Glyph::Comma,
            'º' | 'ª' => Glyph::Ordinal,
            c if c.is_numeric() => Glyph::Digit,
            c if c.is_uppercase() => Glyph::Upper,
            c if c.is_lowercase() => Glyph::Lower,
            c if c.is_alphabetic() => Glyph::Letter,
            _ => Glyph::Symbol,
        }
    }

    fn is_letter(self) -> bool {
        matches!(self, Glyph::Upper | Glyph::Lower | Glyph::Letter | Glyph::Ordinal)
    }

    fn is_word(self) -> bool {
        self.is_letter() || self == Glyph::Digit
    }
}

/// Segmentação base: retorna intervalos de bytes, em ordem, sem sobreposição.
fn segment(text: &str, language: Language) -> Vec<Range<usize>> {
    let glyphs: Vec<(usize, &str, Glyph)> = text
        .grapheme_indices(true)
        .map(|(pos, g)| (pos, g, Glyph::of(g)))
        .collect();

    let mut spans = Vec::new();
    let mut open: Option<usize> = None;
    // Classe do grafema anterior dentro do token aberto
    let mut prev: Option<Glyph> = None;

    for (i, &(pos, grapheme, glyph)) in glyphs.iter().enumerate() {
        let next = glyphs.get(i + 1).map(|&(_, _, g)| g);
        let inside_word = prev.is_some_and(Glyph::is_word) && next.is_some_and(Glyph::is_word);

        match glyph {
            Glyph::Space | Glyph::Control => close(&mut spans, &mut open, pos),
            g if g.is_word() => {
                if open.is_some() && prev.is_some_and(|p| language.breaks_between(p, g)) {
                    close(&mut spans, &mut open, pos);
                }
                open.get_or_insert(pos);
            }
            Glyph::Apostrophe if inside_word && language.keeps_inner_apostrophe() => {}
            Glyph::Joiner if inside_word => {}
            Glyph::Period | Glyph::Comma
                if prev == Some(Glyph::Digit) && next == Some(Glyph::Digit) => {}
            Glyph::Period
                if open.is_some_and(|start| language.abbreviations().contains(&&text[start..pos])) =>
            {
                // O ponto pertence à abreviação
                close(&mut spans, &mut open, pos + grapheme.len());
            }
            _ => {
                close(&mut spans, &mut open, pos);
                match spans.last_mut() {
                    // "...", "!!": pontuação repetida forma um único token
                    Some(last)
                        if last.end == pos
                            && REPEATABLE_PUNCTUATION.contains(&grapheme)
                            && text[last.clone()].chars().all(|c| grapheme.starts_with(c)) =>
                    {
                        last.end = pos + grapheme.len();
                    }
                    _ => spans.push(pos..pos + grapheme.len()),
                }
            }
        }

        prev = open.map(|_| glyph);
    }
    close(&mut spans, &mut open, text.len());

    if language.splits_clitics() {
        spans = spans
            .into_iter()
            .flat_map(|span| split_clitic(text, span))
            .collect();
    }
    spans
}

/// Fecha o token aberto (se houver) terminando em `end`.
fn close(spans: &mut Vec<Range<usize>>, open: &mut Option<usize>, end: usize) {
    if let Some(start) = open.take() {
        if end > start {
            spans.push(start..end);
        }
    }
}

/// Separa um clítico final: "John's" -> "John", "'s"; "don't" -> "do", "n't".
fn split_clitic(text: &str, span: Range<usize>) -> Vec<Range<usize>> {
    let word = &text[span.clone()];
    let Some((apostrophe, _)) = word
        .char_indices()
        .filter(|&(_, c)| c == '\'' || c == '\u{2019}')
        .last()
    else {
        return vec![span];
    };
    if apostrophe == 0 {
        return vec![span];
    }

    let suffix = word[apostrophe..].replace('\u{2019}', "'").to_lowercase();
    let stem = &word[..apostrophe];
    let cut = if ENGLISH_CLITICS.contains(&suffix.as_str()) {
        Some(apostrophe)
    } else if suffix == "'t" && stem.len() > 1 && stem.ends_with(|c| c == 'n' || c == 'N') {
        Some(apostrophe - 1)
    } else {
        None
    };

    match cut {
        Some(cut) => vec![span.start..span.start + cut, span.start + cut..span.end],
        None => vec![span],
    }
}

/// Conjunto compilado de separadores de sub-tokens.
///
/// Imutável depois de construído; pode ser compartilhado entre threads via `Arc`.
#[derive(Debug)]
pub struct SeparatorSet {
    separators: Vec<String>,
    pattern: Option<Regex>,
}

/// Conjuntos já compilados, indexados pela configuração bruta.
static SHARED_SEPARATORS: Lazy<RwLock<HashMap<String, Arc<SeparatorSet>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

impl SeparatorSet {
    pub fn new(separators: Vec<String>) -> Self {
        let separators: Vec<String> = separators.into_iter().filter(|s| !s.is_empty()).collect();
        let pattern = compile_separators(&separators);
        Self {
            separators,
            pattern,
        }
    }

    /// Constrói a partir do formato de configuração (`"-,',/,_"`).
    pub fn parse(raw: &str) -> Self {
        Self::new(parse_separators(raw))
    }

    /// Retorna o conjunto compilado para esta configuração, compilando-o só na
    /// primeira vez. Seguro para chamadas concorrentes.
    ///
    /// O cache nunca é esvaziado: use apenas para separadores vindos da
    /// configuração da aplicação. Separadores vindos de fora (ex: de uma
    /// requisição HTTP) devem usar [`SeparatorSet::parse`].
    pub fn shared(raw: &str) -> Arc<Self> {
        if let Some(set) = Self::cached(raw) {
            return set;
        }

        let set = Arc::new(Self::parse(raw));
        match SHARED_SEPARATORS.write() {
            Ok(mut cache) => Arc::clone(cache.entry(raw.to_string()).or_insert(set)),
            Err(_) => set,
        }
    }

    /// Conjunto já compilado por [`SeparatorSet::shared`], sem compilar nada.
    pub fn cached(raw: &str) -> Option<Arc<Self>> {
        SHARED_SEPARATORS
            .read()
            .ok()
            .and_then(|cache| cache.get(raw).cloned())
    }

    pub fn separators(&self) -> &[String] {
        &self.separators
    }

    /// Quebra uma palavra nos separadores, empurrando os intervalos em `out`.
    ///
    /// `offset` é a posição de byte da palavra no texto. Uma palavra de um único
    /// caractere nunca é quebrada; separadores de vários caracteres viram um token
    /// por caractere.
    fn split_word(&self, word: &str, offset: usize, out: &mut Vec<Range<usize>>) {
        let whole = offset..offset + word.len();
        let Some(pattern) = &self.pattern else {
            out.push(whole);
            return;
        };
        if word.chars().nth(1).is_none() {
            out.push(whole);
            return;
        }

        let mut last = 0;
        for m in pattern.find_iter(word) {
            if m.start() > last {
                out.push(offset + last..offset + m.start());
            }
            for (i, c) in m.as_str().char_indices() {
                let start = offset + m.start() + i;
                out.push(start..start + c.len_utf8());
            }
            last = m.end();
        }
        if last < word.len() {
            out.push(offset + last..offset + word.len());
        }
    }

    #[cfg(test)]
    pub(crate) fn uncompiled(separators: &[&str]) -> Self {
        Self {
            separators: separators.iter().map(|s| s.to_string()).collect(),
            pattern: None,
        }
    }
}

impl Default for SeparatorSet {
    fn default() -> Self {
        Self::parse(DEFAULT_SEPARATORS)
    }
}

fn compile_separators(separators: &[String]) -> Option<Regex> {
    if separators.is_empty() {
        return None;
    }
    info!("using token separators: {:?}", separators);
    let pattern = separators
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            error!("invalid separator pattern {pattern}: {e} - words will not be split");
            None
        }
    }
}

/// Tokenizador de uma aplicação: idioma + separadores compilados.
///
/// Não guarda estado mutável; clones compartilham o mesmo [`SeparatorSet`].
#[derive(Debug, Clone)]
pub struct Tokenizer {
    language: Language,
    separators: Arc<SeparatorSet>,
}

impl Tokenizer {
    pub fn new(config: &TokenizerConfig) -> Self {
        Self {
            language: Language::from_code(&config.language),
            separators: SeparatorSet::shared(&config.separators),
        }
    }

    pub fn with_separators(language: Language, separators: Arc<SeparatorSet>) -> Self {
        Self {
            language,
            separators,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn separators(&self) -> &SeparatorSet {
        &self.separators
    }

    /// Tokeniza o texto, retornando apenas o texto dos tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenize_spans(text).into_iter().map(|t| t.text).collect()
    }

    /// Tokeniza o texto preservando os offsets de byte de cada token.
    pub fn tokenize_spans(&self, text: &str) -> Vec<Token> {
        trace!("tokenizing with {:?} strategy", self.language);

        let mut ranges = Vec::new();
        for span in segment(text, self.language) {
            self.separators.split_word(&text[span.clone()], span.start, &mut ranges);
        }

        if ranges.is_empty() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                warn!("empty token list for {text}, do not split");
                let start = text.len() - text.trim_start().len();
                ranges.push(start..start + trimmed.len());
            }
        }

        let tokens: Vec<Token> = ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| Token {
                text: text[range.clone()].to_string(),
                start: range.start,
                end: range.end,
                index,
            })
            .collect();

        debug!("{:?}", tokens.iter().map(|t| t.text.as_str()).collect::<Vec<_>>());
        tokens
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}

/// Tokeniza um texto com os separadores padrão.
pub fn tokenize(language: &str, text: &str) -> Vec<String> {
    Tokenizer::new(&TokenizerConfig::new(language)).tokenize(text)
}
