//! # Formato de Linhas do Rotulador
//!
//! O rotulador externo consome texto, um token por linha:
//!
//! ```text
//! 11	date
//! /	date
//! 11	date
//! au	O
//! 12	<ADJ>date
//!
//! ok	O
//!
//! ```
//!
//! - Cada linha é `token<TAB>rótulo`.
//! - Cada expressão forma um **bloco**, terminado por uma linha em branco.
//! - Não há escape: tokens com `\t` ou `\n` não são representáveis, e as
//!   expressões que os contêm são descartadas antes de chegar aqui.
//!
//! Na inferência o formato é o mesmo, mas todo rótulo é o marcador `O`: os
//! rótulos reais vêm da predição.

use crate::error::{NerError, Result};
use crate::tagger::OUTSIDE;

/// Um bloco já lido: pares `(token, rótulo)` de uma expressão.
pub type WireBlock = Vec<(String, String)>;

/// Escreve um bloco (linhas + linha em branco final).
pub fn write_block<'a, I>(out: &mut String, lines: I)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (token, label) in lines {
        out.push_str(token);
        out.push('\t');
        out.push_str(label);
        out.push('\n');
    }
    out.push('\n');
}

/// Dados de avaliação para uma sequência de tokens: um único bloco, tudo `O`.
pub fn evaluation_data(tokens: &[String]) -> String {
    let mut out = String::with_capacity(tokens.iter().map(|t| t.len() + 3).sum::<usize>() + 1);
    write_block(&mut out, tokens.iter().map(|t| (t.as_str(), OUTSIDE)));
    out
}

/// Lê blocos do formato de linhas.
///
/// Linhas em branco consecutivas não criam blocos vazios. Uma linha não vazia
/// sem tabulação é um [`NerError::WireFormat`] (número de linha a partir de 1).
pub fn parse_blocks(data: &str) -> Result<Vec<WireBlock>> {
    let mut blocks = Vec::new();
    let mut current = WireBlock::new();

    for (index, line) in data.lines().enumerate() {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        let Some((token, label)) = line.split_once('\t') else {
            return Err(NerError::WireFormat {
                line: index + 1,
                message: format!("missing tab in {line:?}"),
            });
        };
        current.push((token.to_string(), label.to_string()));
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    Ok(blocks)
}
