use std::{collections::BTreeSet, sync::Arc};

use crate::kv::KeyValue;

/// Par de funciones de usuario Map/Reduce.
///
/// Ambas deben ser puras y deterministas: el runtime puede ejecutar
/// la misma tarea varias veces (reintentos) y asume el mismo resultado.
pub trait MapReduceApp: Send + Sync {
    fn name(&self) -> &'static str;

    /// (nombre de archivo, contenido) -> registros intermedios.
    fn map(&self, filename: &str, contents: &str) -> Vec<KeyValue>;

    /// (clave, valores en orden) -> valor de salida.
    fn reduce(&self, key: &str, values: &[String]) -> String;
}

/// Apps enlazadas estáticamente, elegidas por nombre al arrancar.
pub const APP_NAMES: &[&str] = &["wc", "indexer"];

pub fn app_by_name(name: &str) -> Option<Arc<dyn MapReduceApp>> {
    match name {
        "wc" => Some(Arc::new(WordCount)),
        "indexer" => Some(Arc::new(Indexer)),
        _ => None,
    }
}

/// Palabras = secuencias maximales de letras.
fn words(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
}

/// WordCount: emite (palabra, "1") y reduce contando.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCount;

impl MapReduceApp for WordCount {
    fn name(&self) -> &'static str {
        "wc"
    }

    fn map(&self, _filename: &str, contents: &str) -> Vec<KeyValue> {
        words(contents).map(|w| KeyValue::new(w, "1")).collect()
    }

    fn reduce(&self, _key: &str, values: &[String]) -> String {
        values.len().to_string()
    }
}

/// Índice invertido: palabra -> "<n> doc1,doc2,..." (documentos ordenados).
#[derive(Debug, Clone, Copy, Default)]
pub struct Indexer;

impl MapReduceApp for Indexer {
    fn name(&self) -> &'static str {
        "indexer"
    }

    fn map(&self, filename: &str, contents: &str) -> Vec<KeyValue> {
        // una sola entrada por palabra y documento, en orden de aparición
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for w in words(contents) {
            if seen.insert(w) {
                out.push(KeyValue::new(w, filename));
            }
        }
        out
    }

    fn reduce(&self, _key: &str, values: &[String]) -> String {
        let docs: BTreeSet<&str> = values.iter().map(String::as_str).collect();
        let joined = docs.iter().copied().collect::<Vec<_>>().join(",");
        format!("{} {}", docs.len(), joined)
    }
}
