use serde::{Deserialize, Serialize};

/// Par clave/valor que emite Map. Los nombres de campo en JSON son
/// `Key` / `Value` para que los shards sean legibles por otras implementaciones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

const FNV32_OFFSET: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// FNV-1a de 32 bits sin signo, enmascarado a 31 bits.
/// Elegir reducer con `ihash(key) % n_reduce`.
pub fn ihash(key: &str) -> u32 {
    let mut h = FNV32_OFFSET;
    for b in key.as_bytes() {
        h ^= u32::from(*b);
        h = h.wrapping_mul(FNV32_PRIME);
    }
    h & 0x7fff_ffff
}

/// Partición de reduce para una clave.
pub fn partition_for(key: &str, n_reduce: u32) -> u32 {
    ihash(key) % n_reduce.max(1)
}
