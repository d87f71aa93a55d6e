//! Nombres de archivos compartidos entre tareas y procesos.
//! Tienen que ser bit-exactos: otro worker (o un reintento) debe
//! encontrar exactamente el mismo nombre.

use std::{
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::{engine::write_atomically, rpc::TaskId};

const INTERMEDIATE_PREFIX: &str = "mr-tmp-";
const OUTPUT_PREFIX: &str = "mr-out-";

/// Env var para sobreescribir la ruta del archivo de rendezvous.
pub const RENDEZVOUS_ENV: &str = "MR_RENDEZVOUS";

/// Shard intermedio del map `map_id` para la partición `partition`.
pub fn intermediate_name(map_id: TaskId, partition: u32) -> String {
    format!("{INTERMEDIATE_PREFIX}{map_id}-{partition}")
}

/// Salida final de la partición `partition`.
pub fn output_name(partition: u32) -> String {
    format!("{OUTPUT_PREFIX}{partition}")
}

/// Archivo donde el coordinator publica su URL base.
/// El nombre sale del usuario que lo invoca, así dos usuarios en la
/// misma máquina no chocan.
pub fn rendezvous_path() -> PathBuf {
    if let Ok(p) = env::var(RENDEZVOUS_ENV) {
        if !p.trim().is_empty() {
            return PathBuf::from(p);
        }
    }
    default_rendezvous_path(&whoami::username())
}

pub fn default_rendezvous_path(user: &str) -> PathBuf {
    let user: String = user
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    Path::new("/var/tmp").join(format!("mr-coordinator-{user}"))
}

/// Publica la URL base del coordinator en el archivo de rendezvous.
pub fn publish_rendezvous(path: &Path, base_url: &str) -> io::Result<()> {
    write_atomically(path, |w| writeln!(w, "{}", base_url))
}

/// Lee la URL publicada. Archivo ausente = coordinator no disponible.
pub fn read_rendezvous(path: &Path) -> io::Result<String> {
    let raw = fs::read_to_string(path)?;
    let url = raw.trim();
    if url.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("rendezvous vacío: {}", path.display()),
        ));
    }
    Ok(url.to_string())
}
