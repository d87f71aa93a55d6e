use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::{app::MapReduceApp, kv::partition_for, kv::KeyValue, naming::output_name};

/// Colección en memoria de registros intermedios.
pub type Records = Vec<KeyValue>;

/// Un shard intermedio en disco: contribución de un map a una partición.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub map_id: u32,
    pub id: u32,
    pub path: PathBuf,
}

/* =========================
   Escritura atómica
   ========================= */

/// Escribe `path` vía archivo temporal en el mismo directorio + rename.
/// Un proceso que muere a mitad de escritura nunca deja un archivo
/// parcial con el nombre final; dos escritores concurrentes terminan
/// en last-writer-wins sobre un archivo completo.
pub fn write_atomically<F>(path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        fill(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/* =========================
   Shuffle a particiones
   ========================= */

/// Reparte registros en `n_reduce` buckets por `ihash(key) % n_reduce`,
/// respetando el orden de emisión dentro de cada bucket.
pub fn partition_records(input: Records, n_reduce: u32) -> Vec<Records> {
    let n = n_reduce.max(1);
    let mut buckets: Vec<Records> = (0..n).map(|_| Vec::new()).collect();
    for kv in input {
        let pid = partition_for(&kv.key, n) as usize;
        buckets[pid].push(kv);
    }
    buckets
}

/// Escribe un shard como JSONL (un `{"Key","Value"}` por línea).
pub fn write_partition(path: &Path, records: &[KeyValue]) -> io::Result<()> {
    write_atomically(path, |w| {
        for kv in records {
            serde_json::to_writer(&mut *w, kv)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    })
}

/// Lee un shard. Archivo ausente o vacío = sin contribución.
/// Una línea que no decodifica es un error de datos.
pub fn read_partition(path: &Path) -> io::Result<Records> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let kv: KeyValue = serde_json::from_str(&line).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("shard corrupto {} (línea {}): {e}", path.display(), lineno + 1),
            )
        })?;
        out.push(kv);
    }

    Ok(out)
}

/* =========================
   Reduce
   ========================= */

/// Ordena (estable, sólo por clave), agrupa corridas de claves iguales y
/// aplica `reduce` a cada grupo. Devuelve (clave, salida) en orden de clave.
pub fn reduce_sorted(app: &dyn MapReduceApp, mut records: Records) -> Vec<(String, String)> {
    records.sort_by(|a, b| a.key.cmp(&b.key));

    let mut out = Vec::new();
    let mut iter = records.into_iter().peekable();
    while let Some(first) = iter.next() {
        let key = first.key;
        let mut values = vec![first.value];
        while let Some(next) = iter.peek() {
            if next.key != key {
                break;
            }
            if let Some(kv) = iter.next() {
                values.push(kv.value);
            }
        }
        let reduced = app.reduce(&key, &values);
        out.push((key, reduced));
    }
    out
}

/// Escribe líneas "<clave> <valor>\n" en `path`.
pub fn write_output(path: &Path, entries: &[(String, String)]) -> io::Result<()> {
    write_atomically(path, |w| {
        for (key, val) in entries {
            writeln!(w, "{} {}", key, val)?;
        }
        Ok(())
    })
}

/* =========================
   Referencia secuencial
   ========================= */

/// MapReduce en un solo proceso: map de todos los archivos, sort,
/// reduce, y una única salida. Sirve de oráculo para la versión distribuida.
/// Devuelve la cantidad de claves distintas escritas.
pub fn run_sequential<P: AsRef<Path>>(
    app: &dyn MapReduceApp,
    inputs: &[P],
    output_path: &Path,
) -> io::Result<usize> {
    let mut intermediate = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        let bytes = fs::read(input)?;
        let contents = String::from_utf8_lossy(&bytes);
        intermediate.extend(app.map(&input.to_string_lossy(), &contents));
    }

    let entries = reduce_sorted(app, intermediate);
    write_output(output_path, &entries)?;
    Ok(entries.len())
}

/// Ruta por defecto de la salida secuencial.
pub fn default_sequential_output(dir: &Path) -> PathBuf {
    dir.join(output_name(0))
}
