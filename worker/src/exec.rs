//! Ejecución de tareas Map y Reduce sobre el sistema de archivos.
//!
//! Ambas son idempotentes: reejecutar la misma tarea (p.ej. tras un reclaim)
//! reescribe los mismos nombres con el mismo contenido.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use common::{
    engine::{partition_records, read_partition, reduce_sorted, write_output, write_partition, Partition},
    naming::{intermediate_name, output_name},
    MapReduceApp, Task,
};

#[derive(Debug, Clone)]
pub struct MapSummary {
    /// registros emitidos por la función map
    pub records: usize,
    /// shards escritos (sólo buckets no vacíos)
    pub shards: Vec<Partition>,
}

#[derive(Debug, Clone)]
pub struct ReduceSummary {
    pub shards: usize,
    pub records: usize,
    pub keys: usize,
    pub output: PathBuf,
}

/// Map: lee el archivo completo, aplica `map`, reparte en R buckets y
/// escribe cada bucket no vacío en `mr-tmp-<id>-<p>`. Para los buckets
/// vacíos borra el shard si quedó de una ejecución anterior.
pub fn run_map_task(app: &dyn MapReduceApp, task: &Task, work_dir: &Path) -> io::Result<MapSummary> {
    if task.reducer_count == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("map {} sin reducers", task.id),
        ));
    }

    let bytes = fs::read(&task.input)?;
    let contents = String::from_utf8_lossy(&bytes);
    let records = app.map(&task.input, &contents);
    let emitted = records.len();

    let mut shards = Vec::new();
    for (p, bucket) in partition_records(records, task.reducer_count)
        .into_iter()
        .enumerate()
    {
        let p = p as u32;
        let path = work_dir.join(intermediate_name(task.id, p));
        if bucket.is_empty() {
            // un shard viejo con este nombre no es de este intento
            remove_if_exists(&path)?;
            continue;
        }
        write_partition(&path, &bucket)?;
        shards.push(Partition {
            map_id: task.id,
            id: p,
            path,
        });
    }

    Ok(MapSummary {
        records: emitted,
        shards,
    })
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Los M shards candidatos de la partición, en orden de id de map.
/// Sólo se devuelven los que existen: un map que no emitió nada para la
/// partición no dejó archivo.
pub fn candidate_shards(work_dir: &Path, map_count: u32, partition: u32) -> Vec<Partition> {
    (0..map_count)
        .map(|map_id| Partition {
            map_id,
            id: partition,
            path: work_dir.join(intermediate_name(map_id, partition)),
        })
        .filter(|s| s.path.is_file())
        .collect()
}

/// Reduce: junta los shards `mr-tmp-<m>-<id>` para m en 0..M, ordena por
/// clave, agrupa, aplica `reduce` y escribe `mr-out-<id>`.
pub fn run_reduce_task(app: &dyn MapReduceApp, task: &Task, work_dir: &Path) -> io::Result<ReduceSummary> {
    let partition = task.id;
    let shards = candidate_shards(work_dir, task.map_count, partition);

    let mut records = Vec::new();
    for shard in &shards {
        records.extend(read_partition(&shard.path)?);
    }
    let n_records = records.len();

    let entries = reduce_sorted(app, records);
    let output = work_dir.join(output_name(partition));
    write_output(&output, &entries)?;

    Ok(ReduceSummary {
        shards: shards.len(),
        records: n_records,
        keys: entries.len(),
        output,
    })
}
