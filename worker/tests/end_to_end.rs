use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use common::{
    app::WordCount, engine::run_sequential, KeyValue, MapReduceApp, Phase, Task, TaskKind,
};
use coordinator::{AppState, Coordinator, CoordinatorConfig};
use tokio::{net::TcpListener, task::JoinHandle};
use worker::{CoordinatorClient, Worker, WorkerConfig, WorkerExit};

const RPC_TIMEOUT: Duration = Duration::from_secs(2);

fn temp_dir(sub: &str) -> PathBuf {
    let base = std::env::temp_dir()
        .join("mr_end_to_end_tests")
        .join(format!("{}-{}", sub, uuid::Uuid::new_v4()));
    fs::create_dir_all(&base).unwrap();
    base
}

fn write_inputs(dir: &Path, contents: &[&str]) -> Vec<String> {
    contents
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let p = dir.join(format!("pg-{i}.txt"));
            fs::write(&p, c).unwrap();
            p.to_string_lossy().to_string()
        })
        .collect()
}

fn config(crash_timeout: Duration) -> CoordinatorConfig {
    CoordinatorConfig {
        crash_timeout,
        sweep_interval: Duration::from_millis(20),
        grace_period: Duration::from_millis(500),
        done_poll_interval: Duration::from_millis(20),
    }
}

async fn start_coordinator(
    files: Vec<String>,
    n_reduce: u32,
    config: CoordinatorConfig,
) -> (AppState, String, JoinHandle<anyhow::Result<()>>) {
    let c = Coordinator::new(files, n_reduce, config).unwrap();
    let state = c.state();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(c.serve(listener));
    (state, url, server)
}

fn spawn_worker(
    name: &str,
    url: &str,
    app: Arc<dyn MapReduceApp>,
    work_dir: &Path,
) -> JoinHandle<WorkerExit> {
    let client = CoordinatorClient::new(url, RPC_TIMEOUT).unwrap();
    let w = Worker::new(
        name,
        client,
        app,
        WorkerConfig {
            work_dir: work_dir.to_path_buf(),
            wait_interval: Duration::from_millis(20),
        },
    );
    tokio::spawn(async move { w.run().await })
}

async fn wait_all(workers: Vec<JoinHandle<WorkerExit>>, server: JoinHandle<anyhow::Result<()>>) {
    tokio::time::timeout(Duration::from_secs(30), async {
        for w in workers {
            w.await.unwrap();
        }
        server.await.unwrap().unwrap();
    })
    .await
    .expect("el job debería terminar");
}

/// Junta todas las líneas "clave valor" de los mr-out-*.
fn collect_outputs(dir: &Path) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for entry in fs::read_dir(dir).unwrap() {
        let p = entry.unwrap().path();
        let name = p.file_name().unwrap().to_string_lossy().to_string();
        if !name.starts_with("mr-out-") {
            continue;
        }
        for line in fs::read_to_string(&p).unwrap().lines() {
            let (k, v) = line.split_once(' ').unwrap();
            assert!(out.insert(k.to_string(), v.to_string()).is_none(), "clave repetida {k}");
        }
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wordcount_dos_archivos_dos_reducers() {
    let dir = temp_dir("wc");
    let files = write_inputs(&dir, &["a a b", "b c"]);
    let (state, url, server) = start_coordinator(files, 2, config(Duration::from_secs(10))).await;

    let app: Arc<dyn MapReduceApp> = Arc::new(WordCount);
    let workers = vec![
        spawn_worker("w1", &url, app.clone(), &dir),
        spawn_worker("w2", &url, app, &dir),
    ];
    wait_all(workers, server).await;

    assert_eq!(state.lock().phase(), Phase::Done);
    // hash(a)%2 = 0, hash(b)%2 = 1, hash(c)%2 = 0
    assert_eq!(fs::read_to_string(dir.join("mr-out-0")).unwrap(), "a 2\nc 1\n");
    assert_eq!(fs::read_to_string(dir.join("mr-out-1")).unwrap(), "b 2\n");
    let outs = fs::read_dir(&dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("mr-out-")
        })
        .count();
    assert_eq!(outs, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn directorio_reutilizado_no_mezcla_shards_viejos() {
    let dir = temp_dir("reused");
    // restos de un job anterior con más maps
    fs::write(dir.join("mr-tmp-9-0"), "{\"Key\":\"a\",\"Value\":\"1\"}\n").unwrap();
    fs::write(dir.join("mr-tmp-4-1"), "{\"Key\":\"viejo\",\"Value\":\"1\"}\n").unwrap();

    let files = write_inputs(&dir, &["a a b", "b c"]);
    let (_state, url, server) = start_coordinator(files, 2, config(Duration::from_secs(10))).await;
    let workers = vec![spawn_worker("w1", &url, Arc::new(WordCount), &dir)];
    wait_all(workers, server).await;

    assert_eq!(fs::read_to_string(dir.join("mr-out-0")).unwrap(), "a 2\nc 1\n");
    assert_eq!(fs::read_to_string(dir.join("mr-out-1")).unwrap(), "b 2\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn resultado_igual_al_secuencial() {
    let dir = temp_dir("vs_seq");
    let files = write_inputs(
        &dir,
        &[
            "It was the best of times, it was the worst of times",
            "it was the age of wisdom, it was the age of foolishness",
            "",
            "times times TIMES",
            "of of of wisdom",
        ],
    );

    let seq_dir = temp_dir("vs_seq_ref");
    let seq_out = seq_dir.join("mr-out-0");
    run_sequential(&WordCount, &files, &seq_out).unwrap();
    let expected = collect_outputs(&seq_dir);

    let (_state, url, server) = start_coordinator(files, 3, config(Duration::from_secs(10))).await;
    let app: Arc<dyn MapReduceApp> = Arc::new(WordCount);
    let workers = (0..3)
        .map(|i| spawn_worker(&format!("w{i}"), &url, app.clone(), &dir))
        .collect();
    wait_all(workers, server).await;

    assert_eq!(collect_outputs(&dir), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn map_abandonado_se_reasigna_y_el_job_termina() {
    let dir = temp_dir("crash");
    let files = write_inputs(&dir, &["a b", "c"]);
    let (state, url, server) =
        start_coordinator(files, 1, config(Duration::from_millis(200))).await;

    // un "worker" que toma el map 0 y muere sin reportar
    let dead = CoordinatorClient::new(&url, RPC_TIMEOUT).unwrap();
    let abandoned = dead.poll_task("muerto").await.unwrap();
    assert_eq!((abandoned.kind, abandoned.id), (TaskKind::Map, 0));

    // tras el umbral, un segundo poll recibe la misma tarea
    tokio::time::sleep(Duration::from_millis(400)).await;
    let second = CoordinatorClient::new(&url, RPC_TIMEOUT).unwrap();
    let again = second.poll_task("segundo").await.unwrap();
    assert_eq!(again, abandoned);
    assert!(state.lock().status().reclaimed >= 1);

    // el segundo también la abandona; un worker real termina todo
    let workers = vec![spawn_worker("real", &url, Arc::new(WordCount), &dir)];
    tokio::time::timeout(Duration::from_secs(20), async {
        while !state.is_done() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("el job debería llegar a Done");

    // el reporte tardío del worker original es un no-op
    let late = dead.report_done(&abandoned, "muerto").await.unwrap();
    assert!(!late.accepted);
    assert_eq!(state.lock().phase(), Phase::Done);

    wait_all(workers, server).await;
    assert_eq!(fs::read_to_string(dir.join("mr-out-0")).unwrap(), "a 1\nb 1\nc 1\n");
}

/// App que entra en panic la primera vez que mapea: simula un worker que
/// se cae a mitad de una tarea.
struct PanicOnce {
    fired: AtomicBool,
}

impl MapReduceApp for PanicOnce {
    fn name(&self) -> &'static str {
        "panic-once"
    }

    fn map(&self, filename: &str, contents: &str) -> Vec<KeyValue> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            panic!("caída simulada mapeando {filename}");
        }
        WordCount.map(filename, contents)
    }

    fn reduce(&self, key: &str, values: &[String]) -> String {
        WordCount.reduce(key, values)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panic_en_map_no_se_reporta_y_se_reintenta() {
    let dir = temp_dir("panic");
    let files = write_inputs(&dir, &["x y", "y z"]);
    let (state, url, server) =
        start_coordinator(files, 2, config(Duration::from_millis(200))).await;

    let app: Arc<dyn MapReduceApp> = Arc::new(PanicOnce {
        fired: AtomicBool::new(false),
    });
    let workers = vec![
        spawn_worker("w1", &url, app.clone(), &dir),
        spawn_worker("w2", &url, app, &dir),
    ];
    wait_all(workers, server).await;

    let st = state.lock().status();
    assert_eq!(st.phase, Phase::Done);
    assert!(st.reclaimed >= 1);

    let outputs = collect_outputs(&dir);
    let expected: BTreeMap<String, String> = [("x", "1"), ("y", "2"), ("z", "1")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(outputs, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_sin_coordinator_termina() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let dir = temp_dir("gone");
    let exit = spawn_worker("solo", &url, Arc::new(WordCount), &dir)
        .await
        .unwrap();
    assert_eq!(exit, WorkerExit::CoordinatorGone);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn polls_concurrentes_tras_done_reciben_exit() {
    let (state, url, server) = start_coordinator(Vec::new(), 1, config(Duration::from_secs(10))).await;
    {
        let mut job = state.lock();
        let t = job.poll("w", std::time::Instant::now());
        job.report_done(t.kind, t.id);
    }
    assert!(state.is_done());

    let mut polls = Vec::new();
    for i in 0..8 {
        let client = CoordinatorClient::new(&url, RPC_TIMEOUT).unwrap();
        polls.push(tokio::spawn(async move {
            client.poll_task(&format!("w{i}")).await
        }));
    }
    for p in polls {
        assert_eq!(p.await.unwrap().unwrap(), Task::exit());
    }

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
