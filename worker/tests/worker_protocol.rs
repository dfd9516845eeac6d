use std::{num::NonZeroUsize, sync::Arc};

use comms::{
    ExchangeErr, FrameReceiver, FrameSender,
    msg::{ClientCommand, Command, CoordinatorCommand, Msg, Payload, WorkerCommand},
    specs::{
        model::ModelSpec,
        simulation::{SimulationTask, TaskBatch},
    },
};
use serde_json::json;
use simulation::{ComputationResult, ModelRegistry, SampleLayout, decode_stream};
use tokio::{
    io::{self, DuplexStream, ReadHalf, WriteHalf},
    task::JoinHandle,
};
use worker::{ExecutionPool, WorkerErr, WorkerService};

type Rx = FrameReceiver<ReadHalf<DuplexStream>>;
type Tx = FrameSender<WriteHalf<DuplexStream>>;

const PING: Msg<'static> = Msg::Control(Command::Coordinator(CoordinatorCommand::Ping));
const INIT: Msg<'static> = Msg::Control(Command::Coordinator(CoordinatorCommand::Init));
const TASK: Msg<'static> = Msg::Control(Command::Coordinator(CoordinatorCommand::Task));
const CLOSE: Msg<'static> = Msg::Control(Command::Coordinator(CoordinatorCommand::CloseConnection));

fn service(threads: usize) -> Arc<WorkerService> {
    let pool = ExecutionPool::new(NonZeroUsize::new(threads).unwrap()).unwrap();
    Arc::new(WorkerService::new(ModelRegistry::default(), pool))
}

fn connect(service: &Arc<WorkerService>) -> (Rx, Tx, JoinHandle<Result<(), WorkerErr>>) {
    let (one, two) = io::duplex(1 << 16);
    let (rx1, tx1) = io::split(one);
    let (rx2, tx2) = io::split(two);
    let (wk_rx, wk_tx) = comms::channel(rx1, tx1);
    let (rx, tx) = comms::channel(rx2, tx2);

    let service = Arc::clone(service);
    let handle = tokio::spawn(async move { service.handle_connection(wk_rx, wk_tx).await });
    (rx, tx, handle)
}

fn sir() -> Vec<u8> {
    ModelSpec::new(
        "population",
        json!({
            "species": ["S", "I", "R"],
            "reactions": [
                { "reactants": { "S": 1, "I": 1 }, "products": { "I": 2 }, "rate": 0.01 },
                { "reactants": { "I": 1 }, "products": { "R": 1 }, "rate": 0.1 },
            ],
        }),
    )
    .to_blob()
    .unwrap()
}

fn seir() -> Vec<u8> {
    ModelSpec::new(
        "population",
        json!({
            "species": ["S", "E", "I", "R"],
            "reactions": [
                { "reactants": { "S": 1, "I": 1 }, "products": { "E": 1, "I": 1 }, "rate": 0.01 },
                { "reactants": { "E": 1 }, "products": { "I": 1 }, "rate": 0.2 },
                { "reactants": { "I": 1 }, "products": { "R": 1 }, "rate": 0.1 },
            ],
        }),
    )
    .to_blob()
    .unwrap()
}

fn batch(model: &str, initial_state: &[f64], replicas: u64) -> TaskBatch {
    TaskBatch {
        tasks: (0..replicas)
            .map(|seed| SimulationTask {
                seed,
                model: model.into(),
                initial_state: initial_state.to_vec(),
                deadline: 20.0,
                max_steps: None,
            })
            .collect(),
    }
}

async fn init(rx: &mut Rx, tx: &mut Tx, name: &str, code: &[u8]) -> Result<(), ExchangeErr> {
    tx.send(&INIT).await?;
    tx.send(&Msg::Data(Payload::Text(name))).await?;
    tx.send(&Msg::Data(Payload::Bytes(code))).await?;

    let mut buf = Vec::new();
    rx.expect_command(&mut buf, Command::Worker(WorkerCommand::InitResponse))
        .await
}

async fn task(
    rx: &mut Rx,
    tx: &mut Tx,
    batch: &TaskBatch,
    arity: usize,
) -> Result<ComputationResult, ExchangeErr> {
    tx.send(&TASK).await?;
    tx.send_object(batch).await?;

    let mut buf = Vec::new();
    let compressed = rx.expect_results(&mut buf).await?;
    let reader = comms::decompressor(&compressed).map_err(std::io::Error::from)?;
    let result = decode_stream(reader, SampleLayout::new(arity)).map_err(std::io::Error::from)?;
    Ok(result)
}

async fn ping(rx: &mut Rx, tx: &mut Tx) {
    tx.send(&PING).await.unwrap();
    let mut buf = Vec::new();
    rx.expect_command(&mut buf, Command::Worker(WorkerCommand::Pong))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batch_returns_one_ordered_trajectory_per_task() {
    let service = service(2);
    let (mut rx, mut tx, _) = connect(&service);

    init(&mut rx, &mut tx, "SIR", &sir()).await.unwrap();
    let batch = batch("SIR", &[95.0, 5.0, 0.0], 4);
    let result = task(&mut rx, &mut tx, &batch, 3).await.unwrap();

    assert_eq!(result.len(), 4);

    let model = service.registry().resolve("SIR").unwrap();
    for (task, trajectory) in batch.tasks.iter().zip(&result) {
        let expected = simulation::execute(task, model.model().as_ref()).unwrap();
        assert_eq!(trajectory, &expected);
    }
}

#[tokio::test]
async fn second_init_replaces_the_model() {
    let service = service(1);
    let (mut rx, mut tx, _) = connect(&service);

    init(&mut rx, &mut tx, "SEIR", &sir()).await.unwrap();
    init(&mut rx, &mut tx, "SEIR", &seir()).await.unwrap();
    assert_eq!(service.registry().len(), 1);

    let result = task(&mut rx, &mut tx, &batch("SEIR", &[95.0, 0.0, 5.0, 0.0], 2), 4)
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert!(result.iter().all(|t| t.samples()[0].state.len() == 4));
}

#[tokio::test]
async fn close_connection_evicts_and_later_task_fails() {
    let service = service(1);

    let (mut rx, mut tx, handle) = connect(&service);
    init(&mut rx, &mut tx, "SEIR", &seir()).await.unwrap();
    tx.send(&CLOSE).await.unwrap();
    tx.send(&Msg::Data(Payload::Text("SEIR"))).await.unwrap();

    handle.await.unwrap().unwrap();
    assert!(!service.registry().contains("SEIR"));

    let (mut rx, mut tx, _) = connect(&service);
    let err = task(&mut rx, &mut tx, &batch("SEIR", &[95.0, 0.0, 5.0, 0.0], 1), 4)
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeErr::Peer(reason) if reason.contains("not found")));
    ping(&mut rx, &mut tx).await;
}

#[tokio::test]
async fn unknown_and_foreign_commands_are_skipped() {
    let service = service(1);
    let (mut rx, mut tx, _) = connect(&service);

    tx.send(&Msg::Unknown(r#"{"coordinator":"REBOOT"}"#)).await.unwrap();
    tx.send(&Msg::Control(Command::Client(ClientCommand::Data)))
        .await
        .unwrap();
    tx.send(&Msg::Data(Payload::Text("stray"))).await.unwrap();

    ping(&mut rx, &mut tx).await;
}

#[tokio::test]
async fn failed_init_answers_err_and_keeps_serving() {
    let service = service(1);
    let (mut rx, mut tx, _) = connect(&service);

    let unknown_kind = ModelSpec::new("neural", json!({})).to_blob().unwrap();
    let err = init(&mut rx, &mut tx, "NN", &unknown_kind).await.unwrap_err();
    assert!(matches!(err, ExchangeErr::Peer(reason) if reason.contains("neural")));

    let err = init(&mut rx, &mut tx, "NN", b"garbage").await.unwrap_err();
    assert!(matches!(err, ExchangeErr::Peer(_)));

    assert!(service.registry().is_empty());
    ping(&mut rx, &mut tx).await;
}

#[tokio::test]
async fn failed_task_fails_the_whole_batch() {
    let service = service(2);
    let (mut rx, mut tx, _) = connect(&service);
    init(&mut rx, &mut tx, "SIR", &sir()).await.unwrap();

    let mut batch = batch("SIR", &[95.0, 5.0, 0.0], 3);
    batch.tasks[2].initial_state = vec![1.0];

    let err = task(&mut rx, &mut tx, &batch, 3).await.unwrap_err();
    assert!(matches!(err, ExchangeErr::Peer(reason) if reason.contains("task 2")));
    ping(&mut rx, &mut tx).await;
}

#[tokio::test]
async fn empty_batch_is_an_empty_result() {
    let service = service(1);
    let (mut rx, mut tx, _) = connect(&service);

    let result = task(&mut rx, &mut tx, &TaskBatch { tasks: Vec::new() }, 1)
        .await
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn disconnect_ends_the_loop_quietly() {
    let service = service(1);
    let (rx, mut tx, handle) = connect(&service);

    tx.close().await.unwrap();
    drop((rx, tx));

    assert!(handle.await.unwrap().is_ok());
}
