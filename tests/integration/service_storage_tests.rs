//! Transport messages through the service, the storage queue and the
//! worker, down to a real file-backed store.

use std::path::PathBuf;
use std::sync::Arc;

use crate::mock_hw::RecordingSink;

use pulsepump::adapters::storage::{FileStorage, MemoryStorage};
use pulsepump::app::commands::{StorageCommandKind, StorageOutcome};
use pulsepump::app::events::AppEvent;
use pulsepump::app::modes::ModeStore;
use pulsepump::app::ports::StoragePort;
use pulsepump::app::service::PumpService;
use pulsepump::app::shared::Fabric;
use pulsepump::app::storage_worker::StorageWorker;
use pulsepump::config::{self, SystemConfig};
use pulsepump::error::{Error, StorageError};
use pulsepump::params::PumpParameters;

fn scratch(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pulsepump-it-{}-{}", tag, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn stack<S: StoragePort>(storage: S) -> (PumpService, StorageWorker<S>, Arc<Fabric>) {
    let fabric = Arc::new(Fabric::new(PumpParameters::default()));
    let worker = StorageWorker::new(ModeStore::new(storage), fabric.clone(), 1);
    (PumpService::new(fabric.clone()), worker, fabric)
}

fn pump<S: StoragePort>(worker: &mut StorageWorker<S>) {
    while worker.run_once() {}
}

#[test]
fn add_list_load_delete_over_messages() {
    let (service, mut worker, fabric) = stack(MemoryStorage::new());
    let mut sink = RecordingSink::new();

    service.handle_message(br#"{"heartRateBpm":100}"#).unwrap();
    service
        .handle_message(br#"{"cmd":"ADD","mode":"exercise"}"#)
        .unwrap();
    service.handle_message(br#"{"heartRateBpm":60}"#).unwrap();
    service.handle_message(br#"{"cmd":"LIST"}"#).unwrap();
    pump(&mut worker);

    let replies = service.drain_replies(&mut sink);
    assert_eq!(replies.len(), 2);
    match &replies[1].result {
        Ok(StorageOutcome::Modes(list)) => {
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].as_str(), "exercise");
        }
        other => panic!("unexpected {other:?}"),
    }

    service
        .handle_message(br#"{"cmd":"LOAD","mode":"exercise"}"#)
        .unwrap();
    pump(&mut worker);
    service.drain_replies(&mut sink);
    assert_eq!(fabric.params.snapshot().heart_rate_bpm, 100);

    service
        .handle_message(br#"{"cmd":"DEL","mode":"exercise"}"#)
        .unwrap();
    service
        .handle_message(br#"{"cmd":"DELETE","mode":"exercise"}"#)
        .unwrap();
    pump(&mut worker);
    service.drain_replies(&mut sink);

    let results: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::StorageResult { kind, ok } => Some((*kind, *ok)),
            _ => None,
        })
        .collect();
    assert_eq!(
        results,
        vec![
            (StorageCommandKind::Add, Ok(())),
            (StorageCommandKind::List, Ok(())),
            (StorageCommandKind::Load, Ok(())),
            (StorageCommandKind::Delete, Ok(())),
            (StorageCommandKind::Delete, Err(Error::Storage(StorageError::NotFound))),
        ]
    );
}

#[test]
fn load_of_unknown_mode_leaves_params_alone() {
    let (service, mut worker, fabric) = stack(MemoryStorage::new());
    let mut sink = RecordingSink::new();
    let before = fabric.params.snapshot();

    service.load_mode("ghost").unwrap();
    pump(&mut worker);
    let replies = service.drain_replies(&mut sink);

    assert_eq!(
        replies[0].result,
        Err(Error::Storage(StorageError::NotFound))
    );
    assert_eq!(fabric.params.snapshot(), before);
}

#[test]
fn modes_survive_restart_on_file_storage() {
    let dir = scratch("restart");
    let saved = PumpParameters {
        heart_rate_bpm: 72,
        systolic_pressure: 130,
        ..PumpParameters::default()
    };

    {
        let (service, mut worker, _) = stack(FileStorage::new(&dir).unwrap());
        service.save_mode("rest", Some(saved)).unwrap();
        pump(&mut worker);
    }

    let (service, mut worker, fabric) = stack(FileStorage::new(&dir).unwrap());
    service.load_mode("rest").unwrap();
    pump(&mut worker);
    let replies = service.drain_replies(&mut RecordingSink::new());

    assert_eq!(replies[0].result, Ok(StorageOutcome::Loaded(saved)));
    assert_eq!(fabric.params.snapshot(), saved);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn corrupt_mode_file_reported_not_applied() {
    let dir = scratch("corrupt");
    let mut fs = FileStorage::new(&dir).unwrap();
    let mut store = ModeStore::new(FileStorage::new(&dir).unwrap());
    store.add("rest", &PumpParameters::default()).unwrap();
    fs.write(pulsepump::app::modes::MODES_NAMESPACE, "rest", &[0xff, 0xff])
        .unwrap();

    let (service, mut worker, fabric) = stack(fs);
    service.load_mode("rest").unwrap();
    pump(&mut worker);
    let replies = service.drain_replies(&mut RecordingSink::new());

    assert_eq!(
        replies[0].result,
        Err(Error::Storage(StorageError::Corrupted))
    );
    assert_eq!(fabric.params.generation(), 0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn system_config_persists_and_falls_back() {
    let dir = scratch("config");
    let mut fs = FileStorage::new(&dir).unwrap();
    assert_eq!(config::load_or_default(&fs), SystemConfig::default());

    let tuned = SystemConfig {
        over_pressure_mmhg: 250.0,
        ..SystemConfig::default()
    };
    config::save(&mut fs, &tuned).unwrap();
    assert_eq!(config::load_or_default(&fs), tuned);

    fs.write(config::CONFIG_NAMESPACE, config::CONFIG_KEY, b"junk")
        .unwrap();
    assert_eq!(config::load_or_default(&fs), SystemConfig::default());
    let _ = std::fs::remove_dir_all(&dir);
}
